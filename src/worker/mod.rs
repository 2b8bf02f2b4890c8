//! Worker descriptions: specs, entries, and policies.
//!
//! ## Contents
//! - [`WorkerSpec`], [`WorkerSpecBuilder`]: everything a host needs to accept
//!   and run one worker.
//! - [`Entry`], [`EntryFn`], [`EntryRef`]: the factory separating the shared
//!   maintenance unit from per-worker context providers.
//! - [`AccessFlags`]: what a worker's provider may reach.
//! - [`RestartPolicy`], [`StartTime`]: crash handling and start gating.

mod policy;
mod spec;

pub use policy::{RestartPolicy, StartTime};
pub use spec::{AccessFlags, Entry, EntryFn, EntryRef, WorkerSpec, WorkerSpecBuilder, MAX_NAME_LEN};
