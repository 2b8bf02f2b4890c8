//! Work abstractions: the maintenance unit, its context, and the cycle
//! envelope.
//!
//! ## Contents
//! - [`Maintenance`], [`MaintenanceFn`], [`MaintenanceRef`]: the externally
//!   supplied unit of periodic work.
//! - [`ContextProvider`], [`NoopContext`]: the environment opened around each
//!   pass (connection, transaction, session).
//! - [`run_cycle`], [`CycleResult`]: one pass inside its begin/commit/rollback
//!   envelope, with panic containment.
//!
//! The split keeps responsibilities narrow: units do the work, providers own
//! the surrounding resources, and the envelope guarantees that every opened
//! context is closed on every exit path.

mod context;
mod cycle;
mod maintenance;

pub use context::{ContextProvider, NoopContext};
pub use cycle::{run_cycle, CycleResult};
pub use maintenance::{Maintenance, MaintenanceFn, MaintenanceRef};
