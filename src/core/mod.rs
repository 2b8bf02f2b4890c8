//! Supervision core: hosts, loops, and orchestration.
//!
//! This module contains the machinery that turns specs into running workers.
//! The public API is the [`Supervisor`] front door, the in-process [`Runtime`]
//! host, and the handle/status types callers observe workers through.
//!
//! Modules:
//! - [`host`]: the `WorkerHost` substrate seam, worker status, and handles;
//! - [`worker_loop`]: one worker's latch-driven lifecycle;
//! - [`launch`]: the dynamic launch-and-confirm protocol;
//! - [`runtime`]: slot table, restart supervision, pool driving;
//! - [`supervisor`]: config validation, static pool, launch entry point.

mod host;
mod launch;
mod runtime;
mod supervisor;
mod worker_loop;

pub use host::{ActivityState, StatusReporter, WorkerHandle, WorkerHost, WorkerStatus};
pub use runtime::{Runtime, WorkerView};
pub use supervisor::Supervisor;
pub use worker_loop::{ExitReason, WorkerLoop, WorkerParts};
