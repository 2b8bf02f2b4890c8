//! Error types used by the bgvisor runtime and workers.
//!
//! This module defines the crate's error taxonomy:
//!
//! - [`WorkError`] — failure reported by the maintenance pass (the external
//!   unit of work) inside one cycle.
//! - [`ContextError`] — failure to open or close a work context.
//! - [`CycleError`] — one work cycle's failure, classified by the phase that
//!   failed (begin / work / panic / commit). Always recoverable: the loop
//!   continues after publishing it.
//! - [`ConfigError`] — out-of-range or unavailable configuration at load time.
//! - [`RegisterError`] — a registration the host substrate refused.
//! - [`LaunchError`] — definitive dynamic-launch failures, distinguishing
//!   retry-vs-abort for callers.
//! - [`RuntimeError`] — pool-level failures (shutdown grace exceeded).
//!
//! Error types provide helper methods (`as_label`, and where relevant
//! `is_retryable` / `hint`) for logging/metrics and caller handling.

use std::time::Duration;
use thiserror::Error;

/// # Failure reported by a maintenance pass.
///
/// The unit of work is a black box to the runtime; it reports failures as a
/// plain message. A `WorkError` is always recoverable: the enclosing cycle is
/// rolled back and the worker proceeds to its next scheduled wait.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct WorkError {
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl WorkError {
    /// Creates a new work error from any message.
    ///
    /// # Example
    /// ```
    /// use bgvisor::WorkError;
    ///
    /// let err = WorkError::new("stale entries could not be listed");
    /// assert_eq!(err.to_string(), "stale entries could not be listed");
    /// ```
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for WorkError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for WorkError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// # Failure to open or close a work context.
///
/// Produced by [`ContextProvider`](crate::ContextProvider) implementations for
/// connect/begin/commit/rollback problems. The cycle envelope classifies it
/// into the right [`CycleError`] phase.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ContextError {
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl ContextError {
    /// Creates a new context error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for ContextError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ContextError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// # One work cycle's failure, classified by phase.
///
/// Every variant is recoverable from the worker loop's point of view: the
/// envelope guarantees the context is released, the error is published, and
/// the loop proceeds to its next scheduled wait.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum CycleError {
    /// The work context could not be opened; no work ran and nothing was held.
    #[error("could not open work context: {0}")]
    Begin(ContextError),

    /// The maintenance pass itself failed; the context was rolled back.
    #[error("maintenance pass failed: {0}")]
    Work(WorkError),

    /// The maintenance pass panicked; the panic was caught and the context
    /// rolled back.
    #[error("maintenance pass panicked: {message}")]
    Panic {
        /// The caught panic payload, rendered as text.
        message: String,
    },

    /// The work succeeded but the closing commit failed.
    #[error("could not commit work context: {0}")]
    Commit(ContextError),
}

impl CycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use bgvisor::{CycleError, WorkError};
    ///
    /// let err = CycleError::Work(WorkError::new("boom"));
    /// assert_eq!(err.as_label(), "cycle_work_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CycleError::Begin(_) => "cycle_begin_failed",
            CycleError::Work(_) => "cycle_work_failed",
            CycleError::Panic { .. } => "cycle_panicked",
            CycleError::Commit(_) => "cycle_commit_failed",
        }
    }
}

/// # Configuration rejected or unavailable at load time.
///
/// A configuration error is fatal to that configuration attempt only: the
/// consumer keeps its previous values and reports the failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value fell outside its permitted range.
    #[error("{key} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// The configuration key that was rejected.
        key: &'static str,
        /// The rejected value.
        value: i64,
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },

    /// The configuration source did not answer within the reload bound.
    #[error("configuration reload timed out after {timeout:?}")]
    ReloadTimeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The configuration source itself failed to produce a snapshot.
    #[error("configuration source failed: {message}")]
    Source {
        /// Human-readable description of the source failure.
        message: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::OutOfRange { .. } => "config_out_of_range",
            ConfigError::ReloadTimeout { .. } => "config_reload_timeout",
            ConfigError::Source { .. } => "config_source_failed",
        }
    }
}

/// # A registration the host substrate refused.
///
/// Static registrations are fire-and-forget, so a refusal surfaces as an
/// event; dynamic registrations return it to the launch protocol, which maps
/// it to [`LaunchError::InsufficientResources`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// Every worker slot is occupied.
    #[error("no free worker slot (capacity {capacity})")]
    RegistryFull {
        /// The slot table's configured capacity.
        capacity: usize,
    },

    /// A worker with the same name is already registered.
    #[error("worker {name:?} is already registered")]
    Duplicate {
        /// The conflicting worker name.
        name: String,
    },

    /// The spec's name is empty or exceeds the permitted length.
    #[error("invalid worker name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// # Definitive dynamic-launch failures.
///
/// A launch either returns the new worker's pid or exactly one of these, so
/// callers can decide between retrying and aborting without string matching.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum LaunchError {
    /// The worker could not be started: registration was refused, the worker
    /// crashed before confirming, or the start confirmation timed out.
    #[error("could not start background worker: {reason}")]
    InsufficientResources {
        /// What specifically prevented the start.
        reason: String,
    },

    /// The supervising process disappeared while waiting for confirmation.
    /// Fatal for the whole pool, not just this launch.
    #[error("cannot start background worker without the supervising process")]
    SupervisorGone,
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::InsufficientResources { .. } => "launch_insufficient_resources",
            LaunchError::SupervisorGone => "launch_supervisor_gone",
        }
    }

    /// Indicates whether retrying the launch can reasonably succeed.
    ///
    /// Returns `true` for [`LaunchError::InsufficientResources`] (the host may
    /// free a slot later), `false` for [`LaunchError::SupervisorGone`] (the
    /// pool is beyond saving; callers should abort).
    ///
    /// # Example
    /// ```
    /// use bgvisor::LaunchError;
    ///
    /// let busy = LaunchError::InsufficientResources { reason: "no free slot".into() };
    /// assert!(busy.is_retryable());
    ///
    /// assert!(!LaunchError::SupervisorGone.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, LaunchError::InsufficientResources { .. })
    }

    /// Returns a human-readable hint for the operator.
    pub fn hint(&self) -> &'static str {
        match self {
            LaunchError::InsufficientResources { .. } => "Check the host logs.",
            LaunchError::SupervisorGone => {
                "Stop the remaining workers and restart the supervising process."
            }
        }
    }
}

/// # Errors produced by the pool runtime itself.
///
/// These represent failures in the supervision machinery, not in any single
/// worker.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some workers were still running.
    #[error("shutdown grace {grace:?} exceeded; still running: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of workers that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use bgvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Renders a caught panic payload into readable text.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
