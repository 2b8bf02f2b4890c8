//! # Restart and start-time policies for workers.
//!
//! [`RestartPolicy`] determines whether a worker whose task crashes (panics
//! outside the cycle envelope) is respawned. [`StartTime`] determines when a
//! registered worker may begin running.
//!
//! ## Choosing the right restart policy
//!
//! **Pool workers** (failures are contained per cycle anyway):
//! ```text
//! RestartPolicy::Never             → a crash outside the envelope is final
//! ```
//!
//! **Workers wrapping fragile context layers**:
//! ```text
//! RestartPolicy::OnCrash { delay } → respawn a fresh loop after `delay`
//! ```
//!
//! Note that ordinary work failures never reach this policy: a failing or
//! panicking maintenance pass is absorbed by the cycle envelope and the
//! worker keeps running. Only a panic in the loop machinery itself (for
//! example inside a context provider) counts as a crash.

use std::time::Duration;

/// Policy controlling whether a crashed worker is respawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never respawn: a crash is final and the slot is reaped (default).
    Never,
    /// Respawn a fresh loop after `delay`. The delay is fixed, so a worker
    /// that crashes on every start consumes at most one respawn per `delay`.
    OnCrash {
        /// Pause between the crash and the fresh loop.
        delay: Duration,
    },
}

impl Default for RestartPolicy {
    /// Returns [`RestartPolicy::Never`].
    fn default() -> Self {
        RestartPolicy::Never
    }
}

/// When a registered worker may begin running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTime {
    /// Start as soon as the registration is accepted.
    Immediately,
    /// Hold the worker until the host finishes its recovery phase (default).
    ///
    /// Hosts that never enter recovery treat this like
    /// [`StartTime::Immediately`].
    AfterRecovery,
}

impl Default for StartTime {
    /// Returns [`StartTime::AfterRecovery`].
    fn default() -> Self {
        StartTime::AfterRecovery
    }
}
