//! # Runtime events emitted by the supervisor, runtime, and worker loops.
//!
//! The [`EventKind`] enum classifies event types across five categories:
//! - **Subscriber delivery events**: fan-out problems (panic, overflow)
//! - **Pool events**: process-level shutdown flow
//! - **Worker lifecycle events**: registration, start, stop, restart
//! - **Cycle events**: individual work cycles (started, completed, failed)
//! - **Reload and launch events**: configuration re-reads and dynamic starts
//!
//! The [`Event`] struct carries optional metadata such as the worker name,
//! slot index, pid, cycle number, and error text.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use bgvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CycleFailed)
//!     .with_worker("cache_sweep_1")
//!     .with_cycle(17)
//!     .with_error("maintenance pass failed: stale list unavailable");
//!
//! assert_eq!(ev.kind, EventKind::CycleFailed);
//! assert_eq!(ev.worker.as_deref(), Some("cache_sweep_1"));
//! assert_eq!(ev.cycle, Some(17));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber delivery events ===
    /// A subscriber's handler panicked while processing an event.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `error`: rendered panic payload
    SubscriberPanicked,

    /// An event was dropped for one subscriber (queue full, or its worker
    /// ended).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: queue state that caused the drop ("full" or "closed")
    SubscriberOverflow,

    // === Pool events ===
    /// Pool shutdown requested (OS signal observed or run() winding down).
    ShutdownRequested,

    /// All workers stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some workers did not stop in time.
    ///
    /// Sets:
    /// - `reason`: names of the workers still running
    GraceExceeded,

    // === Worker lifecycle events ===
    /// A registration was accepted and a slot assigned.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index from the spec
    WorkerRegistered,

    /// A registration was refused (slot table full, duplicate, bad name).
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `error`: refusal message
    RegistrationRefused,

    /// A worker loop began initializing.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index
    /// - `pid`: assigned pid
    WorkerStarting,

    /// A worker finished its warm-up pass and confirmed liveness.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index
    /// - `pid`: assigned pid
    WorkerStarted,

    /// A worker stopped. Clean terminations set no error; start-up failures
    /// carry the initialization error.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index
    /// - `pid`: assigned pid
    /// - `error`: initialization failure, if the worker never confirmed
    WorkerStopped,

    /// A worker's task panicked outside the cycle envelope.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `error`: panic info/message
    WorkerPanicked,

    /// A crashed worker is being restarted after its configured delay.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `delay_ms`: pause before the fresh loop starts
    WorkerRestarting,

    /// A worker observed that the supervising process is gone and exited.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index
    ParentDeath,

    // === Cycle events ===
    /// A work cycle began (cycle 0 is the warm-up pass).
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `cycle`: cycle number
    CycleStarted,

    /// A work cycle committed.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `cycle`: cycle number
    CycleCompleted,

    /// A work cycle failed; the context was released and the worker lives on.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `cycle`: cycle number
    /// - `error`: the cycle error
    /// - `reason`: secondary release failure, if rollback also failed
    CycleFailed,

    // === Reload events ===
    /// A configuration re-read was applied.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `interval_ms`: the sleep interval now in effect
    ReloadApplied,

    /// A configuration re-read failed; previous values kept.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `error`: what went wrong
    ReloadFailed,

    // === Launch events ===
    /// A dynamic launch was submitted to the host.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index from the spec
    LaunchRequested,

    /// A dynamically launched worker confirmed its start.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index
    /// - `pid`: the new worker's pid
    LaunchConfirmed,

    /// A dynamic launch failed definitively.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `index`: slot index
    /// - `error`: the launch error
    LaunchFailed,

    // === Activity events ===
    /// A worker reported what it is doing (running/idle plus description).
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: rendered activity, e.g. "running: maintenance pass"
    ActivityChanged,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Monotone global sequence number; later events compare greater.
    pub seq: u64,
    /// Wall-clock time the event was created.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,

    /// Name of the worker (or subscriber) concerned, if applicable.
    pub worker: Option<Arc<str>>,
    /// Slot index from the worker's spec.
    pub index: Option<u32>,
    /// Pid assigned by the host substrate.
    pub pid: Option<u32>,
    /// Cycle number (0 = warm-up pass, then 1, 2, …).
    pub cycle: Option<u64>,
    /// Sleep interval in milliseconds (compact), for reload events.
    pub interval_ms: Option<u32>,
    /// Restart delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Error text, for failure events.
    pub error: Option<Arc<str>>,
    /// Human-readable detail that is not an error (activity, overflow cause).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            index: None,
            pid: None,
            cycle: None,
            interval_ms: None,
            delay_ms: None,
            error: None,
            reason: None,
        }
    }

    /// Attaches a worker (or subscriber) name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a slot index.
    #[inline]
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Attaches a pid.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a cycle number.
    #[inline]
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Attaches a sleep interval (stored as milliseconds).
    #[inline]
    pub fn with_interval(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.interval_ms = Some(ms);
        self
    }

    /// Attaches a restart delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches error text.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a human-readable detail that is not an error.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Shorthand for the overflow report published on a dropped delivery.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(reason)
    }

    /// Shorthand for the panic report published when a handler unwinds.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_error(info)
    }

    /// Whether this event reports a subscriber overflow.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Whether this event reports a subscriber panic.
    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
