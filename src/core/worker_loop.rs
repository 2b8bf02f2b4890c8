//! # WorkerLoop: one worker's latch-driven lifecycle.
//!
//! Drives a single worker from initialization to exit:
//! - waits on its [`Latch`] with the configured sleep interval,
//! - drains sticky requests from its [`SignalBridge`],
//! - runs one cycle of its maintenance unit per iteration via [`run_cycle`],
//! - reports status through its [`StatusReporter`] and activity through its
//!   [`WorkerHost`].
//!
//! ## State machine
//! ```text
//! Initializing ── connect + warm-up pass ──► Idle
//!       │ connect fails                       │ latch.wait(sleep, ALL)
//!       ▼                                     ▼ wake
//!  exit InitFailed                 ┌─ parent death ──► exit ParentDied
//!                                  ├─ termination  ──► exit Terminated
//!                                  ├─ reconfigure ──► reload ──┐
//!                                  └───────────────────────────┤
//!                                                              ▼
//!                                                     Working (one cycle)
//!                                                              │
//!                                                              └──► Idle
//! ```
//!
//! ## Rules
//! - **Wake handling order**: parent death, then termination, then
//!   reconfigure. A reconfigure wake falls through to a work cycle in the
//!   same iteration; it does not cost an extra sleep.
//! - **One cycle per iteration**, never concurrent. Cycle failures are
//!   absorbed; the loop continues on schedule.
//! - **Warm-up pass** (cycle 0) runs before liveness is confirmed, so an
//!   observer that sees `Started` knows one full pass already happened.
//! - **A dead pool is never confirmed**: the host's parent liveness is
//!   re-checked between the warm-up pass and the `Started` confirmation;
//!   a parent lost during initialization exits as `ParentDied` instead.
//! - **Termination is cooperative**: an in-flight cycle always finishes;
//!   the request is honored at the next iteration boundary.
//! - **Parent death is abrupt**: no further cycles, no graceful teardown
//!   beyond the envelope's own release guarantee.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, ConfigSource, RELOAD_TIMEOUT};
use crate::core::host::{ActivityState, StatusReporter, WorkerHost, WorkerStatus};
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};
use crate::latch::{Latch, Wake};
use crate::signal::SignalBridge;
use crate::work::{run_cycle, ContextProvider, MaintenanceRef};
use crate::worker::WorkerSpec;

/// Why a worker loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Termination was requested and honored after the in-flight cycle.
    Terminated,
    /// The supervising process disappeared; the exit was abrupt.
    ParentDied,
    /// Start-up resources could not be opened; the worker never confirmed.
    InitFailed,
}

/// Everything a worker loop needs besides its spec.
///
/// Assembled by the host when it admits a registration. The latch and bridge
/// belong to the worker, not the incarnation: a crash restart reuses them, so
/// a request made while the worker was down is honored by its replacement.
#[derive(Clone)]
pub struct WorkerParts {
    /// The loop's wake primitive. The loop is the only waiter.
    pub latch: Arc<Latch>,
    /// Sticky request flags wired to `latch`.
    pub bridge: Arc<SignalBridge>,
    /// Where reconfigure wakes re-read configuration from.
    pub source: Arc<dyn ConfigSource>,
    /// The substrate the worker reports activity to.
    pub host: Arc<dyn WorkerHost>,
    /// Publishing side of the worker's status channel.
    pub reporter: StatusReporter,
    /// Event bus for lifecycle events.
    pub bus: Bus,
    /// Pid assigned by the host.
    pub pid: u32,
    /// Idle wait between cycles until the first successful reload.
    pub sleep_interval: Duration,
}

/// Latch-driven loop for one worker. See the [module docs](self).
pub struct WorkerLoop {
    spec: WorkerSpec,
    unit: MaintenanceRef,
    provider: Box<dyn ContextProvider>,
    latch: Arc<Latch>,
    bridge: Arc<SignalBridge>,
    source: Arc<dyn ConfigSource>,
    host: Arc<dyn WorkerHost>,
    reporter: StatusReporter,
    bus: Bus,
    pid: u32,
    sleep: Duration,
    cycle: u64,
}

impl WorkerLoop {
    /// Assembles a loop from its spec and per-incarnation parts.
    ///
    /// Draws the shared maintenance unit and a fresh context provider from
    /// the spec's entry.
    pub fn new(spec: WorkerSpec, parts: WorkerParts) -> Self {
        let unit = spec.entry().maintenance();
        let provider = spec.entry().context_provider();
        Self {
            spec,
            unit,
            provider,
            latch: parts.latch,
            bridge: parts.bridge,
            source: parts.source,
            host: parts.host,
            reporter: parts.reporter,
            bus: parts.bus,
            pid: parts.pid,
            sleep: parts.sleep_interval,
            cycle: 0,
        }
    }

    /// The loop's wake primitive.
    pub fn latch(&self) -> &Arc<Latch> {
        &self.latch
    }

    /// The loop's request flags.
    pub fn bridge(&self) -> &Arc<SignalBridge> {
        &self.bridge
    }

    /// Runs the worker until termination, parent death, or a failed start.
    ///
    /// ### Flow
    /// 1. Open long-lived resources (`connect`), honoring the spec's access
    ///    flags; failure exits with [`ExitReason::InitFailed`] before any
    ///    liveness confirmation.
    /// 2. Run the warm-up pass (cycle 0), re-check parent liveness, then
    ///    confirm `Started` with the pid.
    /// 3. Loop: latch wait → reset → drain flags → one cycle → back to wait.
    ///
    /// ### Exit paths
    /// - Parent death (wake, or detected before confirming) → status
    ///   `ParentDied`, [`ExitReason::ParentDied`].
    /// - Termination request → status `Stopped`, [`ExitReason::Terminated`].
    ///
    /// Every exit path publishes its terminal status before returning, so
    /// launch waiters and handle observers are never left hanging.
    pub async fn run(mut self) -> ExitReason {
        let worker: Arc<str> = Arc::from(self.spec.name());
        let index = self.spec.index();

        self.bus.publish(
            Event::new(EventKind::WorkerStarting)
                .with_worker(Arc::clone(&worker))
                .with_index(index)
                .with_pid(self.pid),
        );
        self.host
            .report_activity(&worker, ActivityState::Running, Some("initializing"))
            .await;

        if self.spec.access().data_connection {
            if let Err(e) = self.provider.connect().await {
                self.bus.publish(
                    Event::new(EventKind::WorkerStopped)
                        .with_worker(Arc::clone(&worker))
                        .with_index(index)
                        .with_pid(self.pid)
                        .with_error(format!("could not open work resources: {e}")),
                );
                self.reporter.publish(WorkerStatus::Stopped);
                return ExitReason::InitFailed;
            }
        }

        // Warm-up: its failure is as recoverable as any later cycle's.
        self.bus.publish(
            Event::new(EventKind::CycleStarted)
                .with_worker(Arc::clone(&worker))
                .with_cycle(0),
        );
        let _ = run_cycle(
            self.provider.as_mut(),
            self.unit.as_ref(),
            &self.bus,
            &worker,
            0,
        )
        .await;

        // Do not confirm liveness to a pool whose parent died during init.
        if !self.host.is_parent_alive() {
            return self.exit_parent_died(&worker, index);
        }

        self.reporter.started(self.pid);
        self.bus.publish(
            Event::new(EventKind::WorkerStarted)
                .with_worker(Arc::clone(&worker))
                .with_index(index)
                .with_pid(self.pid),
        );
        self.host
            .report_activity(&worker, ActivityState::Idle, None)
            .await;

        loop {
            let wake = self.latch.wait(self.sleep, Wake::ALL).await;
            self.latch.reset();

            if wake.contains(Wake::PARENT_DEATH) {
                return self.exit_parent_died(&worker, index);
            }

            if self.bridge.take_termination() {
                break;
            }

            if self.bridge.take_reconfigure() {
                self.reload(&worker).await;
            }

            self.cycle += 1;
            self.bus.publish(
                Event::new(EventKind::CycleStarted)
                    .with_worker(Arc::clone(&worker))
                    .with_cycle(self.cycle),
            );
            self.host
                .report_activity(&worker, ActivityState::Running, Some("maintenance pass"))
                .await;
            let _ = run_cycle(
                self.provider.as_mut(),
                self.unit.as_ref(),
                &self.bus,
                &worker,
                self.cycle,
            )
            .await;
            self.host
                .report_activity(&worker, ActivityState::Idle, None)
                .await;
        }

        self.reporter.publish(WorkerStatus::Stopped);
        self.bus.publish(
            Event::new(EventKind::WorkerStopped)
                .with_worker(worker)
                .with_index(index)
                .with_pid(self.pid),
        );
        ExitReason::Terminated
    }

    fn exit_parent_died(&self, worker: &Arc<str>, index: u32) -> ExitReason {
        self.bus.publish(
            Event::new(EventKind::ParentDeath)
                .with_worker(Arc::clone(worker))
                .with_index(index),
        );
        self.reporter.publish(WorkerStatus::ParentDied);
        ExitReason::ParentDied
    }

    /// Re-reads configuration, applying only the reload-on-signal keys.
    ///
    /// Any failure (slow source, source error, out-of-range values) keeps the
    /// previous values and is reported as `ReloadFailed`.
    async fn reload(&mut self, worker: &Arc<str>) {
        match config::load_with_timeout(self.source.as_ref(), RELOAD_TIMEOUT).await {
            Ok(fresh) => match fresh.validate() {
                Ok(()) => {
                    self.sleep = fresh.sleep_interval();
                    self.bus.publish(
                        Event::new(EventKind::ReloadApplied)
                            .with_worker(Arc::clone(worker))
                            .with_interval(self.sleep),
                    );
                }
                Err(e) => self.publish_reload_failed(worker, &e),
            },
            Err(e) => self.publish_reload_failed(worker, &e),
        }
    }

    fn publish_reload_failed(&self, worker: &Arc<str>, e: &ConfigError) {
        self.bus.publish(
            Event::new(EventKind::ReloadFailed)
                .with_worker(Arc::clone(worker))
                .with_error(e.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemorySource, WorkerConfig};
    use crate::core::host::WorkerHandle;
    use crate::error::{ContextError, RegisterError, WorkError};
    use crate::work::MaintenanceFn;
    use crate::worker::{AccessFlags, EntryFn, EntryRef};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::broadcast::Receiver;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    struct TestHost {
        parent: CancellationToken,
        activities: Mutex<Vec<String>>,
    }

    impl TestHost {
        fn new(parent: CancellationToken) -> Arc<Self> {
            Arc::new(Self {
                parent,
                activities: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WorkerHost for TestHost {
        async fn register_static(&self, _spec: WorkerSpec) {}

        async fn register_dynamic(
            &self,
            _spec: WorkerSpec,
        ) -> Result<WorkerHandle, RegisterError> {
            Err(RegisterError::RegistryFull { capacity: 0 })
        }

        async fn wait_for_start(&self, handle: &WorkerHandle) -> (WorkerStatus, Option<u32>) {
            handle.wait_leave_starting().await
        }

        async fn report_activity(
            &self,
            worker: &str,
            state: ActivityState,
            description: Option<&str>,
        ) {
            let line = match description {
                Some(d) => format!("{worker}: {state}: {d}"),
                None => format!("{worker}: {state}"),
            };
            self.activities.lock().unwrap().push(line);
        }

        fn is_parent_alive(&self) -> bool {
            !self.parent.is_cancelled()
        }

        fn parent_token(&self) -> CancellationToken {
            self.parent.clone()
        }
    }

    struct Fixture {
        lp: WorkerLoop,
        bridge: Arc<SignalBridge>,
        handle: WorkerHandle,
        bus: Bus,
        parent: CancellationToken,
        source: Arc<MemorySource>,
    }

    fn fixture_with_entry(entry: EntryRef, sleep_ms: u64) -> Fixture {
        fixture_with_spec(WorkerSpec::builder("w1").index(1).build(entry), sleep_ms)
    }

    fn fixture_with_spec(spec: WorkerSpec, sleep_ms: u64) -> Fixture {
        let parent = CancellationToken::new();
        let latch = Arc::new(Latch::new(parent.child_token()));
        let bridge = Arc::new(SignalBridge::new(Arc::clone(&latch)));
        let source = Arc::new(MemorySource::default());
        let host = TestHost::new(parent.clone());
        let (reporter, handle) = WorkerHandle::new_pair(spec.name().to_owned(), spec.index());
        let bus = Bus::new(512);

        let lp = WorkerLoop::new(
            spec,
            WorkerParts {
                latch,
                bridge: Arc::clone(&bridge),
                source: source.clone() as Arc<dyn ConfigSource>,
                host,
                reporter,
                bus: bus.clone(),
                pid: 1,
                sleep_interval: Duration::from_millis(sleep_ms),
            },
        );

        Fixture {
            lp,
            bridge,
            handle,
            bus,
            parent,
            source,
        }
    }

    fn counting_unit() -> (MaintenanceRef, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let unit: MaintenanceRef = MaintenanceFn::arc(move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (unit, count)
    }

    fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn seq_of(events: &[Event], kind: EventKind) -> Option<u64> {
        events.iter().find(|e| e.kind == kind).map(|e| e.seq)
    }

    #[tokio::test]
    async fn test_warm_up_runs_before_confirmation() {
        let (unit, count) = counting_unit();
        let f = fixture_with_entry(EntryFn::contextless(unit), 500);
        let join = tokio::spawn(f.lp.run());

        let (status, pid) = tokio::time::timeout(
            Duration::from_secs(2),
            f.handle.wait_leave_starting(),
        )
        .await
        .unwrap();

        assert_eq!(status, WorkerStatus::Started);
        assert_eq!(pid, Some(1));
        assert!(count.load(Ordering::SeqCst) >= 1);

        f.bridge.request_termination();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ExitReason::Terminated);
    }

    #[tokio::test]
    async fn test_failing_unit_keeps_worker_alive() {
        let fails = Arc::new(AtomicUsize::new(0));
        let seen = fails.clone();
        let unit: MaintenanceRef = MaintenanceFn::arc(move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(WorkError::new("always broken"))
            }
        });

        let f = fixture_with_entry(EntryFn::contextless(unit), 5);
        let mut rx = f.bus.subscribe();
        let join = tokio::spawn(f.lp.run());

        f.handle.wait_leave_starting().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The worker survives a unit that fails on every single pass.
        assert_eq!(f.handle.status(), WorkerStatus::Started);
        assert!(fails.load(Ordering::SeqCst) >= 3);

        f.bridge.request_termination();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ExitReason::Terminated);
        assert_eq!(f.handle.status(), WorkerStatus::Stopped);

        let events = drain(&mut rx);
        let failed = events
            .iter()
            .filter(|e| e.kind == EventKind::CycleFailed)
            .count();
        assert!(failed >= 3);
    }

    #[tokio::test]
    async fn test_termination_completes_inflight_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let unit: MaintenanceRef = {
            let calls = calls.clone();
            let entered = entered.clone();
            let release = release.clone();
            MaintenanceFn::arc(move || {
                let calls = calls.clone();
                let entered = entered.clone();
                let release = release.clone();
                async move {
                    // Call 1 is the warm-up; call 2 is the first loop cycle,
                    // which we hold open while termination arrives.
                    if calls.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                        entered.notify_one();
                        release.notified().await;
                    }
                    Ok(())
                }
            })
        };

        let f = fixture_with_entry(EntryFn::contextless(unit), 5);
        let mut rx = f.bus.subscribe();
        let join = tokio::spawn(f.lp.run());

        tokio::time::timeout(Duration::from_secs(2), entered.notified())
            .await
            .expect("first loop cycle should begin");

        f.bridge.request_termination();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!join.is_finished(), "termination must not abort the cycle");

        release.notify_one();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ExitReason::Terminated);

        // The held cycle committed, then the worker stopped; no third pass.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let events = drain(&mut rx);
        let completed = events
            .iter()
            .filter(|e| e.kind == EventKind::CycleCompleted && e.cycle == Some(1))
            .map(|e| e.seq)
            .next()
            .expect("cycle 1 should complete");
        let stopped = seq_of(&events, EventKind::WorkerStopped).expect("worker should stop");
        assert!(completed < stopped);
    }

    #[tokio::test]
    async fn test_reconfigure_applies_only_after_request() {
        let (unit, _count) = counting_unit();
        let f = fixture_with_entry(EntryFn::contextless(unit), 5);
        let mut rx = f.bus.subscribe();
        let join = tokio::spawn(f.lp.run());
        f.handle.wait_leave_starting().await;

        let fresh = WorkerConfig {
            sleep_interval_ms: 250,
            ..WorkerConfig::default()
        };
        f.source.set(fresh);

        // The source changed, but nobody asked the worker to re-read it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = drain(&mut rx);
        assert!(seq_of(&events, EventKind::ReloadApplied).is_none());

        f.bridge.request_reconfigure();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = drain(&mut rx);
        let applied = events
            .iter()
            .find(|e| e.kind == EventKind::ReloadApplied)
            .expect("reload should apply after the request");
        assert_eq!(applied.interval_ms, Some(250));

        // The reconfigure wake fell through to a work cycle in the same
        // iteration.
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::CycleStarted && e.seq > applied.seq));

        f.bridge.request_termination();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ExitReason::Terminated);
    }

    #[tokio::test]
    async fn test_invalid_reload_keeps_previous_values() {
        let (unit, _count) = counting_unit();
        let f = fixture_with_entry(EntryFn::contextless(unit), 5);
        let mut rx = f.bus.subscribe();
        let join = tokio::spawn(f.lp.run());
        f.handle.wait_leave_starting().await;

        f.source.set(WorkerConfig {
            sleep_interval_ms: 999,
            worker_count: 0, // out of range; the whole snapshot is rejected
            ..WorkerConfig::default()
        });
        f.bridge.request_reconfigure();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = drain(&mut rx);
        assert!(seq_of(&events, EventKind::ReloadFailed).is_some());
        assert!(seq_of(&events, EventKind::ReloadApplied).is_none());

        // Still alive and cycling on the old interval.
        assert_eq!(f.handle.status(), WorkerStatus::Started);

        f.bridge.request_termination();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ExitReason::Terminated);
    }

    #[tokio::test]
    async fn test_parent_death_exits_abruptly() {
        let (unit, _count) = counting_unit();
        let f = fixture_with_entry(EntryFn::contextless(unit), 5_000);
        let mut rx = f.bus.subscribe();
        let join = tokio::spawn(f.lp.run());
        f.handle.wait_leave_starting().await;

        f.parent.cancel();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .expect("parent death must cut the sleep short")
            .unwrap();

        assert_eq!(reason, ExitReason::ParentDied);
        assert_eq!(f.handle.status(), WorkerStatus::ParentDied);

        let events = drain(&mut rx);
        assert!(seq_of(&events, EventKind::ParentDeath).is_some());
        assert!(seq_of(&events, EventKind::WorkerStopped).is_none());
    }

    #[tokio::test]
    async fn test_parent_lost_during_init_is_never_confirmed() {
        let (unit, _count) = counting_unit();
        let f = fixture_with_entry(EntryFn::contextless(unit), 5);
        let mut rx = f.bus.subscribe();

        // The supervising process is already gone when the worker starts
        // initializing; the warm-up pass may run, the confirmation must not.
        f.parent.cancel();
        let reason = f.lp.run().await;

        assert_eq!(reason, ExitReason::ParentDied);
        assert_eq!(f.handle.status(), WorkerStatus::ParentDied);
        assert_eq!(f.handle.pid(), None);

        let events = drain(&mut rx);
        assert!(seq_of(&events, EventKind::ParentDeath).is_some());
        assert!(seq_of(&events, EventKind::WorkerStarted).is_none());
    }

    struct BrokenConnect;

    #[async_trait]
    impl ContextProvider for BrokenConnect {
        async fn connect(&mut self) -> Result<(), ContextError> {
            Err(ContextError::new("no data source"))
        }

        async fn begin(&mut self) -> Result<(), ContextError> {
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), ContextError> {
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), ContextError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_failure_stops_before_confirmation() {
        let (unit, count) = counting_unit();
        let entry: EntryRef =
            EntryFn::arc(unit, || Box::new(BrokenConnect) as Box<dyn ContextProvider>);
        let f = fixture_with_entry(entry, 5);
        let mut rx = f.bus.subscribe();

        let reason = f.lp.run().await;

        assert_eq!(reason, ExitReason::InitFailed);
        assert_eq!(f.handle.status(), WorkerStatus::Stopped);
        assert_eq!(f.handle.pid(), None);
        assert_eq!(count.load(Ordering::SeqCst), 0, "no pass may run");

        let events = drain(&mut rx);
        let stopped = events
            .iter()
            .find(|e| e.kind == EventKind::WorkerStopped)
            .expect("failed start must still report");
        assert!(stopped.error.as_deref().unwrap().contains("no data source"));
    }

    #[tokio::test]
    async fn test_spec_without_data_connection_skips_connect() {
        let (unit, _count) = counting_unit();
        let entry: EntryRef =
            EntryFn::arc(unit, || Box::new(BrokenConnect) as Box<dyn ContextProvider>);
        let spec = WorkerSpec::builder("w1")
            .index(1)
            .access(AccessFlags {
                shared_state: true,
                data_connection: false,
            })
            .build(entry);
        let f = fixture_with_spec(spec, 5);
        let join = tokio::spawn(f.lp.run());

        // connect() would fail, but the spec opted out of a data connection.
        let (status, _) = tokio::time::timeout(
            Duration::from_secs(2),
            f.handle.wait_leave_starting(),
        )
        .await
        .unwrap();
        assert_eq!(status, WorkerStatus::Started);

        f.bridge.request_termination();
        let reason = tokio::time::timeout(Duration::from_secs(2), join)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ExitReason::Terminated);
    }
}
