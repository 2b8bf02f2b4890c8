//! # Runtime: slot table and supervision substrate for a worker pool.
//!
//! [`Runtime`] is the in-process [`WorkerHost`]: it owns the slot table,
//! spawns one supervision task per admitted worker, and drives the pool as a
//! whole (signal fan-out, shutdown grace).
//!
//! ## Architecture
//! ```text
//! register_static / register_dynamic
//!        │
//!        ▼ admit(): validate name → capacity → duplicate → take slot
//!   ┌─────────────────────────────────────────────────────┐
//!   │ Slot table (registration order)                     │
//!   │   Slot { spec, handle, bridge, pid, activity }      │
//!   └─────────────────────────────────────────────────────┘
//!        │ spawn on TaskTracker
//!        ▼
//!   supervise(): recovery gate → WorkerLoop::run()
//!                    │                │ panic
//!                    │                ▼
//!                    │         WorkerPanicked → restart policy
//!                    │                │ OnCrash: delay, fresh loop, same slot
//!                    ▼                ▼ Never: report Stopped
//!                  reap(): slot removed when the worker is done
//! ```
//!
//! ## Rules
//! - Admission is atomic under the table's write lock; capacity and name
//!   uniqueness cannot race.
//! - A worker keeps its pid, latch, and bridge across crash restarts. Only
//!   the loop (and with it the context provider) is rebuilt, so termination
//!   requested during the restart delay still reaches the replacement.
//! - Unit failures never reach the restart policy; only escaped panics do.
//! - Workers registered with [`StartTime::AfterRecovery`] park until
//!   [`Runtime::finish_recovery`]; [`StartTime::Immediately`] bypasses the
//!   gate.
//! - [`Runtime::mark_parent_gone`] cancels the parent token: every latch
//!   wait wakes with parent death and every worker exits without cleanup.
//! - [`Runtime::run`] owns a pool-level latch/bridge pair: OS signals are
//!   forwarded into it and fanned out to the worker bridges from one place.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{ConfigSource, WorkerConfig};
use crate::core::host::{ActivityState, StatusReporter, WorkerHandle, WorkerHost, WorkerStatus};
use crate::core::supervisor::Supervisor;
use crate::core::worker_loop::{WorkerLoop, WorkerParts};
use crate::error::{panic_message, RegisterError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::latch::{Latch, Wake};
use crate::signal::{forward_os_signals, SignalBridge};
use crate::worker::{RestartPolicy, StartTime, WorkerSpec};

/// One admitted worker.
struct Slot {
    spec: WorkerSpec,
    handle: WorkerHandle,
    bridge: Arc<SignalBridge>,
    pid: u32,
    activity: Mutex<Option<String>>,
}

/// Point-in-time view of one slot, in registration order.
#[derive(Clone, Debug)]
pub struct WorkerView {
    /// Worker name.
    pub name: String,
    /// Slot index from the spec.
    pub index: u32,
    /// Pid assigned at admission, stable across crash restarts.
    pub pid: u32,
    /// Current lifecycle status.
    pub status: WorkerStatus,
    /// Last self-reported activity line, if any.
    pub activity: Option<String>,
}

/// In-process worker pool host. See the [module docs](self).
pub struct Runtime {
    me: Weak<Runtime>,
    slots: RwLock<Vec<Slot>>,
    capacity: usize,
    sleep_interval: Duration,
    source: Arc<dyn ConfigSource>,
    bus: Bus,
    parent: CancellationToken,
    /// Pool-level request flags; OS signals land here while [`Runtime::run`]
    /// drives the pool, then fan out to the worker bridges.
    pool_bridge: Arc<SignalBridge>,
    recovered: watch::Sender<bool>,
    next_pid: AtomicU32,
    tracker: TaskTracker,
}

impl Runtime {
    /// Creates a runtime whose recovery is already finished: every admitted
    /// worker starts as soon as its slot is taken.
    pub fn new(config: &WorkerConfig, source: Arc<dyn ConfigSource>, bus: Bus) -> Arc<Self> {
        Self::build(config, source, bus, true)
    }

    /// Creates a runtime that parks [`StartTime::AfterRecovery`] workers
    /// until [`Runtime::finish_recovery`] is called.
    ///
    /// Useful when the embedding process has its own warm-up phase and wants
    /// the pool registered, but idle, until that phase completes.
    pub fn recovering(config: &WorkerConfig, source: Arc<dyn ConfigSource>, bus: Bus) -> Arc<Self> {
        Self::build(config, source, bus, false)
    }

    fn build(
        config: &WorkerConfig,
        source: Arc<dyn ConfigSource>,
        bus: Bus,
        recovered: bool,
    ) -> Arc<Self> {
        let (recovered, _) = watch::channel(recovered);
        let parent = CancellationToken::new();
        let pool_bridge = Arc::new(SignalBridge::new(Arc::new(Latch::new(parent.child_token()))));
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            slots: RwLock::new(Vec::new()),
            capacity: config.max_workers as usize,
            sleep_interval: config.sleep_interval(),
            source,
            bus,
            parent,
            pool_bridge,
            recovered,
            next_pid: AtomicU32::new(1),
            tracker: TaskTracker::new(),
        })
    }

    /// The bus this runtime publishes lifecycle events to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Opens the recovery gate; parked workers proceed to start.
    ///
    /// Idempotent. A no-op on runtimes built with [`Runtime::new`].
    pub fn finish_recovery(&self) {
        self.recovered.send_replace(true);
    }

    /// Declares the supervising process gone.
    ///
    /// Cancels the parent token shared by every worker latch; workers exit
    /// abruptly at their next safe point and launches in flight fail.
    pub fn mark_parent_gone(&self) {
        self.parent.cancel();
    }

    /// Asks every registered worker to stop at its next iteration boundary.
    pub async fn request_termination_all(&self) {
        let slots = self.slots.read().await;
        for slot in slots.iter() {
            slot.bridge.request_termination();
        }
    }

    /// Asks every registered worker to re-read configuration.
    pub async fn request_reconfigure_all(&self) {
        let slots = self.slots.read().await;
        for slot in slots.iter() {
            slot.bridge.request_reconfigure();
        }
    }

    /// Snapshot of all occupied slots, in registration order.
    pub async fn workers(&self) -> Vec<WorkerView> {
        let slots = self.slots.read().await;
        slots
            .iter()
            .map(|s| WorkerView {
                name: s.spec.name().to_owned(),
                index: s.spec.index(),
                pid: s.pid,
                status: s.handle.status(),
                activity: s
                    .activity
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone(),
            })
            .collect()
    }

    /// Number of occupied slots.
    pub async fn worker_count(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Drives the pool until it stops.
    ///
    /// Registers the supervisor's static workers, then parks on the pool's
    /// own latch/bridge pair: [`forward_os_signals`] turns SIGTERM/SIGINT
    /// into a termination request and SIGHUP into a reconfigure request, and
    /// the loop here fans each request out to every worker bridge. A
    /// termination request publishes `ShutdownRequested` and waits up to the
    /// configured grace; a reconfigure request keeps the pool running.
    /// Returns early with `Ok` if every worker stops on its own.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] when some workers ignored the grace
    /// period; their names ride in the error.
    pub async fn run(self: &Arc<Self>, supervisor: &Supervisor) -> Result<(), RuntimeError> {
        supervisor.register_static().await;
        self.tracker.close();

        let latch = self.pool_bridge.latch();
        let forward = forward_os_signals(&self.pool_bridge);
        tokio::pin!(forward);

        loop {
            let shutdown = tokio::select! {
                // Resolves once a termination signal was forwarded; a failed
                // listener install counts as a termination request too.
                _ = &mut forward => true,
                // Timeout and parent death are masked out: only a request
                // landing in the pool bridge wakes this wait.
                _ = latch.wait(Duration::MAX, Wake::LATCH_SET) => {
                    latch.reset();
                    if self.pool_bridge.take_termination() {
                        true
                    } else {
                        if self.pool_bridge.take_reconfigure() {
                            self.request_reconfigure_all().await;
                        }
                        false
                    }
                }
                _ = self.tracker.wait() => return Ok(()),
            };

            if shutdown {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                self.request_termination_all().await;
                break;
            }
        }

        self.wait_all_with_grace(supervisor.grace()).await
    }

    /// Waits for every supervision task to finish within `grace`.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] with the stuck worker names on timeout.
    pub async fn wait_all_with_grace(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.tracker.close();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.stuck_workers().await;
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Takes a slot and spawns the supervision task for it.
    async fn admit(&self, spec: WorkerSpec) -> Result<WorkerHandle, RegisterError> {
        spec.validate_name()?;

        let mut slots = self.slots.write().await;
        if slots.len() >= self.capacity {
            return Err(RegisterError::RegistryFull {
                capacity: self.capacity,
            });
        }
        if slots.iter().any(|s| s.spec.name() == spec.name()) {
            return Err(RegisterError::Duplicate {
                name: spec.name().to_owned(),
            });
        }

        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let latch = Arc::new(Latch::new(self.parent.child_token()));
        let bridge = Arc::new(SignalBridge::new(Arc::clone(&latch)));
        let (reporter, handle) = WorkerHandle::new_pair(spec.name().to_owned(), spec.index());

        slots.push(Slot {
            spec: spec.clone(),
            handle: handle.clone(),
            bridge: Arc::clone(&bridge),
            pid,
            activity: Mutex::new(None),
        });
        drop(slots);

        self.bus.publish(
            Event::new(EventKind::WorkerRegistered)
                .with_worker(spec.name().to_owned())
                .with_index(spec.index())
                .with_pid(pid),
        );

        self.tracker
            .spawn(supervise(self.me.clone(), spec, latch, bridge, reporter, pid));
        Ok(handle)
    }

    /// Parks a pool-start worker until recovery completes.
    ///
    /// Returns `false` if the parent disappeared while waiting.
    async fn hold_until_recovered(&self, reporter: &StatusReporter) -> bool {
        let mut gate = self.recovered.subscribe();
        tokio::select! {
            biased;
            _ = self.parent.cancelled() => {
                reporter.publish(WorkerStatus::ParentDied);
                false
            }
            res = gate.wait_for(|ready| *ready) => res.is_ok(),
        }
    }

    /// Frees the slot once its worker is done for good.
    async fn reap(&self, worker: &str) {
        let mut slots = self.slots.write().await;
        slots.retain(|s| s.spec.name() != worker);
    }

    async fn stuck_workers(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        slots
            .iter()
            .filter(|s| !s.handle.status().is_terminal())
            .map(|s| s.spec.name().to_owned())
            .collect()
    }
}

#[async_trait]
impl WorkerHost for Runtime {
    async fn register_static(&self, spec: WorkerSpec) {
        let name = spec.name().to_owned();
        let index = spec.index();
        if let Err(e) = self.admit(spec).await {
            self.bus.publish(
                Event::new(EventKind::RegistrationRefused)
                    .with_worker(name)
                    .with_index(index)
                    .with_error(e.to_string()),
            );
        }
    }

    async fn register_dynamic(&self, spec: WorkerSpec) -> Result<WorkerHandle, RegisterError> {
        self.admit(spec).await
    }

    async fn wait_for_start(&self, handle: &WorkerHandle) -> (WorkerStatus, Option<u32>) {
        handle.wait_leave_starting().await
    }

    async fn report_activity(&self, worker: &str, state: ActivityState, description: Option<&str>) {
        let line = match description {
            Some(d) => format!("{state}: {d}"),
            None => state.to_string(),
        };
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.iter().find(|s| s.spec.name() == worker) {
                *slot.activity.lock().unwrap_or_else(|e| e.into_inner()) = Some(line.clone());
            }
        }
        self.bus.publish(
            Event::new(EventKind::ActivityChanged)
                .with_worker(worker.to_owned())
                .with_reason(line),
        );
    }

    fn is_parent_alive(&self) -> bool {
        !self.parent.is_cancelled()
    }

    fn parent_token(&self) -> CancellationToken {
        self.parent.clone()
    }
}

/// Supervision wrapper for one slot: recovery gate, panic containment,
/// restart policy, and final reaping.
async fn supervise(
    me: Weak<Runtime>,
    spec: WorkerSpec,
    latch: Arc<Latch>,
    bridge: Arc<SignalBridge>,
    reporter: StatusReporter,
    pid: u32,
) {
    let Some(rt) = me.upgrade() else { return };
    let worker: Arc<str> = Arc::from(spec.name());
    let index = spec.index();

    if spec.start_time() == StartTime::AfterRecovery && !rt.hold_until_recovered(&reporter).await {
        rt.reap(&worker).await;
        return;
    }

    loop {
        let parts = WorkerParts {
            latch: Arc::clone(&latch),
            bridge: Arc::clone(&bridge),
            source: Arc::clone(&rt.source),
            host: Arc::clone(&rt) as Arc<dyn WorkerHost>,
            reporter: reporter.clone(),
            bus: rt.bus.clone(),
            pid,
            sleep_interval: rt.sleep_interval,
        };
        let looped = WorkerLoop::new(spec.clone(), parts);

        match std::panic::AssertUnwindSafe(looped.run()).catch_unwind().await {
            Ok(_reason) => break,
            Err(payload) => {
                rt.bus.publish(
                    Event::new(EventKind::WorkerPanicked)
                        .with_worker(Arc::clone(&worker))
                        .with_index(index)
                        .with_pid(pid)
                        .with_error(panic_message(payload)),
                );
                match spec.restart() {
                    RestartPolicy::OnCrash { delay } => {
                        rt.bus.publish(
                            Event::new(EventKind::WorkerRestarting)
                                .with_worker(Arc::clone(&worker))
                                .with_index(index)
                                .with_pid(pid)
                                .with_delay(delay),
                        );
                        tokio::select! {
                            biased;
                            _ = rt.parent.cancelled() => {
                                reporter.publish(WorkerStatus::ParentDied);
                                break;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    RestartPolicy::Never => {
                        reporter.publish(WorkerStatus::Stopped);
                        break;
                    }
                }
            }
        }
    }

    rt.reap(&worker).await;
}
