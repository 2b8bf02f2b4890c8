//! # Host substrate: the narrow interface workers and supervisors talk to.
//!
//! [`WorkerHost`] abstracts whatever actually runs workers: the in-process
//! [`Runtime`](crate::core::Runtime), or a scripted fake in tests. The
//! supervision logic upstream of this trait never changes when the substrate
//! does.
//!
//! [`WorkerHandle`] / [`StatusReporter`] are the two ends of a watch channel
//! carrying a worker's lifecycle status:
//!
//! ```text
//!   StatusReporter (worker side)          WorkerHandle (observer side)
//!   ───────────────────────────          ─────────────────────────────
//!   started(pid)   ──► Started+pid  ──►  status(), pid()
//!   publish(...)   ──► Stopped/...  ──►  wait_leave_starting()
//! ```
//!
//! ## Status machine
//! ```text
//! Starting ──► Started ──► Stopped
//!     │            └─────► ParentDied
//!     ├──────────► Stopped
//!     └──────────► ParentDied
//! ```
//! Transitions are monotonic: a publication that does not advance the status
//! is ignored, so no observer ever sees a regression.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::RegisterError;
use crate::worker::WorkerSpec;

/// Lifecycle status a worker reports through its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Registered; has not confirmed liveness yet.
    Starting,
    /// Confirmed liveness (warm-up pass done); pid is available.
    Started,
    /// Exited cleanly or stopped before ever confirming. Terminal.
    Stopped,
    /// Exited because the supervising process disappeared. Terminal.
    ParentDied,
}

impl WorkerStatus {
    /// Whether no further transitions can follow.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Stopped | WorkerStatus::ParentDied)
    }

    fn rank(self) -> u8 {
        match self {
            WorkerStatus::Starting => 0,
            WorkerStatus::Started => 1,
            WorkerStatus::Stopped | WorkerStatus::ParentDied => 2,
        }
    }
}

/// Activity a worker reports to its host while it runs.
///
/// The host records the latest report per worker for display; stale values
/// are overwritten, never queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityState {
    /// A cycle (or initialization) is in progress.
    Running,
    /// Waiting for the next wake.
    Idle,
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityState::Running => write!(f, "running"),
            ActivityState::Idle => write!(f, "idle"),
        }
    }
}

/// Snapshot carried by the status channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StatusCell {
    status: WorkerStatus,
    pid: Option<u32>,
}

/// Observer side of a worker's status channel.
///
/// Cheap to clone; remains readable after the worker exits (it keeps
/// reporting the final status).
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    name: Arc<str>,
    index: u32,
    rx: watch::Receiver<StatusCell>,
}

impl WorkerHandle {
    /// Creates a connected reporter/handle pair with status
    /// [`WorkerStatus::Starting`] and no pid.
    pub fn new_pair(name: impl Into<Arc<str>>, index: u32) -> (StatusReporter, WorkerHandle) {
        let name: Arc<str> = name.into();
        let (tx, rx) = watch::channel(StatusCell {
            status: WorkerStatus::Starting,
            pid: None,
        });
        (
            StatusReporter {
                name: Arc::clone(&name),
                index,
                tx: Arc::new(tx),
            },
            WorkerHandle { name, index, rx },
        )
    }

    /// The worker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slot index from the worker's spec.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The status at this moment.
    pub fn status(&self) -> WorkerStatus {
        self.rx.borrow().status
    }

    /// The pid, if the worker has confirmed its start.
    pub fn pid(&self) -> Option<u32> {
        self.rx.borrow().pid
    }

    /// Waits until the status leaves [`WorkerStatus::Starting`] and returns
    /// what it settled on.
    ///
    /// If the reporting side disappears without ever confirming, the worker
    /// is gone: this reports [`WorkerStatus::Stopped`].
    pub async fn wait_leave_starting(&self) -> (WorkerStatus, Option<u32>) {
        let mut rx = self.rx.clone();
        let settled = match rx.wait_for(|cell| cell.status != WorkerStatus::Starting).await {
            Ok(cell) => (cell.status, cell.pid),
            Err(_) => {
                let cell = *self.rx.borrow();
                if cell.status == WorkerStatus::Starting {
                    (WorkerStatus::Stopped, None)
                } else {
                    (cell.status, cell.pid)
                }
            }
        };
        settled
    }
}

/// Publishing side of a worker's status channel; held by the worker task.
///
/// Clones share the same channel, which lets a respawned loop reuse its
/// slot's reporter.
#[derive(Clone, Debug)]
pub struct StatusReporter {
    name: Arc<str>,
    index: u32,
    tx: Arc<watch::Sender<StatusCell>>,
}

impl StatusReporter {
    /// The worker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slot index from the worker's spec.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Confirms liveness, recording the pid together with
    /// [`WorkerStatus::Started`] in one update so observers never see the
    /// status without the pid.
    pub fn started(&self, pid: u32) {
        self.advance(WorkerStatus::Started, Some(pid));
    }

    /// Publishes a status without touching the pid.
    pub fn publish(&self, status: WorkerStatus) {
        self.advance(status, None);
    }

    /// Applies an update only if it advances the status. Repeats and
    /// regressions are dropped, keeping the channel monotonic.
    fn advance(&self, status: WorkerStatus, pid: Option<u32>) {
        self.tx.send_if_modified(|cell| {
            if status.rank() > cell.status.rank() {
                cell.status = status;
                if let Some(pid) = pid {
                    cell.pid = Some(pid);
                }
                true
            } else {
                false
            }
        });
    }
}

/// # Substrate that registers, runs, and observes workers.
///
/// Two registration paths exist on purpose:
/// - [`register_static`](WorkerHost::register_static) is fire-and-forget, for
///   pool start-up where the caller has nothing useful to do with a refusal
///   beyond logging it (the host publishes a `RegistrationRefused` event).
/// - [`register_dynamic`](WorkerHost::register_dynamic) returns a handle (or
///   the refusal) for callers that follow the launch protocol.
#[async_trait]
pub trait WorkerHost: Send + Sync + 'static {
    /// Registers a worker without reporting the outcome to the caller.
    async fn register_static(&self, spec: WorkerSpec);

    /// Registers a worker and returns its handle.
    async fn register_dynamic(&self, spec: WorkerSpec) -> Result<WorkerHandle, RegisterError>;

    /// Blocks until `handle`'s status leaves `Starting`.
    ///
    /// Unbounded from the host's point of view; the launch protocol wraps it
    /// in a timeout, so even a substrate that never resolves cannot hang a
    /// launch.
    async fn wait_for_start(&self, handle: &WorkerHandle) -> (WorkerStatus, Option<u32>);

    /// Records what `worker` is doing right now.
    async fn report_activity(
        &self,
        worker: &str,
        state: ActivityState,
        description: Option<&str>,
    );

    /// Whether the supervising process is still alive.
    fn is_parent_alive(&self) -> bool;

    /// Token cancelled when the supervising process disappears. Worker
    /// latches are built from child tokens of this one.
    fn parent_token(&self) -> CancellationToken;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_pair_starts_in_starting() {
        let (_reporter, handle) = WorkerHandle::new_pair("w", 1);
        assert_eq!(handle.status(), WorkerStatus::Starting);
        assert_eq!(handle.pid(), None);
    }

    #[test]
    fn test_started_publishes_status_and_pid_together() {
        let (reporter, handle) = WorkerHandle::new_pair("w", 1);
        reporter.started(7);

        assert_eq!(handle.status(), WorkerStatus::Started);
        assert_eq!(handle.pid(), Some(7));
    }

    #[test]
    fn test_status_never_regresses() {
        let (reporter, handle) = WorkerHandle::new_pair("w", 1);
        reporter.publish(WorkerStatus::Stopped);

        // Late confirmations and regressions are dropped.
        reporter.started(9);
        reporter.publish(WorkerStatus::Starting);

        assert_eq!(handle.status(), WorkerStatus::Stopped);
        assert_eq!(handle.pid(), None);
    }

    #[test]
    fn test_terminal_statuses_do_not_replace_each_other() {
        let (reporter, handle) = WorkerHandle::new_pair("w", 1);
        reporter.publish(WorkerStatus::ParentDied);
        reporter.publish(WorkerStatus::Stopped);

        assert_eq!(handle.status(), WorkerStatus::ParentDied);
    }

    #[tokio::test]
    async fn test_wait_leave_starting_observes_late_confirmation() {
        let (reporter, handle) = WorkerHandle::new_pair("w", 1);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            reporter.started(3);
        });

        let (status, pid) = tokio::time::timeout(
            Duration::from_secs(2),
            handle.wait_leave_starting(),
        )
        .await
        .unwrap();

        assert_eq!(status, WorkerStatus::Started);
        assert_eq!(pid, Some(3));
    }

    #[tokio::test]
    async fn test_wait_leave_starting_handles_vanished_reporter() {
        let (reporter, handle) = WorkerHandle::new_pair("w", 1);
        drop(reporter);

        let (status, pid) = handle.wait_leave_starting().await;
        assert_eq!(status, WorkerStatus::Stopped);
        assert_eq!(pid, None);
    }
}
