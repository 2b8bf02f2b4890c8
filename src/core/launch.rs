//! # Launch: on-demand worker admission with confirmation.
//!
//! [`launch_worker`] is the protocol behind [`Supervisor::launch`]: ask the
//! host to admit a spec, then hold the caller until the new worker confirms
//! liveness or visibly fails.
//!
//! ```text
//! LaunchRequested ──► register_dynamic ──► wait_for_start ──► LaunchConfirmed
//!                          │ refused            │
//!                          ▼                    ▼ timeout / stopped / orphaned
//!                     LaunchFailed         LaunchFailed
//! ```
//!
//! ## Rules
//! - Exactly one of `LaunchConfirmed` / `LaunchFailed` follows every
//!   `LaunchRequested`.
//! - Refusals, start timeouts, and workers that stop before confirming all
//!   map to [`LaunchError::InsufficientResources`], which is worth retrying
//!   once capacity frees up. A worker orphaned mid-start maps to
//!   [`LaunchError::SupervisorGone`], which is not.
//! - The wait is bounded by the configured start timeout. A worker still
//!   initializing when it expires counts as failed even if it comes up later;
//!   the host keeps running it, only the confirmation is abandoned.
//! - The host's parent token is watched during the wait: a supervising
//!   process lost mid-wait fails with [`LaunchError::SupervisorGone`] right
//!   away, without waiting out the start timeout.
//!
//! [`Supervisor::launch`]: crate::core::Supervisor::launch

use std::sync::Arc;
use std::time::Duration;

use crate::core::host::{WorkerHost, WorkerStatus};
use crate::error::LaunchError;
use crate::events::{Bus, Event, EventKind};
use crate::worker::WorkerSpec;

/// Admits `spec` on `host` and waits for the worker to confirm.
///
/// Returns the confirmed worker's pid. See the [module docs](self) for the
/// event contract.
pub(crate) async fn launch_worker(
    host: &Arc<dyn WorkerHost>,
    spec: WorkerSpec,
    start_timeout: Duration,
    bus: &Bus,
) -> Result<u32, LaunchError> {
    let worker: Arc<str> = Arc::from(spec.name());
    let index = spec.index();

    bus.publish(
        Event::new(EventKind::LaunchRequested)
            .with_worker(Arc::clone(&worker))
            .with_index(index),
    );

    let handle = match host.register_dynamic(spec).await {
        Ok(handle) => handle,
        Err(e) => {
            let err = LaunchError::InsufficientResources {
                reason: e.to_string(),
            };
            publish_failed(bus, &worker, index, &err);
            return Err(err);
        }
    };

    let parent = host.parent_token();
    let outcome = tokio::select! {
        // A parent lost mid-wait fails the launch now, not at the timeout.
        _ = parent.cancelled() => Ok((WorkerStatus::ParentDied, None)),
        outcome = tokio::time::timeout(start_timeout, host.wait_for_start(&handle)) => outcome,
    };
    match outcome {
        Err(_) => {
            let err = LaunchError::InsufficientResources {
                reason: format!("did not confirm start within {start_timeout:?}"),
            };
            publish_failed(bus, &worker, index, &err);
            Err(err)
        }
        Ok((WorkerStatus::Started, Some(pid))) => {
            bus.publish(
                Event::new(EventKind::LaunchConfirmed)
                    .with_worker(Arc::clone(&worker))
                    .with_index(index)
                    .with_pid(pid),
            );
            Ok(pid)
        }
        Ok((WorkerStatus::Started, None)) => {
            unreachable!("a worker cannot confirm start without a pid")
        }
        Ok((WorkerStatus::Stopped, _)) => {
            let err = LaunchError::InsufficientResources {
                reason: "worker stopped before confirming start".to_owned(),
            };
            publish_failed(bus, &worker, index, &err);
            Err(err)
        }
        Ok((WorkerStatus::ParentDied, _)) => {
            let err = LaunchError::SupervisorGone;
            publish_failed(bus, &worker, index, &err);
            Err(err)
        }
        Ok((WorkerStatus::Starting, _)) => {
            unreachable!("wait_for_start resolved while still starting")
        }
    }
}

fn publish_failed(bus: &Bus, worker: &Arc<str>, index: u32, err: &LaunchError) {
    bus.publish(
        Event::new(EventKind::LaunchFailed)
            .with_worker(Arc::clone(worker))
            .with_index(index)
            .with_error(err.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::{ActivityState, StatusReporter, WorkerHandle};
    use crate::error::RegisterError;
    use crate::work::MaintenanceFn;
    use crate::worker::EntryFn;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    enum Script {
        Refuse,
        Confirm(u32),
        StopEarly,
        Orphan,
        Stall,
    }

    struct ScriptedHost {
        script: Script,
        parent: CancellationToken,
        // Keeps the stalled worker's reporter alive so the wait really hangs.
        keep: Mutex<Option<StatusReporter>>,
    }

    impl ScriptedHost {
        fn arc(script: Script) -> Arc<dyn WorkerHost> {
            Self::with_parent(script, CancellationToken::new())
        }

        fn with_parent(script: Script, parent: CancellationToken) -> Arc<dyn WorkerHost> {
            Arc::new(Self {
                script,
                parent,
                keep: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl WorkerHost for ScriptedHost {
        async fn register_static(&self, _spec: WorkerSpec) {}

        async fn register_dynamic(&self, spec: WorkerSpec) -> Result<WorkerHandle, RegisterError> {
            if matches!(self.script, Script::Refuse) {
                return Err(RegisterError::RegistryFull { capacity: 4 });
            }
            let (reporter, handle) = WorkerHandle::new_pair(spec.name().to_owned(), spec.index());
            match self.script {
                Script::Confirm(pid) => reporter.started(pid),
                Script::StopEarly => reporter.publish(WorkerStatus::Stopped),
                Script::Orphan => reporter.publish(WorkerStatus::ParentDied),
                Script::Stall => *self.keep.lock().unwrap() = Some(reporter),
                Script::Refuse => unreachable!(),
            }
            Ok(handle)
        }

        async fn wait_for_start(&self, handle: &WorkerHandle) -> (WorkerStatus, Option<u32>) {
            handle.wait_leave_starting().await
        }

        async fn report_activity(
            &self,
            _worker: &str,
            _state: ActivityState,
            _description: Option<&str>,
        ) {
        }

        fn is_parent_alive(&self) -> bool {
            !self.parent.is_cancelled()
        }

        fn parent_token(&self) -> CancellationToken {
            self.parent.clone()
        }
    }

    fn spec(name: &str) -> WorkerSpec {
        let unit = MaintenanceFn::arc(|| async { Ok(()) });
        WorkerSpec::builder(name)
            .index(9)
            .build(EntryFn::contextless(unit))
    }

    fn kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test]
    async fn test_confirmed_launch_returns_pid() {
        let host = ScriptedHost::arc(Script::Confirm(42));
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let pid = launch_worker(&host, spec("dyn_1"), Duration::from_secs(1), &bus)
            .await
            .unwrap();

        assert_eq!(pid, 42);
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::LaunchRequested, EventKind::LaunchConfirmed]
        );
    }

    #[tokio::test]
    async fn test_refused_registration_is_retryable() {
        let host = ScriptedHost::arc(Script::Refuse);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let err = launch_worker(&host, spec("dyn_1"), Duration::from_secs(1), &bus)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("capacity"));
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::LaunchRequested, EventKind::LaunchFailed]
        );
    }

    #[tokio::test]
    async fn test_worker_stopping_before_confirmation_fails() {
        let host = ScriptedHost::arc(Script::StopEarly);
        let bus = Bus::new(64);

        let err = launch_worker(&host, spec("dyn_1"), Duration::from_secs(1), &bus)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("before confirming"));
    }

    #[tokio::test]
    async fn test_orphaned_start_is_not_retryable() {
        let host = ScriptedHost::arc(Script::Orphan);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let err = launch_worker(&host, spec("dyn_1"), Duration::from_secs(1), &bus)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::SupervisorGone));
        assert!(!err.is_retryable());
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::LaunchRequested, EventKind::LaunchFailed]
        );
    }

    #[tokio::test]
    async fn test_slow_start_times_out() {
        let host = ScriptedHost::arc(Script::Stall);
        let bus = Bus::new(64);

        let err = launch_worker(&host, spec("dyn_1"), Duration::from_millis(20), &bus)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("did not confirm"));
    }

    #[tokio::test]
    async fn test_parent_lost_mid_wait_cuts_confirmation_short() {
        let parent = CancellationToken::new();
        let host = ScriptedHost::with_parent(Script::Stall, parent.clone());
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            parent.cancel();
        });

        // Stalled worker, generous timeout: only the dying parent can end
        // this wait early.
        let err = launch_worker(&host, spec("dyn_1"), Duration::from_secs(30), &bus)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::SupervisorGone));
        assert!(!err.is_retryable());
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::LaunchRequested, EventKind::LaunchFailed]
        );
    }
}
