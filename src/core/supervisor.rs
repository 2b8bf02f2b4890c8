//! # Supervisor: the worker pool's front door.
//!
//! The [`Supervisor`] validates pool configuration, synthesizes one
//! [`WorkerSpec`] per configured slot, and registers them with whatever
//! [`WorkerHost`] substrate it was given. It also exposes the dynamic launch
//! path: admit one more worker now and hold the caller until that worker
//! confirms liveness.
//!
//! The supervisor never touches slots, tasks, or pids itself. Everything
//! process-shaped goes through the [`WorkerHost`] seam, so the same supervisor
//! drives the in-process [`Runtime`](crate::core::runtime::Runtime) in
//! production and a scripted host in tests.
//!
//! ## High-level architecture
//! ```text
//! Startup:
//!   Supervisor::new(config, host, entry, bus)      config range-checked here
//!        │
//!        ▼ register_static():  one spec per index, 1..=worker_count
//!   host.register_static("{base}_1") ... host.register_static("{base}_N")
//!        (fire-and-forget; refusals surface as RegistrationRefused events)
//!
//! On demand:
//!   launch(index) ── async mutex ──► launch_worker(host, spec, start_timeout)
//!        │                                   │
//!        ▼                                   ▼
//!   Ok(pid)                    LaunchError (retryable or fatal)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bgvisor::{Bus, EntryFn, MaintenanceFn, MemorySource, Runtime, Supervisor, WorkerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig {
//!         worker_count: 2,
//!         ..WorkerConfig::default()
//!     };
//!     let source = Arc::new(MemorySource::new(config.clone()));
//!     let bus = Bus::new(256);
//!     let runtime = Runtime::new(&config, source, bus.clone());
//!
//!     let unit = MaintenanceFn::arc(|| async {
//!         // one maintenance pass
//!         Ok(())
//!     });
//!     let sup = Supervisor::new(config, runtime.clone(), EntryFn::contextless(unit), bus)?;
//!
//!     sup.register_static().await;
//!     let pid = sup.launch(7).await?;
//!     assert!(pid > 0);
//!
//!     runtime.request_termination_all().await;
//!     runtime.wait_all_with_grace(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::WorkerConfig;
use crate::core::host::WorkerHost;
use crate::core::launch::launch_worker;
use crate::core::runtime::Runtime;
use crate::error::{ConfigError, LaunchError, RuntimeError};
use crate::events::Bus;
use crate::worker::{AccessFlags, EntryRef, RestartPolicy, StartTime, WorkerSpec};

/// Default base for synthesized worker names (`worker_1`, `worker_2`, ...).
const DEFAULT_BASE_NAME: &str = "worker";

/// Registers the static pool and launches workers on demand. See the
/// [module docs](self).
pub struct Supervisor {
    config: WorkerConfig,
    host: Arc<dyn WorkerHost>,
    entry: EntryRef,
    base_name: String,
    bus: Bus,
    /// Serializes concurrent launches so handle bookkeeping stays consistent.
    launch_gate: Mutex<()>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("base_name", &self.base_name)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Creates a supervisor over `host`, validating `config` up front.
    ///
    /// Every synthesized worker shares `entry`: the entry hands out the
    /// (shared) maintenance unit and a fresh context provider per worker.
    ///
    /// # Errors
    /// [`ConfigError::OutOfRange`] if any field is outside its permitted
    /// range; nothing is registered in that case.
    pub fn new(
        config: WorkerConfig,
        host: Arc<dyn WorkerHost>,
        entry: EntryRef,
        bus: Bus,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            host,
            entry,
            base_name: DEFAULT_BASE_NAME.to_owned(),
            bus,
            launch_gate: Mutex::new(()),
        })
    }

    /// Overrides the base used for synthesized worker names.
    #[must_use]
    pub fn with_base_name(mut self, base: impl Into<String>) -> Self {
        self.base_name = base.into();
        self
    }

    /// The validated pool configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Shutdown grace window from the configuration.
    pub fn grace(&self) -> std::time::Duration {
        self.config.grace()
    }

    /// Registers the static pool: one worker per index in `1..=worker_count`.
    ///
    /// Fire-and-forget, matching process-start registration: nobody waits for
    /// these workers to come up, and a refusal (full slot table) surfaces as a
    /// `RegistrationRefused` event rather than an error. Static workers start
    /// behind the host's recovery gate.
    pub async fn register_static(&self) {
        for index in 1..=self.config.worker_count {
            let spec = self.build_spec(index, StartTime::AfterRecovery);
            self.host.register_static(spec).await;
        }
    }

    /// Launches one additional worker and waits for its confirmation.
    ///
    /// The new worker is named like the static ones (`"{base}_{index}"`), so
    /// launching an index that is already registered is refused as a duplicate
    /// and reported as [`LaunchError::InsufficientResources`]. Dynamic workers
    /// skip the recovery gate.
    ///
    /// Concurrent launches are serialized; each waits at most the configured
    /// start timeout.
    ///
    /// # Errors
    /// - [`LaunchError::InsufficientResources`]: refused registration, start
    ///   timeout, or the worker stopped before confirming. Worth retrying once
    ///   capacity frees up.
    /// - [`LaunchError::SupervisorGone`]: the supervising process disappeared.
    ///   Fatal for the pool.
    pub async fn launch(&self, index: u32) -> Result<u32, LaunchError> {
        let _serialized = self.launch_gate.lock().await;
        let spec = self.build_spec(index, StartTime::Immediately);
        launch_worker(&self.host, spec, self.config.start_timeout(), &self.bus).await
    }

    /// Registers the static pool on `runtime` and drives it until it stops.
    ///
    /// Convenience over [`Runtime::run`] for the common case where the host
    /// substrate is the in-process runtime.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] when shutdown grace ran out with
    /// workers still running.
    pub async fn run(&self, runtime: &Arc<Runtime>) -> Result<(), RuntimeError> {
        runtime.run(self).await
    }

    fn build_spec(&self, index: u32, start_time: StartTime) -> WorkerSpec {
        WorkerSpec::builder(format!("{}_{}", self.base_name, index))
            .index(index)
            .access(AccessFlags::all())
            .restart(RestartPolicy::Never)
            .start_time(start_time)
            .build(Arc::clone(&self.entry))
    }
}
