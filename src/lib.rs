//! # bgvisor
//!
//! **Bgvisor** is a lightweight background-worker supervision library for Rust.
//!
//! It provides primitives to define, pace, and supervise long-lived maintenance
//! workers: a pool of identical workers that sleep on a latch, wake for signals
//! or timeouts, run one work cycle, and go back to sleep. The crate is designed
//! as a building block for daemons that keep shared state fresh in the
//! background.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  WorkerSpec  │   │  WorkerSpec  │   │  WorkerSpec  │
//!     │  (worker_1)  │   │  (worker_2)  │   │ (launch(7))  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (pool front door)                                     │
//! │  - validates WorkerConfig up front                                │
//! │  - synthesizes one spec per slot (worker_1 .. worker_N)           │
//! │  - launch(index): admit one extra worker, wait for confirmation   │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼  WorkerHost seam
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime (slot table and supervision)                             │
//! │  - capacity-bounded slots, one per registered worker              │
//! │  - catches panics, respawns crashed workers into the same slot    │
//! │  - recovery gate holds pool workers until finish_recovery()       │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  WorkerLoop  │   │  WorkerLoop  │   │  WorkerLoop  │
//!     │ (wait/cycle) │   │ (wait/cycle) │   │ (wait/cycle) │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │                  │                  │
//!      │ Publishes        │ Publishes        │ Publishes
//!      │ Events:          │ Events:          │ Events:
//!      │ - WorkerStarted  │ - CycleStarted   │ - ReloadApplied
//!      │ - CycleFailed    │ - WorkerStopped  │ - ...
//!      │                  │                  │
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                           ┌───────────────┐
//!                           │ SubscriberSet │
//!                           │ (per-sub q's) │
//!                           └─┬─────┬─────┬─┘
//!                             ▼     ▼     ▼
//!                           sub1   sub2   subN
//!                            .on_event() each
//! ```
//!
//! ### Worker lifecycle
//! ```text
//! WorkerSpec ──► Supervisor ──► Runtime slot ──► WorkerLoop::run()
//!
//!   ├─► publish WorkerStarting
//!   ├─► connect() the context provider (if access.data_connection)
//!   ├─► warm-up cycle (cycle 0) before confirming liveness
//!   ├─► confirm: status Started + pid, publish WorkerStarted
//!   └─► loop {
//!         ├─► latch.wait(sleep_interval, Wake::ALL), then reset
//!         ├─► parent death?  ──► exit abruptly (no shutdown events)
//!         ├─► termination?   ──► break; publish WorkerStopped
//!         ├─► reconfigure?   ──► reload config, fall through to cycle
//!         └─► run one maintenance cycle (exactly one terminal event)
//!       }
//!
//! On panic: the Runtime catches it, publishes WorkerPanicked, and with
//! RestartPolicy::OnCrash respawns into the same slot after the delay.
//! Requests made while the worker was down stick and reach the replacement.
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                                      |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------------------|
//! | **Supervision**   | Register a fixed pool and launch extra workers on demand.        | [`Supervisor`], [`Runtime`]                             |
//! | **Worker loop**   | Latch-paced wait/cycle state machine, one per worker.            | [`WorkerLoop`], [`Latch`], [`Wake`]                     |
//! | **Maintenance**   | Define the per-cycle unit of work and its data context.          | [`Maintenance`], [`MaintenanceFn`], [`ContextProvider`] |
//! | **Signals**       | Sticky per-worker requests, bridged from OS signals.             | [`SignalBridge`], [`SignalRequest`]                     |
//! | **Configuration** | Validated settings with classified live reload.                  | [`WorkerConfig`], [`ConfigSource`], [`ReloadClass`]     |
//! | **Subscriber API**| Hook into worker lifecycle events (logging, custom subscribers). | [`Subscribe`], [`SubscriberSet`]                        |
//! | **Errors**        | Typed errors for work, configuration, and launch paths.          | [`WorkError`], [`LaunchError`], [`RuntimeError`]        |
//!
//! ## Optional features
//! - `logging`: ships [`LogWriter`], a stdout event printer for demos and
//!   quick diagnostics.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bgvisor::{Bus, EntryFn, MaintenanceFn, MemorySource, Runtime, Supervisor, SubscriberSet, WorkerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig {
//!         worker_count: 2,
//!         sleep_interval_ms: 50,
//!         ..WorkerConfig::default()
//!     };
//!     let source = Arc::new(MemorySource::new(config.clone()));
//!     let bus = Bus::new(256);
//!
//!     // Observers are optional; the pool runs fine with none.
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn bgvisor::Subscribe>> = {
//!         use bgvisor::LogWriter;
//!         vec![Arc::new(LogWriter)]
//!     };
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn bgvisor::Subscribe>> = Vec::new();
//!     let set = Arc::new(SubscriberSet::new(subs, bus.clone()));
//!     let _listener = set.spawn_listener(&bus);
//!
//!     // The runtime owns the slot table; the supervisor registers into it.
//!     let runtime = Runtime::new(&config, source, bus.clone());
//!
//!     // Every worker runs the same maintenance unit each cycle.
//!     let unit = MaintenanceFn::arc(|| async {
//!         // one maintenance pass
//!         Ok(())
//!     });
//!     let sup = Supervisor::new(config, runtime.clone(), EntryFn::contextless(unit), bus)?;
//!
//!     // Static pool: worker_1 and worker_2. Dynamic: one more on demand.
//!     sup.register_static().await;
//!     let pid = sup.launch(7).await?;
//!     assert!(pid > 0);
//!
//!     // Wind down: ask every worker to stop, then wait out the grace window.
//!     runtime.request_termination_all().await;
//!     runtime.wait_all_with_grace(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod latch;
mod signal;
mod subscribers;
mod work;
mod worker;

// ---- Public re-exports ----

pub use config::{
    load_with_timeout, ConfigSource, MemorySource, ReloadClass, WorkerConfig, RELOAD_TIMEOUT,
};
pub use core::{
    ActivityState, ExitReason, Runtime, StatusReporter, Supervisor, WorkerHandle, WorkerHost,
    WorkerLoop, WorkerParts, WorkerStatus, WorkerView,
};
pub use error::{
    ConfigError, ContextError, CycleError, LaunchError, RegisterError, RuntimeError, WorkError,
};
pub use events::{Bus, Event, EventKind};
pub use latch::{Latch, Wake};
pub use signal::{forward_os_signals, wait_for_signal, SignalBridge, SignalRequest};
pub use subscribers::{Subscribe, SubscriberSet};
pub use work::{
    run_cycle, ContextProvider, CycleResult, Maintenance, MaintenanceFn, MaintenanceRef,
    NoopContext,
};
pub use worker::{
    AccessFlags, Entry, EntryFn, EntryRef, RestartPolicy, StartTime, WorkerSpec,
    WorkerSpecBuilder, MAX_NAME_LEN,
};

// Demo logger, compiled in with `--features logging`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
