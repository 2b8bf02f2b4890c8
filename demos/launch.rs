//! # Example: launch
//!
//! Launch extra workers on demand and observe the confirmation protocol.
//!
//! Demonstrates how to:
//! - Run a minimal static pool, then grow it with [`Supervisor::launch`].
//! - Give each worker its own [`ContextProvider`] (a pretend store here).
//! - Tell retryable launch failures (pool full) from fatal ones.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► register_static()           index_1 occupies one of 3 slots
//!   ├─► launch(2), launch(3)        each blocks until the worker confirms
//!   │       │
//!   │       └─► register ─► connect() ─► warm-up pass ─► Started + pid
//!   ├─► launch(4)                   slot table full ─► retryable error
//!   └─► request_termination_all() + wait_all_with_grace()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example launch --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bgvisor::{
    Bus, ContextError, ContextProvider, EntryFn, LogWriter, MaintenanceFn, MemorySource, Runtime,
    Subscribe, SubscriberSet, Supervisor, WorkerConfig,
};

/// Pretend per-worker store: `connect` is slow, cycles are bracketed.
#[derive(Default)]
struct IndexStore {
    connected: bool,
}

#[async_trait]
impl ContextProvider for IndexStore {
    async fn connect(&mut self) -> Result<(), ContextError> {
        // The launch confirmation covers this: the caller's launch() does not
        // return until connect and the warm-up pass are done.
        tokio::time::sleep(Duration::from_millis(150)).await;
        self.connected = true;
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), ContextError> {
        if !self.connected {
            return Err(ContextError::new("store is not connected"));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ContextError> {
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) One static worker, room for three in total
    let config = WorkerConfig {
        worker_count: 1,
        max_workers: 3,
        sleep_interval_ms: 200,
        ..WorkerConfig::default()
    };

    // 2) Event plumbing
    let bus = Bus::new(256);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let set = Arc::new(SubscriberSet::new(subs, bus.clone()));
    let _listener = set.spawn_listener(&bus);

    let source = Arc::new(MemorySource::new(config.clone()));
    let runtime = Runtime::new(&config, source, bus.clone());

    // 3) Shared unit, per-worker provider
    let unit = MaintenanceFn::arc(|| async {
        println!("[index] refreshed one shard");
        Ok(())
    });
    let entry = EntryFn::arc(unit, || {
        Box::new(IndexStore::default()) as Box<dyn ContextProvider>
    });
    let sup = Supervisor::new(config, runtime.clone(), entry, bus)?.with_base_name("index");

    // 4) Static pool: index_1
    sup.register_static().await;

    // 5) Grow on demand; each call returns once the new worker confirmed
    for index in [2, 3] {
        let pid = sup.launch(index).await?;
        println!("[main] index_{index} confirmed with pid {pid}");
    }

    // 6) One launch too many: the slot table is full
    match sup.launch(4).await {
        Ok(pid) => println!("[main] unexpected: index_4 got pid {pid}"),
        Err(e) => println!(
            "[main] index_4 refused: {e} (retryable: {})",
            e.is_retryable()
        ),
    }

    tokio::time::sleep(Duration::from_millis(600)).await;

    // 7) Wind down
    runtime.request_termination_all().await;
    runtime.wait_all_with_grace(sup.grace()).await?;

    println!("[main] finished");
    Ok(())
}
