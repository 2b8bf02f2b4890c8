//! # Example: reload
//!
//! Change worker pacing at runtime through the reconfigure request.
//!
//! Demonstrates how to:
//! - Publish a new snapshot into a [`MemorySource`].
//! - Fan a reconfigure request out to every worker.
//! - See invalid snapshots rejected while workers keep their old values.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► pool runs with sleep_interval_ms = 400
//!   ├─► source.set(sleep_interval_ms = 100)
//!   ├─► request_reconfigure_all()       workers wake, re-read, apply
//!   │       └─► [reload-applied] interval_ms=100
//!   ├─► source.set(worker_count = 0)    out of range
//!   ├─► request_reconfigure_all()
//!   │       └─► [reload-failed], previous values kept
//!   └─► request_termination_all() + wait_all_with_grace()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example reload --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use bgvisor::{
    Bus, EntryFn, LogWriter, MaintenanceFn, MemorySource, Runtime, Subscribe, SubscriberSet,
    Supervisor, WorkerConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) Two workers, deliberately slow pacing to make the change visible
    let config = WorkerConfig {
        worker_count: 2,
        sleep_interval_ms: 400,
        ..WorkerConfig::default()
    };

    // 2) Event plumbing
    let bus = Bus::new(256);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let set = Arc::new(SubscriberSet::new(subs, bus.clone()));
    let _listener = set.spawn_listener(&bus);

    // Keep a handle on the source: set() feeds the next reload
    let source = Arc::new(MemorySource::new(config.clone()));
    let runtime = Runtime::new(&config, source.clone(), bus.clone());

    let unit = MaintenanceFn::arc(|| async {
        println!("[refresh] one pass");
        Ok(())
    });
    let sup = Supervisor::new(config.clone(), runtime.clone(), EntryFn::contextless(unit), bus)?
        .with_base_name("refresh");

    // 3) Run the pool at the slow interval for a moment
    sup.register_static().await;
    tokio::time::sleep(Duration::from_millis(900)).await;

    // 4) Speed it up: new snapshot, then ask every worker to re-read
    println!("[main] reloading: sleep_interval_ms 400 -> 100");
    source.set(WorkerConfig {
        sleep_interval_ms: 100,
        ..config.clone()
    });
    runtime.request_reconfigure_all().await;
    tokio::time::sleep(Duration::from_millis(900)).await;

    // 5) A broken snapshot is rejected; workers keep the 100ms interval
    println!("[main] reloading with an out-of-range snapshot");
    source.set(WorkerConfig {
        worker_count: 0,
        ..config.clone()
    });
    runtime.request_reconfigure_all().await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    // 6) Wind down
    runtime.request_termination_all().await;
    runtime.wait_all_with_grace(sup.grace()).await?;

    println!("[main] finished");
    Ok(())
}
