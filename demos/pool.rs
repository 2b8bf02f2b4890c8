//! # Example: pool
//!
//! A fixed pool of maintenance workers sweeping a shared in-memory cache.
//!
//! Demonstrates how to:
//! - Build the [`Runtime`] / [`Supervisor`] pair from a validated config.
//! - Park pool workers behind the recovery gate until warm-up completes.
//! - Share one maintenance unit across workers via [`MaintenanceFn`].
//! - Wind the pool down with a bounded grace period.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► Runtime::recovering(...)            workers will park at the gate
//!   ├─► Supervisor::register_static()       sweep_1..sweep_3 registered
//!   ├─► finish_recovery()                   gate opens, warm-up passes run
//!   ├─► sleep(2s)                           workers cycle on their own
//!   └─► request_termination_all() + wait_all_with_grace()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example pool --features logging
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bgvisor::{
    Bus, EntryFn, LogWriter, MaintenanceFn, MemorySource, Runtime, Subscribe, SubscriberSet,
    Supervisor, WorkerConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) Configure the pool: three workers, a 300ms pacing interval
    let config = WorkerConfig {
        worker_count: 3,
        sleep_interval_ms: 300,
        ..WorkerConfig::default()
    };

    // 2) Wire the event plumbing: bus -> listener -> LogWriter
    let bus = Bus::new(256);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let set = Arc::new(SubscriberSet::new(subs, bus.clone()));
    let _listener = set.spawn_listener(&bus);

    // 3) Start the runtime in recovering mode: registered workers park
    //    at the gate instead of running their warm-up pass right away
    let source = Arc::new(MemorySource::new(config.clone()));
    let runtime = Runtime::recovering(&config, source, bus.clone());

    // 4) One shared maintenance unit: "sweep" a counter of stale entries
    let swept = Arc::new(AtomicUsize::new(0));
    let unit = {
        let swept = Arc::clone(&swept);
        MaintenanceFn::arc(move || {
            let swept = Arc::clone(&swept);
            async move {
                let total = swept.fetch_add(7, Ordering::Relaxed) + 7;
                println!("[sweep] evicted 7 entries ({total} total)");
                Ok(())
            }
        })
    };

    // 5) Register the static pool (sweep_1, sweep_2, sweep_3)
    let sup = Supervisor::new(config, runtime.clone(), EntryFn::contextless(unit), bus)?
        .with_base_name("sweep");
    sup.register_static().await;

    println!("[main] pool registered; nothing runs until recovery finishes");
    tokio::time::sleep(Duration::from_millis(500)).await;

    // 6) Open the gate: every worker runs its warm-up pass, confirms, cycles
    println!("[main] finishing recovery");
    runtime.finish_recovery();
    tokio::time::sleep(Duration::from_secs(2)).await;

    // 7) Observe the pool
    for view in runtime.workers().await {
        println!(
            "[main] {} (pid {}) is {:?}, last activity: {}",
            view.name,
            view.pid,
            view.status,
            view.activity.as_deref().unwrap_or("<none>")
        );
    }

    // 8) Wind down: request termination, then wait out the grace window
    println!("[main] stopping the pool");
    runtime.request_termination_all().await;
    runtime.wait_all_with_grace(sup.grace()).await?;

    println!(
        "[main] finished: {} entries swept in total",
        swept.load(Ordering::Relaxed)
    );
    Ok(())
}
