//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [registered] worker=sweep_1 index=1
//! [starting] worker=sweep_1 pid=1
//! [started] worker=sweep_1 pid=1
//! [cycle-started] worker=sweep_1 cycle=1
//! [cycle-failed] worker=sweep_1 cycle=1 err="maintenance pass failed: boom"
//! [reload-applied] worker=sweep_1 interval_ms=250
//! [stopped] worker=sweep_1
//! [shutdown-requested]
//! [all-stopped]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
#[derive(Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={:?} err={:?}",
                    e.worker, e.error
                );
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={:?} queue={:?}", e.worker, e.reason);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded] stuck={:?}", e.reason);
            }
            EventKind::WorkerRegistered => {
                if let (Some(worker), Some(index)) = (&e.worker, e.index) {
                    println!("[registered] worker={worker} index={index}");
                }
            }
            EventKind::RegistrationRefused => {
                println!(
                    "[registration-refused] worker={:?} err={:?}",
                    e.worker, e.error
                );
            }
            EventKind::WorkerStarting => {
                if let (Some(worker), Some(pid)) = (&e.worker, e.pid) {
                    println!("[starting] worker={worker} pid={pid}");
                }
            }
            EventKind::WorkerStarted => {
                if let (Some(worker), Some(pid)) = (&e.worker, e.pid) {
                    println!("[started] worker={worker} pid={pid}");
                }
            }
            EventKind::WorkerStopped => match &e.error {
                Some(err) => println!("[stopped] worker={:?} err={err:?}", e.worker),
                None => println!("[stopped] worker={:?}", e.worker),
            },
            EventKind::WorkerPanicked => {
                println!("[worker-panicked] worker={:?} err={:?}", e.worker, e.error);
            }
            EventKind::WorkerRestarting => {
                println!(
                    "[restarting] worker={:?} delay_ms={:?}",
                    e.worker, e.delay_ms
                );
            }
            EventKind::ParentDeath => {
                println!("[parent-death] worker={:?}", e.worker);
            }
            EventKind::CycleStarted => {
                if let (Some(worker), Some(cycle)) = (&e.worker, e.cycle) {
                    println!("[cycle-started] worker={worker} cycle={cycle}");
                }
            }
            EventKind::CycleCompleted => {
                if let (Some(worker), Some(cycle)) = (&e.worker, e.cycle) {
                    println!("[cycle-completed] worker={worker} cycle={cycle}");
                }
            }
            EventKind::CycleFailed => {
                println!(
                    "[cycle-failed] worker={:?} cycle={:?} err={:?}",
                    e.worker, e.cycle, e.error
                );
            }
            EventKind::ReloadApplied => {
                println!(
                    "[reload-applied] worker={:?} interval_ms={:?}",
                    e.worker, e.interval_ms
                );
            }
            EventKind::ReloadFailed => {
                println!("[reload-failed] worker={:?} err={:?}", e.worker, e.error);
            }
            EventKind::LaunchRequested => {
                println!(
                    "[launch-requested] worker={:?} index={:?}",
                    e.worker, e.index
                );
            }
            EventKind::LaunchConfirmed => {
                println!("[launch-confirmed] worker={:?} pid={:?}", e.worker, e.pid);
            }
            EventKind::LaunchFailed => {
                println!("[launch-failed] worker={:?} err={:?}", e.worker, e.error);
            }
            EventKind::ActivityChanged => {
                if let (Some(worker), Some(reason)) = (&e.worker, &e.reason) {
                    println!("[activity] worker={worker} {reason}");
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
