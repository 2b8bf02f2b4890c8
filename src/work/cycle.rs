//! # Run a single work cycle.
//!
//! Executes one cycle of a [`Maintenance`] unit inside its context envelope
//! and publishes lifecycle events to the [`Bus`].
//!
//! - **Open** a work context (`begin`)
//! - **Run** the unit with panic containment (`catch_unwind`)
//! - **Close** the context: `commit` on success, `rollback` otherwise
//!
//! ## Event flow
//! ```text
//! Success:
//!   begin → run → commit            → publish CycleCompleted
//!
//! Work failure:
//!   begin → run fails → rollback    → publish CycleFailed
//!
//! Panic:
//!   begin → run panics → rollback   → publish CycleFailed (panic text)
//!
//! Begin failure:
//!   begin fails                     → publish CycleFailed (nothing to release)
//!
//! Commit failure:
//!   begin → run → commit fails      → publish CycleFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `CycleCompleted` or
//!   `CycleFailed`.
//! - Every error is recoverable: whatever happened, the context is closed
//!   when this returns and the caller may run the next cycle.
//! - A failed `begin` opened nothing, so nothing is released.
//! - A failed `commit` closes the context itself; `rollback` is not called
//!   after it.
//! - If `rollback` fails too, the primary error still wins; the secondary
//!   failure rides along in the `CycleFailed` event's `reason`.

use futures::FutureExt;

use crate::error::{panic_message, CycleError};
use crate::events::{Bus, Event, EventKind};
use crate::work::context::ContextProvider;
use crate::work::maintenance::Maintenance;

/// Outcome of one work cycle.
pub type CycleResult = Result<(), CycleError>;

/// Executes a single cycle of `unit` inside `provider`'s envelope, publishing
/// lifecycle events to `bus`.
///
/// `worker` and `cycle` only label the published events; cycle 0 is the
/// warm-up pass by convention.
///
/// ### Containment
/// A panic inside the unit is caught, rendered into
/// [`CycleError::Panic`], and treated like any other cycle failure. Panics in
/// the *provider* are deliberately not caught: a context layer that panics is
/// broken in a way the envelope cannot patch over, and the worker's restart
/// policy decides what happens next.
pub async fn run_cycle(
    provider: &mut dyn ContextProvider,
    unit: &dyn Maintenance,
    bus: &Bus,
    worker: &str,
    cycle: u64,
) -> CycleResult {
    if let Err(e) = provider.begin().await {
        let err = CycleError::Begin(e);
        publish_failed(bus, worker, cycle, &err, None);
        return Err(err);
    }

    let outcome = std::panic::AssertUnwindSafe(unit.run()).catch_unwind().await;

    match outcome {
        Ok(Ok(())) => match provider.commit().await {
            Ok(()) => {
                publish_completed(bus, worker, cycle);
                Ok(())
            }
            Err(e) => {
                let err = CycleError::Commit(e);
                publish_failed(bus, worker, cycle, &err, None);
                Err(err)
            }
        },
        Ok(Err(work)) => {
            let secondary = release(provider).await;
            let err = CycleError::Work(work);
            publish_failed(bus, worker, cycle, &err, secondary);
            Err(err)
        }
        Err(panic) => {
            let secondary = release(provider).await;
            let err = CycleError::Panic {
                message: panic_message(panic),
            };
            publish_failed(bus, worker, cycle, &err, secondary);
            Err(err)
        }
    }
}

/// Rolls the context back, reporting a secondary failure without letting it
/// mask the primary one.
async fn release(provider: &mut dyn ContextProvider) -> Option<String> {
    match provider.rollback().await {
        Ok(()) => None,
        Err(e) => Some(format!("rollback also failed: {e}")),
    }
}

/// Publishes `CycleCompleted`.
fn publish_completed(bus: &Bus, worker: &str, cycle: u64) {
    bus.publish(
        Event::new(EventKind::CycleCompleted)
            .with_worker(worker)
            .with_cycle(cycle),
    );
}

/// Publishes `CycleFailed` with error details and, if rollback failed too,
/// the secondary failure.
fn publish_failed(bus: &Bus, worker: &str, cycle: u64, err: &CycleError, secondary: Option<String>) {
    let mut ev = Event::new(EventKind::CycleFailed)
        .with_worker(worker)
        .with_cycle(cycle)
        .with_error(err.to_string());
    if let Some(reason) = secondary {
        ev = ev.with_reason(reason);
    }
    bus.publish(ev);
}
