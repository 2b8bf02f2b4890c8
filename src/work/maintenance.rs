//! # Maintenance abstraction and function-backed implementation.
//!
//! This module defines the [`Maintenance`] trait (the externally supplied
//! unit of work a worker invokes once per cycle) and a convenient
//! function-backed implementation [`MaintenanceFn`]. The common handle type
//! is [`MaintenanceRef`], an `Arc<dyn Maintenance>` suitable for sharing
//! across workers.
//!
//! The runtime treats the unit as a black box: it needs no arguments, returns
//! `Ok(())` or a [`WorkError`], and is never given scheduling control. Pacing,
//! wake-ups, and shutdown belong to the worker loop.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::WorkError;

/// Shared handle to a maintenance unit.
pub type MaintenanceRef = Arc<dyn Maintenance>;

/// # One externally supplied pass of periodic work.
///
/// Implementations are invoked inside the cycle envelope: a work context is
/// opened before [`run`](Maintenance::run) and committed or rolled back after
/// it, so the unit itself never manages context lifecycles.
///
/// A failure or panic is contained to the cycle it happened in; the worker
/// survives and runs the unit again on its next wake.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use bgvisor::{Maintenance, WorkError};
///
/// struct SweepStale;
///
/// #[async_trait]
/// impl Maintenance for SweepStale {
///     async fn run(&self) -> Result<(), WorkError> {
///         // scan, evict, refresh...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Maintenance: Send + Sync + 'static {
    /// Performs one maintenance pass.
    async fn run(&self) -> Result<(), WorkError>;
}

/// Function-backed maintenance implementation.
///
/// Wraps a closure that *creates* a new future per pass, so each cycle owns
/// its state. If passes need shared state, move an `Arc<...>` into the
/// closure explicitly.
///
/// ## Example
/// ```rust
/// use bgvisor::{MaintenanceFn, MaintenanceRef, WorkError};
///
/// let unit: MaintenanceRef = MaintenanceFn::arc(|| async {
///     // do work...
///     Ok::<_, WorkError>(())
/// });
/// ```
#[derive(Debug)]
pub struct MaintenanceFn<F> {
    f: F,
}

impl<F> MaintenanceFn<F> {
    /// Creates a new function-backed maintenance unit.
    ///
    /// Prefer [`MaintenanceFn::arc`] when you immediately need a
    /// [`MaintenanceRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the unit and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Maintenance for MaintenanceFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), WorkError> {
        (self.f)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_maintenance_fn_runs_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let unit: MaintenanceRef = MaintenanceFn::arc(move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        unit.run().await.unwrap();
        unit.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_maintenance_fn_propagates_failure() {
        let unit: MaintenanceRef =
            MaintenanceFn::arc(|| async { Err(WorkError::new("sweep failed")) });

        let err = unit.run().await.unwrap_err();
        assert_eq!(err.to_string(), "sweep failed");
    }
}
