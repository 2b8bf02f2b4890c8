//! # Work context provider.
//!
//! [`ContextProvider`] abstracts whatever environment a maintenance pass needs
//! around it: a database connection with a transaction, a session against a
//! remote service, or nothing at all ([`NoopContext`]).
//!
//! ## Lifecycle
//! ```text
//! connect()                once, before the warm-up pass
//!   ┌──────────────────────────────────────────────┐
//!   │  begin() ─► unit.run() ─► commit()           │   per cycle
//!   │                     └───► rollback()         │   (failure/panic)
//!   └──────────────────────────────────────────────┘
//! drop                     releases long-lived resources
//! ```
//!
//! A provider is owned exclusively by one worker (`&mut self` everywhere), so
//! implementations need no internal locking. Between cycles no context is
//! open; `begin` and the matching `commit`/`rollback` always pair up within
//! one cycle.

use async_trait::async_trait;

use crate::error::ContextError;

/// # Environment around each maintenance pass.
///
/// The cycle envelope drives this trait; maintenance units never see it.
/// Implementations release long-lived resources in `Drop`.
#[async_trait]
pub trait ContextProvider: Send + 'static {
    /// Establishes the provider's long-lived resources ("open connection").
    ///
    /// Called once before the worker's warm-up pass. Failure stops the worker
    /// before it ever confirms liveness.
    async fn connect(&mut self) -> Result<(), ContextError>;

    /// Opens a fresh work context ("begin transaction").
    async fn begin(&mut self) -> Result<(), ContextError>;

    /// Closes the current context keeping its effects ("commit").
    async fn commit(&mut self) -> Result<(), ContextError>;

    /// Closes the current context discarding its effects ("roll back").
    ///
    /// Called when the pass failed or panicked; must be safe to call exactly
    /// once per opened context.
    async fn rollback(&mut self) -> Result<(), ContextError>;
}

/// Provider for maintenance that needs no surrounding context.
///
/// Every operation succeeds without doing anything. Useful for purely
/// in-memory units and for tests.
#[derive(Debug, Default)]
pub struct NoopContext;

#[async_trait]
impl ContextProvider for NoopContext {
    async fn connect(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ContextError> {
        Ok(())
    }
}
