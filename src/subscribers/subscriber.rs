//! # Subscription seam for runtime events.
//!
//! [`Subscribe`] is the hook observers implement to receive the pool's
//! events. The [`SubscriberSet`](crate::SubscriberSet) runs one worker task
//! and one bounded queue per subscriber, so implementations never execute in
//! a publisher's context and cannot slow one another down.
//!
//! ```text
//! SubscriberSet ─► [queue, cap N] ─► worker task ─► on_event(&Event)
//!                                 └─► caught panic ─► SubscriberPanicked
//! ```
//!
//! ## Delivery contract
//! - Events arrive in queue (FIFO) order within one subscriber.
//! - A full queue drops the event for that subscriber alone and publishes
//!   `EventKind::SubscriberOverflow`.
//! - A panic inside `on_event` is caught and published as
//!   `EventKind::SubscriberPanicked`; the subscriber keeps receiving.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use bgvisor::{Event, EventKind, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::CycleFailed) {
//!             // record the failure
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//!     fn queue_capacity(&self) -> usize { 2048 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver for runtime events.
///
/// Implementations run isolated from publishers and from each other: each
/// gets a dedicated worker task fed by its own bounded queue, and a panic in
/// one handler never disturbs another subscriber.
///
/// Handlers should stay async-friendly (no blocking calls) and keep their own
/// error handling; whatever cannot be handled belongs in a log line, not a
/// panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    ///
    /// Runs on the subscriber's worker task, in queue order, never in the
    /// publisher's context. If the handler panics, the set reports
    /// `EventKind::SubscriberPanicked` and moves on to the next queued event.
    async fn on_event(&self, event: &Event);

    /// Name used to label this subscriber in overflow and panic reports.
    ///
    /// Defaults to `type_name::<Self>()`; a short hand-picked name (say,
    /// "metrics" or "audit") reads much better in output.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// How many events this subscriber's queue may buffer.
    ///
    /// When the queue is full, the next event is dropped for this subscriber
    /// and an `EventKind::SubscriberOverflow` is published; other subscribers
    /// still receive it. Values below 1 are clamped up. Defaults to 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
