//! # Observer wiring: the subscription trait and its fan-out.
//!
//! Everything the pool publishes lands on the [`Bus`](crate::events::Bus);
//! this module turns that single stream into per-observer deliveries. The
//! [`SubscriberSet`] owns the queues and worker tasks, [`Subscribe`] is the
//! handler seam, and [`LogWriter`] (behind the `logging` feature) is a
//! ready-made stdout printer for demos.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   WorkerLoop ── publish(Event) ──► Bus ──► SubscriberSet listener
//!                                                │
//!                                                ├──► [queue] ─► LogWriter
//!                                                ├──► [queue] ─► Metrics
//!                                                └──► [queue] ─► Custom ...
//! ```
//!
//! Each subscriber owns a bounded queue and a worker task; a slow or broken
//! subscriber only affects itself (see [`SubscriberSet`]).
//!
//! ## Writing a subscriber
//! ```no_run
//! use async_trait::async_trait;
//! use bgvisor::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if matches!(event.kind, EventKind::CycleFailed) {
//!             // bump a counter here
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
