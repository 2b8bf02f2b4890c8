//! Event data model and the bus it travels on.
//!
//! Groups what the rest of the crate publishes: the [`Event`] payload with
//! its [`EventKind`] classification, and the broadcast [`Bus`] that carries
//! them.
//!
//! Publishers are the worker loops (cycle and lifecycle events), the runtime
//! (registration, shutdown, restart), the launch protocol, and the
//! subscriber fan-out workers reporting their own delivery problems. The
//! intended consumer is the listener spawned by
//! [`SubscriberSet::spawn_listener`], though any holder of a
//! [`Bus::subscribe`] receiver can tap the stream directly.
//!
//! [`SubscriberSet::spawn_listener`]: crate::SubscriberSet::spawn_listener

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
