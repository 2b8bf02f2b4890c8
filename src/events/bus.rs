//! # Broadcast bus for runtime events.
//!
//! Every lifecycle event the pool produces flows through one [`Bus`]: worker
//! loops, the runtime, and the launch protocol all publish into the same
//! channel, and observers tap it with [`Bus::subscribe`].
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Subscriber (one):
//!   WorkerLoop 1 ──┐
//!   WorkerLoop 2 ──┼────► Bus ──────► SubscriberSet listener ──► subscribers
//!   Runtime      ──┤ (broadcast chan)
//!   Supervisor   ──┘
//! ```
//!
//! The usual wiring has exactly one listener task
//! ([`SubscriberSet::spawn_listener`]) draining the bus into per-subscriber
//! queues; publishing stays decoupled from however slowly those queues drain.
//!
//! ## Semantics
//! - Publishing never waits. A publish is one `broadcast::Sender::send` call,
//!   so worker loops keep their schedule regardless of consumers.
//! - One ring buffer of `capacity` recent events backs every receiver.
//! - A receiver that falls more than `capacity` events behind sees
//!   `RecvError::Lagged(n)`; the `n` oldest events are gone for it.
//! - Nothing is stored: with no live receiver, a published event vanishes.
//!
//! [`SubscriberSet::spawn_listener`]: crate::SubscriberSet::spawn_listener

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Wraps [`tokio::sync::broadcast`] behind a `publish`/`subscribe` surface.
/// Any number of publishers may send concurrently; every receiver gets its own
/// clone of each event.
///
/// ### Properties
/// - Publishing returns immediately, delivered or not.
/// - Delivery is best-effort; nothing is acknowledged or persisted.
/// - Cloning a `Bus` is cheap and yields a handle to the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events.
    ///
    /// The buffer is shared by all receivers rather than allocated per
    /// subscriber; a receiver that falls behind it observes
    /// `RecvError::Lagged`. Capacities below 1 are clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an owned event to every live receiver.
    ///
    /// The channel clones the event once per receiver. With no receiver
    /// attached the event is discarded; either way this returns immediately.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Publishes from a reference, cloning once up front.
    ///
    /// Equivalent to `publish(ev.clone())` for callers that only hold a
    /// borrow.
    pub fn publish_ref(&self, ev: &Event) {
        let _ = self.tx.send(ev.clone());
    }

    /// Attaches a fresh, independent receiver.
    ///
    /// The receiver observes events published from this call onward; history
    /// is not replayed. Falling behind the ring buffer surfaces as
    /// `RecvError::Lagged(n)` with the skipped count.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_subscribers_see_published_events() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::CycleStarted).with_worker("w1"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::CycleStarted);
        assert_eq!(ev.worker.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn test_publish_without_receivers_does_not_block() {
        let bus = Bus::new(1);
        // No receiver exists; both publishes must return immediately.
        bus.publish(Event::new(EventKind::ShutdownRequested));
        bus.publish(Event::new(EventKind::AllStoppedWithin));
    }
}
