//! # SubscriberSet: non-blocking fan-out over multiple subscribers.
//!
//! [`SubscriberSet`] distributes each [`Event`](crate::events::Event) to
//! multiple subscribers **without awaiting** their processing, so the worker
//! loops publishing events stay on schedule no matter how slow a consumer is.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and reported (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow (events are dropped for that
//!   subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```
//!
//! Delivery problems (overflow, panic) are published back to the bus as
//! `SubscriberOverflow` / `SubscriberPanicked` events, except when the event
//! being delivered is itself such a report: those fall back to stderr so a
//! broken subscriber cannot feed the set with an endless stream of reports
//! about itself.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::panic_message;
use crate::events::{Bus, Event};

use super::Subscribe;

/// Per-subscriber channel with metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// `bus` receives the set's own delivery reports (overflow, panic).
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let s = Arc::clone(&sub);
            let report_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = s.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let message = panic_message(panic_err);
                        if ev.is_subscriber_overflow() || ev.is_subscriber_panic() {
                            eprintln!(
                                "[bgvisor] subscriber '{}' panicked on a delivery report: {message}",
                                s.name(),
                            );
                        } else {
                            report_bus
                                .publish(Event::subscriber_panicked(s.name(), message));
                        }
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Fans one event out to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or **closed**, the event is dropped
    /// for it and a `SubscriberOverflow` is published.
    pub fn emit(&self, event: &Event) {
        let infra = event.is_subscriber_overflow() || event.is_subscriber_panic();
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.report_drop(channel.name, "full", infra);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.report_drop(channel.name, "closed", infra);
                }
            }
        }
    }

    /// A dropped delivery report must not generate further delivery reports.
    fn report_drop(&self, name: &'static str, cause: &'static str, infra: bool) {
        if infra {
            eprintln!("[bgvisor] subscriber '{name}' dropped a delivery report: queue {cause}");
        } else {
            self.bus.publish(Event::subscriber_overflow(name, cause));
        }
    }

    /// Subscribes to `bus` and forwards every event into this set until the
    /// bus closes.
    ///
    /// This is the standard wiring: publishers write to the bus, one listener
    /// task drains it into the fan-out.
    pub fn spawn_listener(self: Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => self.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        eprintln!("[bgvisor] subscriber listener lagged; skipped {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Graceful shutdown: closes all queues and awaits worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscribe for Counting {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    struct Stuck;

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &Event) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_affect_others() {
        let bus = Bus::new(64);
        let mut reports = bus.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));

        let set = SubscriberSet::new(
            vec![
                Arc::new(Panicky) as Arc<dyn Subscribe>,
                Arc::new(Counting { seen: seen.clone() }) as Arc<dyn Subscribe>,
            ],
            bus.clone(),
        );

        set.emit(&Event::new(EventKind::CycleStarted).with_worker("w"));
        set.emit(&Event::new(EventKind::CycleCompleted).with_worker("w"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);

        let mut saw_panic_report = false;
        while let Ok(ev) = reports.try_recv() {
            if ev.is_subscriber_panic() {
                assert_eq!(ev.worker.as_deref(), Some("panicky"));
                saw_panic_report = true;
            }
        }
        assert!(saw_panic_report);
    }

    #[tokio::test]
    async fn test_overflow_is_reported_and_contained() {
        let bus = Bus::new(64);
        let mut reports = bus.subscribe();

        let set = SubscriberSet::new(vec![Arc::new(Stuck) as Arc<dyn Subscribe>], bus.clone());

        for _ in 0..4 {
            set.emit(&Event::new(EventKind::CycleStarted).with_worker("w"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut overflows = 0;
        while let Ok(ev) = reports.try_recv() {
            if ev.is_subscriber_overflow() {
                assert_eq!(ev.worker.as_deref(), Some("stuck"));
                overflows += 1;
            }
        }
        assert!(overflows >= 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_workers() {
        let bus = Bus::new(16);
        let seen = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(
            vec![Arc::new(Counting { seen: seen.clone() }) as Arc<dyn Subscribe>],
            bus,
        );

        set.emit(&Event::new(EventKind::ShutdownRequested));
        set.shutdown().await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
