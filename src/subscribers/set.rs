//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] distributes events to multiple subscribers concurrently
//! without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)        └── panic → SubscriberPanicked
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N
//!   while B processes N+5; each subscriber individually sees FIFO order.
//! - **Overflow**: the event is dropped for that subscriber only and a
//!   `SubscriberOverflow` event is published (overflow events themselves
//!   are never re-reported, preventing feedback loops).
//! - **Isolation**: a slow or panicking subscriber does not affect others;
//!   panics are caught via `catch_unwind` and the worker keeps going.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::panic_message;
use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

/// Per-subscriber delivery lane: the queue feeding one worker.
struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
///
/// Owns one bounded queue and one worker task per subscriber. Publishing is
/// non-blocking; delivery failures degrade to dropped events, reported on
/// the bus.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Workers start immediately and run until their queue is closed
    /// (i.e. until the set is dropped or [`shutdown`](Self::shutdown)).
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut lanes = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            lanes.push(Lane {
                name: sub.name(),
                tx,
            });
            workers.push(Self::spawn_worker(sub, rx, bus.clone()));
        }
        Self {
            lanes,
            workers,
            bus,
        }
    }

    fn spawn_worker(
        sub: Arc<dyn Subscribe>,
        mut rx: mpsc::Receiver<Arc<Event>>,
        bus: Bus,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = sub.on_event(ev.as_ref());
                if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    bus.publish(Event::subscriber_panicked(
                        sub.name(),
                        panic_message(payload.as_ref()),
                    ));
                }
            }
        })
    }

    /// Emits an event to all subscribers (non-blocking).
    ///
    /// Uses `try_send` per lane; a full or closed queue drops the event for
    /// that subscriber only and publishes `SubscriberOverflow`.
    pub fn emit(&self, event: &Event) {
        let is_overflow = event.is_subscriber_overflow();
        let shared = Arc::new(event.clone());

        for lane in &self.lanes {
            match lane.tx.try_send(Arc::clone(&shared)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if !is_overflow {
                        self.bus.publish(Event::subscriber_overflow(lane.name, "full"));
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    if !is_overflow {
                        self.bus
                            .publish(Event::subscriber_overflow(lane.name, "closed"));
                    }
                }
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// Closes every lane, then awaits each worker so queued events are
    /// fully delivered before returning.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber blew up");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[tokio::test]
    async fn test_events_reach_subscriber_in_order() {
        let bus = Bus::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![Arc::new(Recorder { seen: seen.clone() }) as Arc<dyn Subscribe>],
            bus.clone(),
        );

        set.emit(&Event::new(EventKind::DocumentRegistered));
        set.emit(&Event::new(EventKind::DocumentProcessed));
        set.emit(&Event::new(EventKind::DocumentClosed));
        set.shutdown().await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                EventKind::DocumentRegistered,
                EventKind::DocumentProcessed,
                EventKind::DocumentClosed,
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut probe = bus.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![
                Arc::new(Panicky) as Arc<dyn Subscribe>,
                Arc::new(Recorder { seen: seen.clone() }) as Arc<dyn Subscribe>,
            ],
            bus.clone(),
        );

        set.emit(&Event::new(EventKind::SenderListChanged));
        set.shutdown().await;

        // The healthy subscriber still got the event.
        assert_eq!(*seen.lock().unwrap(), vec![EventKind::SenderListChanged]);

        // The panic surfaced on the bus.
        let reported = probe.recv().await.unwrap();
        assert_eq!(reported.kind, EventKind::SubscriberPanicked);
        assert_eq!(reported.listener.as_deref(), Some("panicky"));
        assert_eq!(reported.reason.as_deref(), Some("subscriber blew up"));
    }
}
