//! In-process publish/subscribe bus for lifecycle events.
//!
//! `publish` is synchronous: it hands the event to every subscriber registered
//! at that moment, in registration order, and returns. Each subscriber owns a
//! bounded queue; a full queue never blocks the publisher. What happens on
//! overflow is chosen per subscriber ([`Overflow`]).
//!
//! There is no replay. A subscriber only sees events published after its
//! `subscribe` call returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{OrderEvent, Topic};

/// Default per-subscriber queue capacity.
pub const DEFAULT_CAPACITY: usize = 64;

/// What to do when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Remove the subscriber. Its `recv` returns `None` once the queue drains.
    Disconnect,
    /// Keep the subscriber and drop this event for it.
    DropEvent,
}

/// Subscription parameters.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    label: String,
    topics: Vec<Topic>,
    capacity: usize,
    overflow: Overflow,
}

impl SubscriberConfig {
    /// All topics, [`DEFAULT_CAPACITY`], disconnect on overflow.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            topics: Topic::ALL.to_vec(),
            capacity: DEFAULT_CAPACITY,
            overflow: Overflow::Disconnect,
        }
    }

    #[must_use]
    pub fn topics(mut self, topics: &[Topic]) -> Self {
        self.topics = topics.to_vec();
        self
    }

    /// Queue capacity; zero is treated as one.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub const fn on_overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }
}

/// What a single `publish` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that received the event.
    pub delivered: usize,
    /// Subscribers that skipped the event because their queue was full.
    pub dropped: usize,
    /// Subscribers removed during this publish (overflow or receiver gone).
    pub disconnected: usize,
}

struct Slot {
    id: u64,
    label: String,
    topics: Vec<Topic>,
    tx: mpsc::Sender<OrderEvent>,
    overflow: Overflow,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    slots: Mutex<Vec<Slot>>,
}

impl BusInner {
    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }
}

/// Process-wide event bus. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    #[must_use]
    pub fn subscribe(&self, config: SubscriberConfig) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(config.capacity);

        self.inner.slots().push(Slot {
            id,
            label: config.label.clone(),
            topics: config.topics,
            tx,
            overflow: config.overflow,
        });

        tracing::debug!(subscriber = %config.label, subscriber_id = id, "bus subscriber registered");

        Subscription {
            id,
            label: config.label,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber of its topic.
    pub fn publish(&self, event: &OrderEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut slots = self.inner.slots();

        slots.retain(|slot| {
            if !slot.topics.contains(&event.topic) {
                return true;
            }

            match slot.tx.try_send(event.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => match slot.overflow {
                    Overflow::DropEvent => {
                        tracing::warn!(
                            subscriber = %slot.label,
                            topic = %event.topic,
                            order_id = %event.order.order.id,
                            "subscriber queue full, event dropped"
                        );
                        report.dropped += 1;
                        true
                    }
                    Overflow::Disconnect => {
                        tracing::warn!(
                            subscriber = %slot.label,
                            topic = %event.topic,
                            "subscriber queue full, disconnecting"
                        );
                        report.disconnected += 1;
                        false
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    report.disconnected += 1;
                    false
                }
            }
        });

        report
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.slots().len()
    }
}

/// Receiving end of a bus subscription. Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    label: String,
    rx: mpsc::Receiver<OrderEvent>,
    bus: Weak<BusInner>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait for the next event.
    ///
    /// Returns `None` after the subscription was removed (unsubscribe or
    /// overflow disconnect) and every queued event was consumed.
    /// Cancel-safe.
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<OrderEvent> {
        self.rx.try_recv().ok()
    }

    /// Remove this subscriber from the bus. Idempotent.
    pub fn unsubscribe(&self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        if bus.remove(self.id) {
            tracing::debug!(subscriber = %self.label, subscriber_id = self.id, "bus subscriber removed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
