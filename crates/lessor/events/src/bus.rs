//! Broadcast-backed event bus and its subscriptions

use lessor_types::{EventEnvelope, EventSource, ProviderEvent};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Per-subscriber ring size used by [`EventBus::default`]
pub const DEFAULT_CAPACITY: usize = 1024;

struct BusInner {
    /// `None` once the bus is closed
    tx: RwLock<Option<broadcast::Sender<EventEnvelope>>>,
    published: AtomicU64,
    rejected: AtomicU64,
}

/// Provider event bus, cheap to clone
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                tx: RwLock::new(Some(tx)),
                published: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Deliver an event to every current subscriber without blocking
    pub fn publish(&self, event: EventEnvelope) {
        let guard = self.inner.tx.read();
        let Some(tx) = guard.as_ref() else {
            self.inner.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(event_id = %event.id, "Event published after bus close");
            return;
        };

        // No subscribers is fine
        let _ = tx.send(event);
        self.inner.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Wrap `event` in an envelope and publish it
    pub fn emit(&self, event: ProviderEvent, source: EventSource) {
        self.publish(EventEnvelope::new(event, source));
    }

    pub fn subscribe(&self) -> Subscription {
        let rx = self.inner.tx.read().as_ref().map(|tx| tx.subscribe());
        Subscription { rx, dropped: 0 }
    }

    /// End every subscription; later publishes are counted and discarded
    pub fn close(&self) {
        if self.inner.tx.write().take().is_some() {
            debug!("Event bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.tx.read().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .tx
            .read()
            .as_ref()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Publishes discarded because the bus was closed
    pub fn rejected_count(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscriber's view of the bus
pub struct Subscription {
    rx: Option<broadcast::Receiver<EventEnvelope>>,
    dropped: u64,
}

impl Subscription {
    /// Next event, or `None` after unsubscribe or bus close
    ///
    /// If this subscriber fell behind, the skipped events are counted in
    /// [`Subscription::dropped`] and delivery resumes with the oldest
    /// event still buffered.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                    warn!(lagged = n, "Event subscriber lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Stop receiving; idempotent
    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Events this subscriber lost by falling behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
