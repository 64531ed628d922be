//! Subscriber fan-out.
//!
//! `Broadcaster` is the delivery contract the refresh loops and the catch-up
//! path rely on. `SseHub` is the in-process implementation behind `/events`:
//! every subscriber owns a bounded channel, and the hub keeps the sending
//! halves keyed by subscriber id.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::stream::{self, Stream};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::cache::Payload;

/// Per-subscriber queue depth. Slow subscribers that fall this far behind
/// lose events rather than stalling a refresh loop.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One named event as seen by a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub name: String,
    pub payload: Arc<Payload>,
}

/// Fire-and-forget delivery. Neither call blocks or reports failure to the
/// caller; lost deliveries are the transport's business.
pub trait Broadcaster: Send + Sync {
    fn unicast(&self, subscriber: SubscriberId, event: &str, payload: Arc<Payload>);
    fn broadcast(&self, event: &str, payload: Arc<Payload>);
}

#[derive(Debug)]
pub struct SseHub {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<FeedEvent>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for SseHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl SseHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber. It stays registered until the returned
    /// `Subscription` (or the stream made from it) is dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.write().insert(id, tx);
        tracing::info!(target: "feed", subscriber = %id, "client is connected");
        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::info!(target: "feed", subscriber = %id, "client disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns false when the receiving side is gone.
    fn deliver(&self, id: SubscriberId, tx: &mpsc::Sender<FeedEvent>, ev: FeedEvent) -> bool {
        match tx.try_send(ev) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                tracing::warn!(
                    target: "feed",
                    subscriber = %id,
                    event = %ev.name,
                    "subscriber queue full; event dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// An SSE `event:` line cannot carry a line break.
    fn frameable(event: &str) -> bool {
        if event.contains(['\n', '\r']) {
            tracing::warn!(target: "feed", event = ?event, "event name has a line break; dropped");
            return false;
        }
        true
    }

    fn prune(&self, closed: &[SubscriberId]) {
        if closed.is_empty() {
            return;
        }
        let mut subs = self.subscribers.write();
        for id in closed {
            subs.remove(id);
        }
        tracing::debug!(target: "feed", pruned = closed.len(), "removed closed subscribers");
    }
}

impl Broadcaster for SseHub {
    fn unicast(&self, subscriber: SubscriberId, event: &str, payload: Arc<Payload>) {
        if !Self::frameable(event) {
            return;
        }
        let tx = self.subscribers.read().get(&subscriber).cloned();
        let Some(tx) = tx else {
            tracing::debug!(target: "feed", %subscriber, event, "unicast to unknown subscriber");
            return;
        };
        let ev = FeedEvent {
            name: event.to_string(),
            payload,
        };
        if !self.deliver(subscriber, &tx, ev) {
            self.prune(&[subscriber]);
        }
    }

    fn broadcast(&self, event: &str, payload: Arc<Payload>) {
        if !Self::frameable(event) {
            return;
        }
        // Clone the senders out so no lock is held while delivering.
        let targets: Vec<(SubscriberId, mpsc::Sender<FeedEvent>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();
        if targets.is_empty() {
            return;
        }

        let mut closed = Vec::new();
        for (id, tx) in &targets {
            let ev = FeedEvent {
                name: event.to_string(),
                payload: payload.clone(),
            };
            if !self.deliver(*id, tx, ev) {
                closed.push(*id);
            }
        }
        self.prune(&closed);
    }
}

/// Receiving half of one subscriber; unregisters itself on drop.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<FeedEvent>,
    hub: Weak<SseHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        self.rx.try_recv().ok()
    }

    /// Turn the subscription into a stream that lives as long as the consumer.
    pub fn into_stream(self) -> impl Stream<Item = FeedEvent> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let ev = sub.recv().await?;
            Some((ev, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> Arc<Payload> {
        Arc::new(v)
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let hub = Arc::new(SseHub::new());
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.broadcast("summary", payload(json!([1])));

        for sub in [&mut a, &mut b] {
            let ev = sub.try_recv().expect("event");
            assert_eq!(ev.name, "summary");
            assert_eq!(*ev.payload, json!([1]));
        }
    }

    #[test]
    fn unicast_reaches_only_the_target() {
        let hub = Arc::new(SseHub::new());
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.unicast(a.id(), "lastHour", payload(json!(["p1"])));

        assert_eq!(a.try_recv().map(|e| e.name), Some("lastHour".to_string()));
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let hub = Arc::new(SseHub::new());
        let a = hub.subscribe();
        let _b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        drop(a);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn full_queue_drops_event_but_keeps_subscriber() {
        let hub = Arc::new(SseHub::with_capacity(1));
        let mut a = hub.subscribe();
        hub.broadcast("summary", payload(json!([1])));
        hub.broadcast("summary", payload(json!([2])));

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(a.try_recv().map(|e| (*e.payload).clone()), Some(json!([1])));
        assert!(a.try_recv().is_none());
    }

    #[test]
    fn unicast_to_unknown_id_is_ignored() {
        let hub = Arc::new(SseHub::new());
        let a = hub.subscribe();
        let id = a.id();
        drop(a);
        hub.unicast(id, "summary", payload(json!([])));
        hub.broadcast("summary", payload(json!([])));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn stream_yields_events_in_order() {
        use futures_util::StreamExt;

        let hub = Arc::new(SseHub::new());
        let sub = hub.subscribe();
        hub.broadcast("a", payload(json!(1)));
        hub.broadcast("b", payload(json!(2)));

        let mut s = Box::pin(sub.into_stream());
        assert_eq!(s.next().await.map(|e| e.name), Some("a".to_string()));
        assert_eq!(s.next().await.map(|e| e.name), Some("b".to_string()));
        drop(s);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn recv_waits_for_the_next_broadcast() {
        let hub = Arc::new(SseHub::new());
        let mut sub = hub.subscribe();

        let sender = hub.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            sender.broadcast("lastHour", Arc::new(json!(["p2"])));
        });

        let ev = sub.recv().await.expect("event");
        assert_eq!(ev.name, "lastHour");
        assert_eq!(*ev.payload, json!(["p2"]));
    }

    #[test]
    fn names_with_line_breaks_are_never_delivered() {
        let hub = Arc::new(SseHub::new());
        let mut a = hub.subscribe();

        hub.broadcast("bad\nname", payload(json!([1])));
        hub.unicast(a.id(), "bad\rname", payload(json!([1])));
        assert!(a.try_recv().is_none());
        assert_eq!(hub.subscriber_count(), 1);

        hub.broadcast("summary", payload(json!([2])));
        assert_eq!(a.try_recv().map(|e| e.name), Some("summary".to_string()));
    }
}
