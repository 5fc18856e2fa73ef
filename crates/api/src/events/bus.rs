//! In-process publish/subscribe hub
//!
//! Owns the subscriber set and the bounded replay ring. Publish never blocks
//! on a subscriber: delivery is `try_send` into a bounded queue, and a
//! subscriber whose queue is full or closed is removed in the same pass.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{DomainEvent, EventKind};

/// Per-observer delivery queue handle held by the bus
struct Subscriber {
    sender: mpsc::Sender<DomainEvent>,
}

/// Event bus shared across the whole process
#[derive(Clone)]
pub struct EventBus {
    /// Live subscribers indexed by subscriber id
    subscribers: Arc<RwLock<HashMap<Uuid, Subscriber>>>,
    /// Bounded replay ring, oldest first
    ring: Arc<RwLock<VecDeque<DomainEvent>>>,
    /// Monotonic sequence id shared by all events
    seq: Arc<AtomicU64>,
    ring_capacity: usize,
    queue_capacity: usize,
}

impl EventBus {
    pub fn new(ring_capacity: usize, queue_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            ring: Arc::new(RwLock::new(VecDeque::with_capacity(ring_capacity))),
            seq: Arc::new(AtomicU64::new(0)),
            ring_capacity,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Publish a domain event
    ///
    /// The event lands in the replay ring before any delivery is attempted,
    /// so the call does not return until replay history is current. Fan-out
    /// itself is fire-and-forget: dead subscribers are dropped here, and one
    /// subscriber's failure has no effect on delivery to others.
    pub async fn publish(&self, event_type: EventKind, payload: serde_json::Value) -> DomainEvent {
        let event = DomainEvent {
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            id: Uuid::new_v4(),
            event_type,
            payload,
            timestamp: OffsetDateTime::now_utc(),
        };

        {
            let mut ring = self.ring.write().await;
            ring.push_back(event.clone());
            while ring.len() > self.ring_capacity {
                ring.pop_front();
            }
        }

        let mut subscribers = self.subscribers.write().await;
        let mut dead = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber_id = %id,
                        "Subscriber queue full, dropping subscriber"
                    );
                    dead.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        subscriber_id = %id,
                        "Subscriber queue closed, dropping subscriber"
                    );
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            subscribers.remove(&id);
        }

        tracing::debug!(
            seq = event.seq,
            event_type = %event.event_type,
            recipients = subscribers.len(),
            "Published domain event"
        );

        event
    }

    /// Register a new observer and hand back its delivery queue
    ///
    /// The caller is responsible for reading from the queue until disconnect.
    pub async fn subscribe(&self) -> (Uuid, mpsc::Receiver<DomainEvent>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, Subscriber { sender: tx });

        tracing::info!(
            subscriber_id = %id,
            total_subscribers = subscribers.len(),
            "Subscriber registered"
        );

        (id, rx)
    }

    /// Remove a subscriber from the live set; safe to call twice
    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(&id).is_some() {
            tracing::info!(
                subscriber_id = %id,
                remaining_subscribers = subscribers.len(),
                "Subscriber removed"
            );
        }
    }

    /// Point-in-time snapshot of the most recent ring entries, oldest first
    ///
    /// Not gap-free against concurrent publishes; callers de-duplicate by
    /// sequence id against the live stream.
    pub async fn recent(&self, limit: usize) -> Vec<DomainEvent> {
        let ring = self.ring.read().await;
        let skip = ring.len().saturating_sub(limit);
        ring.iter().skip(skip).cloned().collect()
    }

    /// Synthesize a keep-alive event carrying the current sequence watermark
    ///
    /// Heartbeats are transport-level liveness only: they never increment the
    /// sequence and never enter the replay ring.
    pub fn heartbeat(&self) -> DomainEvent {
        DomainEvent {
            seq: self.seq.load(Ordering::SeqCst),
            id: Uuid::new_v4(),
            event_type: EventKind::Heartbeat,
            payload: serde_json::json!({}),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Number of live subscribers
    pub async fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_with_zero_subscribers_fills_ring() {
        let bus = EventBus::new(3, 8);

        for i in 0..5 {
            bus.publish(EventKind::TicketOpen, json!({ "n": i })).await;
        }

        // Ring holds the most recent 3 events in publish order
        let recent = bus.recent(10).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].seq, 3);
        assert_eq!(recent[1].seq, 4);
        assert_eq!(recent[2].seq, 5);
    }

    #[tokio::test]
    async fn test_sequence_ids_are_monotonic() {
        let bus = EventBus::new(10, 8);

        let first = bus.publish(EventKind::TicketOpen, json!({})).await;
        let second = bus.publish(EventKind::TicketClaim, json!({})).await;

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10, 8);
        let (_id, mut rx) = bus.subscribe().await;

        bus.publish(EventKind::TicketOpen, json!({ "n": 1 })).await;
        bus.publish(EventKind::TicketClaim, json!({ "n": 2 })).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event_type, EventKind::TicketOpen);
        assert_eq!(second.event_type, EventKind::TicketClaim);
        assert!(first.seq < second.seq);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_is_dropped_without_affecting_others() {
        let bus = EventBus::new(50, 2);
        let (stalled_id, _stalled_rx) = bus.subscribe().await;
        let (_healthy_id, mut healthy_rx) = bus.subscribe().await;

        // The stalled subscriber never reads; its queue (capacity 2) fills and
        // the third publish evicts it. The healthy subscriber keeps reading
        // and sees every event.
        for i in 0..3u64 {
            bus.publish(EventKind::TicketOpen, json!({ "n": i })).await;
            let event = healthy_rx.recv().await.unwrap();
            assert_eq!(event.seq, i + 1);
        }

        assert_eq!(bus.subscriber_count().await, 1);

        // Removing the already-dropped subscriber again is a no-op
        bus.unsubscribe(stalled_id).await;
        assert_eq!(bus.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cleaned_up_on_publish() {
        let bus = EventBus::new(10, 8);
        let (_id, rx) = bus.subscribe().await;
        drop(rx);

        assert_eq!(bus.subscriber_count().await, 1);
        bus.publish(EventKind::TicketClose, json!({})).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new(10, 8);
        let (id, _rx) = bus.subscribe().await;

        bus.unsubscribe(id).await;
        bus.unsubscribe(id).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_heartbeat_carries_watermark_and_skips_ring() {
        let bus = EventBus::new(10, 8);
        bus.publish(EventKind::TicketOpen, json!({})).await;
        bus.publish(EventKind::Escalation, json!({})).await;

        let heartbeat = bus.heartbeat();
        assert_eq!(heartbeat.event_type, EventKind::Heartbeat);
        assert_eq!(heartbeat.seq, 2);

        // Heartbeats are not replayable history
        let recent = bus.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|e| e.event_type != EventKind::Heartbeat));
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let bus = EventBus::new(10, 8);
        for i in 0..6 {
            bus.publish(EventKind::TicketOpen, json!({ "n": i })).await;
        }

        let recent = bus.recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].seq, 5);
        assert_eq!(recent[1].seq, 6);
    }

    #[tokio::test]
    async fn test_late_joiner_snapshot_then_live() {
        let bus = EventBus::new(50, 8);
        bus.publish(EventKind::TicketOpen, json!({ "n": 1 })).await;
        bus.publish(EventKind::TicketClaim, json!({ "n": 2 })).await;

        // Late joiner reconstructs history from the ring, then reads live
        let snapshot = bus.recent(50).await;
        assert_eq!(snapshot.len(), 2);

        let (_id, mut rx) = bus.subscribe().await;
        bus.publish(EventKind::TicketClose, json!({ "n": 3 })).await;

        let live = rx.recv().await.unwrap();
        assert_eq!(live.seq, 3);
        assert!(live.seq > snapshot.last().unwrap().seq);
    }
}
