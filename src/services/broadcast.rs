use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::models::FeedEvent;

/// Upper bound on live subscribers per session; a new registration past this
/// evicts the oldest one
pub const MAX_SUBSCRIBERS_PER_SESSION: usize = 3;

/// Per-subscriber queue depth; a subscriber that lets this fill is presumed
/// stalled and is dropped at the next broadcast
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 10;

struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<FeedEvent>,
}

/// Process-wide registry of live push subscribers, keyed by session id
///
/// Register, unregister, and broadcast are the only mutation entry points;
/// all of them are safe under concurrent access from request handlers and
/// background recompute tasks.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Vec<Subscriber>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber queue for the session
    ///
    /// Returns the subscriber's id (needed to unregister) and the receiving
    /// end of its bounded queue. An evicted subscriber's sender is dropped,
    /// which closes its channel and ends its stream.
    pub fn register(&self, session_id: &str) -> (Uuid, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = Uuid::new_v4();

        let mut subscribers = self.connections.entry(session_id.to_string()).or_default();
        if subscribers.len() >= MAX_SUBSCRIBERS_PER_SESSION {
            let evicted = subscribers.remove(0);
            tracing::debug!(session_id, subscriber = %evicted.id, "Evicting oldest subscriber");
        }
        subscribers.push(Subscriber { id, tx });

        (id, rx)
    }

    /// Removes one subscriber; idempotent, safe to call after eviction
    pub fn unregister(&self, session_id: &str, subscriber_id: Uuid) {
        if let Some(mut subscribers) = self.connections.get_mut(session_id) {
            subscribers.retain(|sub| sub.id != subscriber_id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.connections
                    .remove_if(session_id, |_, subs| subs.is_empty());
            }
        }
    }

    pub fn has_subscribers(&self, session_id: &str) -> bool {
        self.connections
            .get(session_id)
            .map(|subs| !subs.is_empty())
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.connections
            .get(session_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Pushes an event to every live subscriber of the session
    ///
    /// Never blocks: a subscriber whose queue is full or closed is dropped
    /// from the registry instead of holding up the broadcast.
    pub fn broadcast(&self, session_id: &str, event: &FeedEvent) {
        let Some(mut subscribers) = self.connections.get_mut(session_id) else {
            return;
        };

        subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(session_id, subscriber = %sub.id, "Subscriber queue full, dropping");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(session_id, subscriber = %sub.id, "Subscriber gone, dropping");
                false
            }
        });

        let empty = subscribers.is_empty();
        drop(subscribers);
        if empty {
            self.connections
                .remove_if(session_id, |_, subs| subs.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_broadcast_delivers() {
        let registry = ConnectionRegistry::new();
        let (_id, mut rx) = registry.register("s1");

        registry.broadcast("s1", &FeedEvent::Ping);

        assert_eq!(rx.recv().await, Some(FeedEvent::Ping));
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_session_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.broadcast("nobody", &FeedEvent::Ping);
        assert!(!registry.has_subscribers("nobody"));
    }

    #[tokio::test]
    async fn test_fourth_registration_evicts_oldest() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.register("s1");
        let (_b, _rx_b) = registry.register("s1");
        let (_c, _rx_c) = registry.register("s1");
        let (_d, _rx_d) = registry.register("s1");

        assert_eq!(registry.subscriber_count("s1"), 3);
        // The first subscriber's sender was dropped; its channel is closed.
        assert_eq!(rx_a.recv().await, None);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.register("s1");

        registry.unregister("s1", id);
        registry.unregister("s1", id);
        registry.unregister("s1", Uuid::new_v4());

        assert!(!registry.has_subscribers("s1"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_subscriber_without_blocking() {
        let registry = ConnectionRegistry::new();
        let (_id, _rx) = registry.register("s1");

        // Fill the queue without draining it, then push one more.
        for _ in 0..SUBSCRIBER_QUEUE_CAPACITY {
            registry.broadcast("s1", &FeedEvent::Ping);
        }
        assert!(registry.has_subscribers("s1"));

        registry.broadcast("s1", &FeedEvent::Ping);
        assert!(!registry.has_subscribers("s1"));
    }

    #[tokio::test]
    async fn test_closed_receiver_dropped_on_next_broadcast() {
        let registry = ConnectionRegistry::new();
        let (_id, rx) = registry.register("s1");
        drop(rx);

        registry.broadcast("s1", &FeedEvent::Ping);
        assert!(!registry.has_subscribers("s1"));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.register("s1");
        let (_b, mut rx_b) = registry.register("s2");

        registry.broadcast("s1", &FeedEvent::Ping);

        assert_eq!(rx_a.recv().await, Some(FeedEvent::Ping));
        assert!(rx_b.try_recv().is_err());
    }
}
