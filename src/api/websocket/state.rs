//! Realtime hub state

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::types::RealtimeMessage;

/// Shared state for hub connections
pub struct HubState {
    /// Broadcast channel fanning events out to every connected client
    event_tx: broadcast::Sender<RealtimeMessage>,

    /// Number of events published since startup
    published: AtomicU64,
}

impl HubState {
    /// Create hub state buffering `capacity` events per subscriber.
    /// Slower clients miss events and are told to refresh.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            published: AtomicU64::new(0),
        }
    }

    /// Broadcast an event to all connected clients. Returns how many received it.
    pub fn publish(&self, message: RealtimeMessage) -> usize {
        self.published.fetch_add(1, Ordering::SeqCst);
        // A send error only means nobody is listening
        self.event_tx.send(message).unwrap_or(0)
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn connected_clients(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// Subscribe to receive broadcast events
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_without_clients() {
        let state = HubState::new(8);
        let delivered = state.publish(RealtimeMessage::new("client_created", None));

        assert_eq!(delivered, 0);
        assert_eq!(state.published_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let state = HubState::new(8);
        let mut rx = state.subscribe();
        assert_eq!(state.connected_clients(), 1);

        let delivered = state.publish(RealtimeMessage::new(
            "sale_created",
            Some(json!({"id": 5})),
        ));
        assert_eq!(delivered, 1);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.msg_type, "sale_created");
        assert!(msg.timestamp.is_some());
    }
}
