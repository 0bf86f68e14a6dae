//! Data-layer events
//!
//! The loader, the cache and the async reader report what changed on one
//! broadcast bus; UI code subscribes instead of polling.

use dircache_types::{MessageKind, ObjectId, TypeId};
use tokio::sync::broadcast;
use tracing::trace;

/// Events emitted by the client data layer
#[derive(Debug, Clone)]
pub enum DataEvent {
    /// A load cycle finished populating every schema map
    SchemaLoaded { generation: u64, type_count: usize },
    /// A load cycle stopped on a remote failure
    SchemaLoadFailed { generation: u64, message: String },
    /// A listing was fetched and stored for a type
    ListingCached(TypeId),
    /// Non-editable handles were merged into a cached listing
    ListingAugmented { type_id: TypeId, added: usize },
    ObjectAdded(ObjectId),
    ObjectRemoved(ObjectId),
    ObjectRelabeled(ObjectId),
    ObjectUpdated(ObjectId),
    /// Every cached listing was dropped
    CachesCleared,
    /// The server forced this client off
    ForcedDisconnect(String),
    /// Status message pushed by the server
    ServerMessage { kind: MessageKind, text: String },
    /// The async reader stopped on an error
    ReaderError(String),
}

/// Fan-out of [`DataEvent`]s to every subscriber
///
/// Publishing never blocks; a subscriber that falls more than `capacity`
/// events behind sees `RecvError::Lagged` and skips ahead.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DataEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Bus sized like [`ClientConfig::default`](crate::ClientConfig)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Send to current subscribers, returning how many received it
    pub fn publish(&self, event: DataEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "Event dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(DataEvent::CachesCleared), 1);
        bus.publish(DataEvent::ListingCached(TypeId(3)));

        assert!(matches!(rx.recv().await.unwrap(), DataEvent::CachesCleared));
        assert!(matches!(
            rx.recv().await.unwrap(),
            DataEvent::ListingCached(id) if id == TypeId(3)
        ));
    }

    #[tokio::test]
    async fn test_clones_share_subscribers() {
        let bus = EventBus::default_capacity();
        let publisher = bus.clone();
        let mut first = bus.subscribe();
        let mut second = publisher.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = publisher.publish(DataEvent::ForcedDisconnect("maintenance".to_string()));
        assert_eq!(delivered, 2);

        assert!(matches!(first.recv().await.unwrap(), DataEvent::ForcedDisconnect(_)));
        assert!(matches!(second.recv().await.unwrap(), DataEvent::ForcedDisconnect(_)));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(0);
        assert_eq!(bus.publish(DataEvent::CachesCleared), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for num in 0..4 {
            bus.publish(DataEvent::ObjectAdded(ObjectId::new(TypeId(3), num)));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
    }
}
