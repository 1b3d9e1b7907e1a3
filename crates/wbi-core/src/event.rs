//! Event bus for wbi using tokio::broadcast
//!
//! Lets long-running consumers (the `watch` command, a server) react to
//! refreshes without polling the index.

use tokio::sync::broadcast;

/// Events emitted by the index service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// A new document was written to the cache
    CacheRefreshed { bytes: usize },
    /// The remote source could not be fetched, stale cache kept
    FetchFailed(String),
    /// A document could not be parsed, previous index kept
    ParseFailed(String),
    /// The in-memory index was replaced
    IndexReloaded {
        districts: usize,
        last_updated: Option<String>,
    },
}

/// Event bus for broadcasting index events
pub struct EventBus {
    sender: broadcast::Sender<IndexEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (64 events)
    pub fn default_capacity() -> Self {
        Self::new(64)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: IndexEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();

        bus.publish(IndexEvent::CacheRefreshed { bytes: 128 });
        bus.publish(IndexEvent::FetchFailed("timeout".to_string()));

        assert_eq!(
            rx.recv().await.unwrap(),
            IndexEvent::CacheRefreshed { bytes: 128 }
        );
        assert!(matches!(rx.recv().await.unwrap(), IndexEvent::FetchFailed(msg) if msg == "timeout"));
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::default_capacity();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        let event = IndexEvent::IndexReloaded {
            districts: 14,
            last_updated: Some("2025-03-11".to_string()),
        };
        bus.publish(event.clone());

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::default_capacity();
        bus.publish(IndexEvent::ParseFailed("no <tag>".to_string()));
    }
}
