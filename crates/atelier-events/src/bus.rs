//! Event bus for broadcasting host events to subscribers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::HostEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers.
///
/// Events are delivered asynchronously and in order. Clones share the same
/// channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<HostEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: HostEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "Publishing event");

        if let Ok(count) = self.sender.send(Arc::clone(&event)) {
            debug!(
                event_type = %event.event_type(),
                receiver_count = count,
                "Event published"
            );
            count
        } else {
            trace!(event_type = %event.event_type(), "No receivers for event");
            0
        }
    }

    /// Subscribe to every event.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), None)
    }

    /// Subscribe to window broadcasts on one channel.
    ///
    /// The pattern is an exact channel name (`package:loaded`) or a prefix
    /// ending in `*` (`package:*`). Non-broadcast events are filtered out.
    #[must_use]
    pub fn subscribe_channel(&self, pattern: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), Some(pattern.into()))
    }

    /// Number of active receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<HostEvent>>,
    channel_pattern: Option<String>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<Arc<HostEvent>>, channel_pattern: Option<String>) -> Self {
        Self {
            receiver,
            channel_pattern,
        }
    }

    fn matches(&self, event: &HostEvent) -> bool {
        let Some(pattern) = &self.channel_pattern else {
            return true;
        };
        let Some(channel) = event.channel() else {
            return false;
        };
        match pattern.strip_suffix('*') {
            Some(prefix) => channel.starts_with(prefix),
            None => channel == pattern,
        }
    }

    /// Receive the next matching event.
    ///
    /// Returns `None` once the bus is dropped. Events lost to a slow
    /// receiver are logged and skipped.
    pub async fn recv(&mut self) -> Option<Arc<HostEvent>> {
        let mut skipped: usize = 0;
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                    skipped = skipped.wrapping_add(1);
                    if skipped.is_multiple_of(100) {
                        tokio::task::yield_now().await;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next matching event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<HostEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::event::EventMetadata;

    fn broadcast(channel: &str) -> HostEvent {
        HostEvent::WindowBroadcast {
            metadata: EventMetadata::new("test"),
            channel: channel.to_string(),
            payload: Value::from("foo"),
        }
    }

    fn started() -> HostEvent {
        HostEvent::HostStarted {
            metadata: EventMetadata::new("test"),
            version: "0.1.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(started()), 1);
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "host_started");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(broadcast("package:loaded")), 2);
        assert_eq!(first.recv().await.unwrap().channel(), Some("package:loaded"));
        assert_eq!(second.recv().await.unwrap().channel(), Some("package:loaded"));
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(started()), 0);
    }

    #[tokio::test]
    async fn test_channel_filter_exact() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe_channel("package:unloaded");

        bus.publish(started());
        bus.publish(broadcast("package:loaded"));
        bus.publish(broadcast("package:unloaded"));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.channel(), Some("package:unloaded"));
        assert!(receiver.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_channel_filter_prefix() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe_channel("package:*");

        bus.publish(broadcast("editor:focus"));
        bus.publish(broadcast("package:loaded"));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.channel(), Some("package:loaded"));
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut receiver = clone.subscribe();
        bus.publish(started());
        assert!(receiver.try_recv().is_some());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_closed() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        drop(bus);
        assert!(receiver.recv().await.is_none());
    }
}
