//! Window broadcasts over the host event bus.

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use atelier_events::{EventBus, EventMetadata, HostEvent};

use crate::host::WindowBroadcaster;

/// Source name stamped on events published by the package manager.
pub const EVENT_SOURCE: &str = "packages";

#[async_trait]
impl WindowBroadcaster for EventBus {
    async fn notify_all_windows(&self, event: &str, payload: Value) {
        let delivered = self.publish(HostEvent::WindowBroadcast {
            metadata: EventMetadata::new(EVENT_SOURCE),
            channel: event.to_string(),
            payload,
        });
        trace!(channel = event, delivered, "Broadcast to windows");
    }
}
