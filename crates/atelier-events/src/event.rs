//! Events carried by the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Component that published the event.
    pub source: String,
}

impl EventMetadata {
    /// Create metadata stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// An event published on the host bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The host application finished starting.
    HostStarted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Host version.
        version: String,
    },
    /// A message for every open window.
    WindowBroadcast {
        /// Event metadata.
        metadata: EventMetadata,
        /// Channel name, e.g. `package:loaded`.
        channel: String,
        /// Message payload.
        payload: Value,
    },
}

impl HostEvent {
    /// Stable snake_case name of the event kind.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::HostStarted { .. } => "host_started",
            Self::WindowBroadcast { .. } => "window_broadcast",
        }
    }

    /// Event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::HostStarted { metadata, .. } | Self::WindowBroadcast { metadata, .. } => metadata,
        }
    }

    /// Broadcast channel, for window broadcasts.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::WindowBroadcast { channel, .. } => Some(channel),
            Self::HostStarted { .. } => None,
        }
    }

    /// Broadcast payload, for window broadcasts.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::WindowBroadcast { payload, .. } => Some(payload),
            Self::HostStarted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_ids_are_unique() {
        let a = EventMetadata::new("test");
        let b = EventMetadata::new("test");
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.source, "test");
    }

    #[test]
    fn test_broadcast_accessors() {
        let event = HostEvent::WindowBroadcast {
            metadata: EventMetadata::new("packages"),
            channel: "package:loaded".into(),
            payload: Value::from("foo"),
        };
        assert_eq!(event.event_type(), "window_broadcast");
        assert_eq!(event.channel(), Some("package:loaded"));
        assert_eq!(event.payload(), Some(&Value::from("foo")));
        assert_eq!(event.metadata().source, "packages");
    }

    #[test]
    fn test_serde_tagging() {
        let event = HostEvent::HostStarted {
            metadata: EventMetadata::new("host"),
            version: "1.0.0".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "host_started");
        let back: HostEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
