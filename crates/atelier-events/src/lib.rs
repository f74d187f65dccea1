//! Atelier Events - broadcast bus between the editor core and its windows.
//!
//! Host components publish [`HostEvent`]s to an [`EventBus`]; every open
//! window holds an [`EventReceiver`], optionally filtered to one broadcast
//! channel or a channel prefix.
//!
//! # Example
//!
//! ```rust
//! use atelier_events::{EventBus, EventMetadata, HostEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe_channel("package:*");
//!
//! bus.publish(HostEvent::WindowBroadcast {
//!     metadata: EventMetadata::new("packages"),
//!     channel: "package:loaded".to_string(),
//!     payload: serde_json::json!("welcome"),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.channel(), Some("package:loaded"));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, HostEvent};
