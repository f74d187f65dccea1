//! Commonly used types.
//!
//! Use `use atelier_events::prelude::*;` to import them.

pub use crate::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventMetadata, EventReceiver, HostEvent};
