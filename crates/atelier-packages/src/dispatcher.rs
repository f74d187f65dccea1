//! Per-package group of message subscriptions.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::host::{HostResult, MessageHandler, MessageTransport, SubscriptionId};

/// Owns every transport subscription made on behalf of one package.
///
/// Subscriptions are released by [`clear`](Self::clear) and on drop, so a
/// dispatcher never outlives its registrations.
pub struct MessageDispatcher {
    transport: Arc<dyn MessageTransport>,
    subscriptions: Vec<(String, SubscriptionId)>,
}

impl MessageDispatcher {
    /// Create an empty dispatcher over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            transport,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe `handler` to the message `name`.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the subscription is refused.
    pub fn on(&mut self, name: &str, handler: MessageHandler) -> HostResult<()> {
        let id = self.transport.subscribe(name, handler)?;
        debug!(message = name, "Subscribed to message");
        self.subscriptions.push((name.to_string(), id));
        Ok(())
    }

    /// Registered message names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(|(name, _)| name.as_str())
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether there are no active subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drop every subscription. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.subscriptions.len();
        for (_, id) in self.subscriptions.drain(..) {
            self.transport.unsubscribe(id);
        }
        count
    }
}

impl Drop for MessageDispatcher {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}
