//! Host application services consumed by the package manager.
//!
//! The manager never touches menus, localization tables, IPC or windows
//! directly. Each of those is a narrow trait object supplied by the host
//! through [`HostServices`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::manifest::MenuItemDef;
use crate::module::ModuleResult;

/// Errors reported by host collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The menu service rejected an operation.
    #[error("menu error: {0}")]
    Menu(String),

    /// An image could not be decoded.
    #[error("image error: {0}")]
    Image(String),

    /// The message transport rejected an operation.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for host collaborator calls.
pub type HostResult<T> = Result<T, HostError>;

/// Opaque handle to an image decoded by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(u64);

impl ImageHandle {
    /// Wrap a host-specific image identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The host-specific identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Template for one main-menu entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuTemplate {
    /// Displayed label.
    pub label: String,
    /// Decoded icon, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<ImageHandle>,
    /// Message sent when activated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Keyboard accelerator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<String>,
    /// Further fields from the manifest.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MenuItemDef {
    /// Build the menu template for this entry. A declared `label` overrides
    /// the one derived from the menu path.
    #[must_use]
    pub fn template(&self, label: &str, icon: Option<ImageHandle>) -> MenuTemplate {
        MenuTemplate {
            label: self.label.clone().unwrap_or_else(|| label.to_string()),
            icon,
            message: self.message.clone(),
            accelerator: self.accelerator.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Identifier of one transport subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a transport-specific subscription number.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The transport-specific number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Handler invoked for an incoming message payload.
pub type MessageHandler = Arc<dyn Fn(Value) -> ModuleResult<Value> + Send + Sync>;

/// The application main menu.
pub trait MenuService: Send + Sync {
    /// Add an entry under the menu at `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Menu`] if the entry cannot be added.
    fn add(&self, parent: &str, template: MenuTemplate) -> HostResult<()>;

    /// Remove the entry at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Menu`] if the entry cannot be removed.
    fn remove(&self, path: &str) -> HostResult<()>;
}

/// The host localization table.
pub trait Localization: Send + Sync {
    /// Merge a fragment into the table.
    fn extend(&self, fragment: Map<String, Value>);

    /// Remove top-level keys from the table.
    fn unset(&self, keys: &[String]);

    /// Localize every segment of a slash-separated path.
    fn format_path(&self, path: &str) -> String;
}

/// Named-message IPC transport.
pub trait MessageTransport: Send + Sync {
    /// Subscribe a handler to a message name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Transport`] if the subscription is refused.
    fn subscribe(&self, name: &str, handler: MessageHandler) -> HostResult<SubscriptionId>;

    /// Drop a subscription. Unknown identifiers are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Broadcast to every open host window.
#[async_trait]
pub trait WindowBroadcaster: Send + Sync {
    /// Send `event` with `payload` to all windows.
    async fn notify_all_windows(&self, event: &str, payload: Value);
}

/// Decodes image files for menu icons.
pub trait ImageDecoder: Send + Sync {
    /// Decode the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Image`] if the file is missing or not an image.
    fn from_path(&self, path: &Path) -> HostResult<ImageHandle>;
}

/// The full set of host collaborators.
#[derive(Clone)]
pub struct HostServices {
    /// Main menu.
    pub menu: Arc<dyn MenuService>,
    /// Localization table.
    pub localization: Arc<dyn Localization>,
    /// Message transport.
    pub transport: Arc<dyn MessageTransport>,
    /// Window broadcaster.
    pub broadcaster: Arc<dyn WindowBroadcaster>,
    /// Image decoder.
    pub images: Arc<dyn ImageDecoder>,
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}

/// Split a localized menu path into `(parent, label)`.
///
/// Returns `None` when there is no parent segment or the label is empty.
#[must_use]
pub fn split_menu_path(path: &str) -> Option<(&str, &str)> {
    let (parent, label) = path.rsplit_once('/')?;
    if parent.is_empty() || label.is_empty() {
        return None;
    }
    Some((parent, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_menu_path() {
        assert_eq!(split_menu_path("Tools/Foo"), Some(("Tools", "Foo")));
        assert_eq!(
            split_menu_path("Tools/Sub/Foo"),
            Some(("Tools/Sub", "Foo"))
        );
        assert_eq!(split_menu_path("Foo"), None);
        assert_eq!(split_menu_path("/Foo"), None);
        assert_eq!(split_menu_path("Tools/"), None);
    }

    #[test]
    fn test_template_serialization_skips_empty() {
        let template = MenuTemplate {
            label: "Foo".into(),
            icon: None,
            message: Some("foo:open".into()),
            accelerator: None,
            extra: Map::new(),
        };
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["label"], "Foo");
        assert!(json.get("icon").is_none());
        assert_eq!(json["message"], "foo:open");
    }

    #[test]
    fn test_template_label_override() {
        let def = MenuItemDef {
            label: Some("Open Foo".into()),
            ..MenuItemDef::default()
        };
        assert_eq!(def.template("Foo", None).label, "Open Foo");
        assert_eq!(MenuItemDef::default().template("Foo", None).label, "Foo");
    }

    #[test]
    fn test_handles_roundtrip_ids() {
        assert_eq!(ImageHandle::new(7).id(), 7);
        assert_eq!(SubscriptionId::new(9).value(), 9);
    }
}
