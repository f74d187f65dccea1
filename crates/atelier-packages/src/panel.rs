//! Registered panels, keyed by `packageName.panelName`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::manifest::PanelDef;

/// Panel kind used when the manifest does not declare one.
pub const DEFAULT_PANEL_TYPE: &str = "dockable";

/// Build the registry identifier of a package panel.
#[must_use]
pub fn panel_id(package: &str, panel: &str) -> String {
    format!("{package}.{panel}")
}

/// A panel definition with every default filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelInfo {
    /// Panel kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Window title.
    pub title: String,
    /// Whether the panel can be popped out.
    pub popable: bool,
    /// Messages the panel listens to.
    pub messages: Vec<String>,
    /// Directory the panel is served from.
    pub path: PathBuf,
    /// Extra manifest fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PanelDef {
    /// Resolve this definition for registration under `id`, defaulting the
    /// serving directory to the package output path.
    #[must_use]
    pub fn resolve(&self, id: &str, output_path: &Path) -> PanelInfo {
        PanelInfo {
            kind: self
                .kind
                .clone()
                .unwrap_or_else(|| DEFAULT_PANEL_TYPE.to_string()),
            title: self.title.clone().unwrap_or_else(|| id.to_string()),
            popable: self.popable.unwrap_or(true),
            messages: self.messages.clone().unwrap_or_default(),
            path: self
                .path
                .clone()
                .unwrap_or_else(|| output_path.to_path_buf()),
            extra: self.extra.clone(),
        }
    }
}

/// All registered panels.
#[derive(Debug, Clone, Default)]
pub struct PanelRegistry {
    panels: HashMap<String, PanelInfo>,
}

impl PanelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a panel unless the identifier is taken.
    ///
    /// Returns `false` and leaves the existing panel untouched on collision.
    pub fn try_insert(&mut self, id: String, info: PanelInfo) -> bool {
        if self.panels.contains_key(&id) {
            return false;
        }
        self.panels.insert(id, info);
        true
    }

    /// Remove a panel, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<PanelInfo> {
        self.panels.remove(id)
    }

    /// Look up a panel.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PanelInfo> {
        self.panels.get(id)
    }

    /// Whether a panel identifier is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.panels.contains_key(id)
    }

    /// Registered identifiers, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.panels.keys().map(String::as_str)
    }

    /// Number of registered panels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// Whether no panel is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}
