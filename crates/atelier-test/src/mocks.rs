//! Recording implementations of the host services and build/module seams.
//!
//! Every mock is cheap to clone and shares its state between clones, so a
//! test keeps one handle for assertions while the manager owns another.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use atelier_packages::{
    BuildError, BuildOptions, Builder, DEV_OUTPUT_DIR, HostError, HostResult, ImageDecoder,
    ImageHandle, Localization, MenuService, MenuTemplate, MessageHandler, MessageTransport,
    ModuleError, ModuleLoader, ModuleResult, ModuleSource, PackageModule, SubscriptionId,
    WindowBroadcaster,
};

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

/// Menu service that records added entries by full path.
#[derive(Debug, Clone, Default)]
pub struct RecordingMenu {
    entries: Arc<Mutex<Vec<(String, MenuTemplate)>>>,
    removed: Arc<Mutex<Vec<String>>>,
    rejected_parents: Arc<Mutex<HashSet<String>>>,
}

impl RecordingMenu {
    /// Create an empty menu.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every entry added under `parent`.
    #[must_use]
    pub fn with_rejected_parent(self, parent: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.rejected_parents.lock() {
            guard.insert(parent.into());
        }
        self
    }

    /// Full paths (`parent/label`) of the entries currently present.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|guard| guard.iter().map(|(path, _)| path.clone()).collect())
            .unwrap_or_default()
    }

    /// The template added at `path`, if present.
    #[must_use]
    pub fn template(&self, path: &str) -> Option<MenuTemplate> {
        self.entries.lock().ok().and_then(|guard| {
            guard
                .iter()
                .find(|(entry, _)| entry == path)
                .map(|(_, template)| template.clone())
        })
    }

    /// Paths passed to `remove`, in call order.
    #[must_use]
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl MenuService for RecordingMenu {
    fn add(&self, parent: &str, template: MenuTemplate) -> HostResult<()> {
        let rejected = self
            .rejected_parents
            .lock()
            .is_ok_and(|guard| guard.contains(parent));
        if rejected {
            return Err(HostError::Menu(format!("menu '{parent}' is read-only")));
        }
        let path = format!("{parent}/{}", template.label);
        if let Ok(mut guard) = self.entries.lock() {
            guard.push((path, template));
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> HostResult<()> {
        if let Ok(mut guard) = self.removed.lock() {
            guard.push(path.to_string());
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| HostError::Menu("menu lock poisoned".to_string()))?;
        let before = guard.len();
        guard.retain(|(entry, _)| entry != path);
        if guard.len() == before {
            return Err(HostError::Menu(format!("no menu entry at '{path}'")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Localization
// ---------------------------------------------------------------------------

/// Localization table backed by a JSON object.
///
/// `format_path` replaces each path segment found in the translation map
/// and leaves the others untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordingLocalization {
    table: Arc<Mutex<Map<String, Value>>>,
    translations: Arc<Mutex<HashMap<String, String>>>,
}

impl RecordingLocalization {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate the path segment `segment` to `localized`.
    #[must_use]
    pub fn with_translation(self, segment: impl Into<String>, localized: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.translations.lock() {
            guard.insert(segment.into(), localized.into());
        }
        self
    }

    /// The value stored under a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.table.lock().ok().and_then(|guard| guard.get(key).cloned())
    }

    /// Top-level keys currently in the table.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.table
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Localization for RecordingLocalization {
    fn extend(&self, fragment: Map<String, Value>) {
        if let Ok(mut guard) = self.table.lock() {
            guard.extend(fragment);
        }
    }

    fn unset(&self, keys: &[String]) {
        if let Ok(mut guard) = self.table.lock() {
            for key in keys {
                guard.remove(key);
            }
        }
    }

    fn format_path(&self, path: &str) -> String {
        let Ok(translations) = self.translations.lock() else {
            return path.to_string();
        };
        path.split('/')
            .map(|segment| translations.get(segment).map_or(segment, String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// In-process message transport.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    handlers: Arc<Mutex<HashMap<SubscriptionId, (String, MessageHandler)>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
    next_id: Arc<AtomicU64>,
}

impl RecordingTransport {
    /// Create a transport with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse subscriptions to `name`.
    #[must_use]
    pub fn with_rejected(self, name: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.rejected.lock() {
            guard.insert(name.into());
        }
        self
    }

    /// Deliver `payload` to the first handler subscribed to `name`.
    ///
    /// Returns `None` if nobody is subscribed.
    #[must_use]
    pub fn send(&self, name: &str, payload: Value) -> Option<ModuleResult<Value>> {
        let handler = self.handlers.lock().ok().and_then(|guard| {
            guard
                .values()
                .find(|(subscribed, _)| subscribed == name)
                .map(|(_, handler)| Arc::clone(handler))
        })?;
        Some(handler(payload))
    }

    /// Names with at least one subscription, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .lock()
            .map(|guard| guard.values().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names.dedup();
        names
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.handlers.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for RecordingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingTransport")
            .field("names", &self.names())
            .finish_non_exhaustive()
    }
}

impl MessageTransport for RecordingTransport {
    fn subscribe(&self, name: &str, handler: MessageHandler) -> HostResult<SubscriptionId> {
        if self.rejected.lock().is_ok_and(|guard| guard.contains(name)) {
            return Err(HostError::Transport(format!("'{name}' is reserved")));
        }
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut guard) = self.handlers.lock() {
            guard.insert(id, (name.to_string(), handler));
        }
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut guard) = self.handlers.lock() {
            guard.remove(&id);
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Broadcaster that records every window notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingBroadcaster {
    events: Arc<Mutex<Vec<(String, Value)>>>,
}

impl RecordingBroadcaster {
    /// Create a broadcaster with no recorded events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(event, payload)` pair, in send order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Payloads of every event called `event`, in send order.
    #[must_use]
    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }
}

#[async_trait]
impl WindowBroadcaster for RecordingBroadcaster {
    async fn notify_all_windows(&self, event: &str, payload: Value) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push((event.to_string(), payload));
        }
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Image decoder that accepts any existing file.
#[derive(Debug, Clone, Default)]
pub struct StubImageDecoder {
    next_id: Arc<AtomicU64>,
}

impl StubImageDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageDecoder for StubImageDecoder {
    fn from_path(&self, path: &Path) -> HostResult<ImageHandle> {
        if path.is_file() {
            Ok(ImageHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed)))
        } else {
            Err(HostError::Image(format!("no image at {}", path.display())))
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder that copies the source manifest into `<package>/bin/dev`.
///
/// Counts builds per package directory and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct CountingBuilder {
    builds: Arc<Mutex<Vec<(PathBuf, BuildOptions)>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl CountingBuilder {
    /// Create a builder that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following build fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = Some(message.into());
        }
    }

    /// Let following builds succeed again.
    pub fn succeed(&self) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = None;
        }
    }

    /// Number of builds started for `path`.
    #[must_use]
    pub fn build_count(&self, path: &Path) -> usize {
        self.builds
            .lock()
            .map(|guard| guard.iter().filter(|(built, _)| built == path).count())
            .unwrap_or(0)
    }

    /// Options of the most recent build.
    #[must_use]
    pub fn last_options(&self) -> Option<BuildOptions> {
        self.builds
            .lock()
            .ok()
            .and_then(|guard| guard.last().map(|(_, options)| *options))
    }
}

#[async_trait]
impl Builder for CountingBuilder {
    async fn build(&self, path: &Path, options: &BuildOptions) -> Result<PathBuf, BuildError> {
        if let Ok(mut guard) = self.builds.lock() {
            guard.push((path.to_path_buf(), *options));
        }
        let failure = self.failure.lock().ok().and_then(|guard| guard.clone());
        if let Some(message) = failure {
            return Err(BuildError::Other(message));
        }

        let output = path.join(DEV_OUTPUT_DIR);
        tokio::fs::create_dir_all(&output)
            .await
            .map_err(|e| BuildError::Other(e.to_string()))?;
        tokio::fs::copy(
            path.join(atelier_packages::MANIFEST_FILE_NAME),
            output.join(atelier_packages::MANIFEST_FILE_NAME),
        )
        .await
        .map_err(|e| BuildError::Other(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Test build finished");
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// Package module with scripted hooks.
///
/// Messages answer with `{"message": <name>, "payload": <payload>}`.
#[derive(Debug, Default)]
pub struct ScriptedModule {
    messages: Vec<String>,
    load_error: Option<String>,
    unload_error: Option<String>,
    load_calls: AtomicUsize,
    unload_calls: AtomicUsize,
}

impl ScriptedModule {
    /// A module whose hooks succeed and that handles no messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle these message names.
    #[must_use]
    pub fn with_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages = messages.into_iter().map(Into::into).collect();
        self
    }

    /// Make the `load` hook fail with `message`.
    #[must_use]
    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    /// Make the `unload` hook fail with `message`.
    #[must_use]
    pub fn failing_unload(mut self, message: impl Into<String>) -> Self {
        self.unload_error = Some(message.into());
        self
    }

    /// Number of `load` hook calls.
    #[must_use]
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Number of `unload` hook calls.
    #[must_use]
    pub fn unload_calls(&self) -> usize {
        self.unload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageModule for ScriptedModule {
    async fn load(&self) -> ModuleResult<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        match &self.load_error {
            Some(message) => Err(ModuleError::Hook(message.clone())),
            None => Ok(()),
        }
    }

    async fn unload(&self) -> ModuleResult<()> {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
        match &self.unload_error {
            Some(message) => Err(ModuleError::Hook(message.clone())),
            None => Ok(()),
        }
    }

    fn messages(&self) -> Vec<String> {
        self.messages.clone()
    }

    fn on_message(&self, message: &str, payload: Value) -> ModuleResult<Value> {
        Ok(json!({ "message": message, "payload": payload }))
    }
}

/// Module loader serving modules registered by path.
#[derive(Clone, Default)]
pub struct ScriptedModuleLoader {
    modules: Arc<Mutex<HashMap<PathBuf, ModuleSource>>>,
    loads: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedModuleLoader {
    /// Create a loader with no modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `module` at `path`, requiring nothing.
    pub fn insert(&self, path: impl Into<PathBuf>, module: Arc<dyn PackageModule>) {
        self.insert_source(path, ModuleSource::new(module));
    }

    /// Serve `source` at `path`.
    pub fn insert_source(&self, path: impl Into<PathBuf>, source: ModuleSource) {
        if let Ok(mut guard) = self.modules.lock() {
            guard.insert(path.into(), source);
        }
    }

    /// Number of times `path` was loaded.
    #[must_use]
    pub fn load_count(&self, path: &Path) -> usize {
        self.loads
            .lock()
            .map(|guard| guard.iter().filter(|loaded| *loaded == path).count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for ScriptedModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModuleLoader").finish_non_exhaustive()
    }
}

#[async_trait]
impl ModuleLoader for ScriptedModuleLoader {
    async fn load(&self, path: &Path) -> ModuleResult<ModuleSource> {
        if let Ok(mut guard) = self.loads.lock() {
            guard.push(path.to_path_buf());
        }
        self.modules
            .lock()
            .ok()
            .and_then(|guard| guard.get(path).cloned())
            .ok_or_else(|| ModuleError::NotFound(path.to_path_buf()))
    }
}
