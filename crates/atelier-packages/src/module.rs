//! Entry-module capabilities and the module loader seam.
//!
//! A package's `main` module is whatever the [`ModuleLoader`] produces for
//! its path: an object implementing [`PackageModule`] plus the paths of the
//! modules it required while loading. Caching and eviction of those modules
//! live in [`ModuleGraph`](crate::graph::ModuleGraph).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Errors raised by modules and the module loader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// No module exists at the path.
    #[error("module not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The module exists but failed to evaluate.
    #[error("module {} failed to evaluate: {message}", path.display())]
    Evaluation {
        /// Module path.
        path: PathBuf,
        /// Evaluation error message.
        message: String,
    },

    /// A lifecycle hook failed.
    #[error("{0}")]
    Hook(String),

    /// The module does not handle a message it was sent.
    #[error("unhandled message: {0}")]
    UnhandledMessage(String),
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// The exports of a package entry module.
///
/// Every method has a default, so a module implements only the
/// capabilities it offers.
#[async_trait]
pub trait PackageModule: Send + Sync {
    /// Called once after all of the package's registrations succeed.
    async fn load(&self) -> ModuleResult<()> {
        Ok(())
    }

    /// Called when the package is unloaded.
    async fn unload(&self) -> ModuleResult<()> {
        Ok(())
    }

    /// Message names this module handles. Names without a `:` are namespaced
    /// under the package name when registered.
    fn messages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Handle one of the messages returned by [`messages`](Self::messages).
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UnhandledMessage`] by default.
    fn on_message(&self, message: &str, _payload: Value) -> ModuleResult<Value> {
        Err(ModuleError::UnhandledMessage(message.to_string()))
    }
}

/// A module with no capabilities, for helper modules that only exist to be
/// required by others.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertModule;

impl PackageModule for InertModule {}

/// What the loader produced for one module path.
#[derive(Clone)]
pub struct ModuleSource {
    /// The module's exports.
    pub exports: Arc<dyn PackageModule>,
    /// Paths of modules this module required, in require order.
    pub requires: Vec<PathBuf>,
}

impl ModuleSource {
    /// A module that requires nothing.
    #[must_use]
    pub fn new(exports: Arc<dyn PackageModule>) -> Self {
        Self {
            exports,
            requires: Vec::new(),
        }
    }

    /// Set the modules this module requires.
    #[must_use]
    pub fn with_requires<I, P>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.requires = requires.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSource")
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// Loads (evaluates) a single module from disk.
///
/// Implementations do not cache; the module graph calls `load` once per
/// path until that path is evicted.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the module at `path`.
    async fn load(&self, path: &Path) -> ModuleResult<ModuleSource>;
}

/// Namespace a message name under its package unless it already carries a
/// namespace.
#[must_use]
pub fn message_name(package: &str, message: &str) -> String {
    if message.contains(':') {
        message.to_string()
    } else {
        format!("{package}:{message}")
    }
}
