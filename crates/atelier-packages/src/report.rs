//! Outcomes of lifecycle operations.

use std::path::{Path, PathBuf};

use crate::error::PackageWarning;

/// Whether a load did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The package was loaded by this call.
    Loaded,
    /// The path was already loaded; nothing changed.
    AlreadyLoaded,
}

/// Result of a successful [`load`](crate::PackageManager::load).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Package source directory.
    pub path: PathBuf,
    /// Package name.
    pub name: String,
    /// What the call did.
    pub status: LoadStatus,
    /// Non-fatal problems, including those of dependencies loaded on the way.
    pub warnings: Vec<PackageWarning>,
}

impl LoadReport {
    pub(crate) fn loaded(path: &Path, name: String, warnings: Vec<PackageWarning>) -> Self {
        Self {
            path: path.to_path_buf(),
            name,
            status: LoadStatus::Loaded,
            warnings,
        }
    }

    pub(crate) fn already_loaded(path: &Path, name: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            status: LoadStatus::AlreadyLoaded,
            warnings: Vec::new(),
        }
    }

    /// Whether the path was already loaded before the call.
    #[must_use]
    pub fn is_already_loaded(&self) -> bool {
        self.status == LoadStatus::AlreadyLoaded
    }
}

/// Result of an [`unload`](crate::PackageManager::unload). Unload never
/// fails; problems are reported as warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnloadReport {
    /// Package source directory.
    pub path: PathBuf,
    /// Name of the unloaded package, or `None` if nothing was loaded there.
    pub name: Option<String>,
    /// Teardown steps that failed.
    pub warnings: Vec<PackageWarning>,
}

impl UnloadReport {
    pub(crate) fn not_loaded(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: None,
            warnings: Vec::new(),
        }
    }

    /// Whether a package was actually unloaded.
    #[must_use]
    pub fn was_loaded(&self) -> bool {
        self.name.is_some()
    }
}
