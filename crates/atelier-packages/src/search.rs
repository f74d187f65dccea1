//! Directories scanned to resolve a package name to a package directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Ordered, deduplicated list of package search directories.
#[derive(Debug, Clone, Default)]
pub struct SearchPathSet {
    paths: Vec<PathBuf>,
}

impl SearchPathSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append directories, skipping ones already present.
    ///
    /// Returns how many were added.
    pub fn add<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let before = self.paths.len();
        for path in paths {
            let path = path.into();
            if !self.paths.contains(&path) {
                debug!(path = %path.display(), "Added package search path");
                self.paths.push(path);
            }
        }
        self.paths.len().saturating_sub(before)
    }

    /// Remove a directory. Returns whether it was present.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        before != self.paths.len()
    }

    /// Remove every directory.
    pub fn reset(&mut self) {
        self.paths.clear();
    }

    /// Registered directories in search order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Whether no directory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Resolve a package name to `<dir>/<name>` for the first registered
    /// directory whose listing contains an entry called `name`.
    ///
    /// Unreadable directories are skipped.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Skipping unreadable search path");
                    continue;
                },
            };
            let found = entries
                .filter_map(Result::ok)
                .any(|entry| entry.file_name().to_str() == Some(name));
            if found {
                return Some(dir.join(name));
            }
        }
        None
    }
}
