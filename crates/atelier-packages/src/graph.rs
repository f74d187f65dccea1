//! Owned module cache with dependency tracking.
//!
//! Each cached module records the paths it required. Eviction of a package's
//! entry module follows those edges but only through modules located under
//! the package's output directory, so shared modules outside it survive.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::module::{ModuleError, ModuleLoader, ModuleResult, PackageModule};

struct ModuleNode {
    exports: Arc<dyn PackageModule>,
    children: Vec<PathBuf>,
}

/// Cache of loaded modules keyed by absolute path.
#[derive(Default)]
pub struct ModuleGraph {
    modules: HashMap<PathBuf, ModuleNode>,
}

impl ModuleGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached exports of a module.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<dyn PackageModule>> {
        self.modules.get(path).map(|node| Arc::clone(&node.exports))
    }

    /// Paths a cached module required.
    #[must_use]
    pub fn children(&self, path: &Path) -> Option<&[PathBuf]> {
        self.modules.get(path).map(|node| node.children.as_slice())
    }

    /// Whether a module is cached.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    /// Number of cached modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Return the cached module at `path`, loading it and everything it
    /// requires on a miss.
    ///
    /// A failure anywhere leaves the cache as it was before the call.
    ///
    /// # Errors
    ///
    /// Returns the loader's error for the first module that fails.
    pub async fn require(
        &mut self,
        path: &Path,
        loader: &dyn ModuleLoader,
    ) -> ModuleResult<Arc<dyn PackageModule>> {
        if let Some(exports) = self.get(path) {
            trace!(path = %path.display(), "Module cache hit");
            return Ok(exports);
        }

        let mut inserted = Vec::new();
        let mut pending = vec![path.to_path_buf()];
        while let Some(next) = pending.pop() {
            if self.modules.contains_key(&next) {
                continue;
            }
            let source = match loader.load(&next).await {
                Ok(source) => source,
                Err(e) => {
                    for path in &inserted {
                        self.modules.remove(path);
                    }
                    return Err(e);
                },
            };
            pending.extend(
                source
                    .requires
                    .iter()
                    .filter(|child| !self.modules.contains_key(*child))
                    .cloned(),
            );
            debug!(path = %next.display(), children = source.requires.len(), "Loaded module");
            self.modules.insert(
                next.clone(),
                ModuleNode {
                    exports: source.exports,
                    children: source.requires,
                },
            );
            inserted.push(next);
        }

        self.get(path)
            .ok_or_else(|| ModuleError::NotFound(path.to_path_buf()))
    }

    /// Evict `entry` and every module reachable from it through modules
    /// located under `root`.
    ///
    /// Returns the evicted paths, or `None` if `entry` was not cached.
    pub fn evict_under(&mut self, entry: &Path, root: &Path) -> Option<Vec<PathBuf>> {
        let node = self.modules.remove(entry)?;
        let mut evicted = vec![entry.to_path_buf()];
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut frontier = node.children;

        while let Some(child) = frontier.pop() {
            if !child.starts_with(root) || !seen.insert(child.clone()) {
                continue;
            }
            if let Some(node) = self.modules.remove(&child) {
                frontier.extend(node.children);
                evicted.push(child);
            }
        }

        debug!(
            entry = %entry.display(),
            root = %root.display(),
            count = evicted.len(),
            "Evicted modules"
        );
        Some(evicted)
    }
}

impl fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
