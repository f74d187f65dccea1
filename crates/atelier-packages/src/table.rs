//! Loaded packages, indexed by source path and by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::dispatcher::MessageDispatcher;
use crate::manifest::PackageManifest;

/// A package that is currently loaded.
#[derive(Debug)]
pub struct LoadedPackage {
    manifest: PackageManifest,
    source_path: PathBuf,
    output_path: PathBuf,
    main_module: Option<PathBuf>,
    pub(crate) messages: MessageDispatcher,
    panel_ids: Vec<String>,
    menu_paths: Vec<String>,
}

impl LoadedPackage {
    pub(crate) fn new(
        manifest: PackageManifest,
        source_path: PathBuf,
        output_path: PathBuf,
        main_module: Option<PathBuf>,
        messages: MessageDispatcher,
        panel_ids: Vec<String>,
        menu_paths: Vec<String>,
    ) -> Self {
        Self {
            manifest,
            source_path,
            output_path,
            main_module,
            messages,
            panel_ids,
            menu_paths,
        }
    }

    /// The package manifest.
    #[must_use]
    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Package version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Directory the package was loaded from.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Directory the package runs from: the source directory or its build
    /// output.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Resolved entry module path, if the package declares `main`.
    #[must_use]
    pub fn main_module(&self) -> Option<&Path> {
        self.main_module.as_deref()
    }

    /// Namespaced message names the package subscribed to.
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.names()
    }

    /// Panel identifiers this package registered.
    #[must_use]
    pub fn panel_ids(&self) -> &[String] {
        &self.panel_ids
    }

    /// Localized menu paths this package registered.
    #[must_use]
    pub fn menu_paths(&self) -> &[String] {
        &self.menu_paths
    }
}

/// Path and name indices over loaded packages.
#[derive(Debug, Default)]
pub struct PackageTable {
    by_path: HashMap<PathBuf, LoadedPackage>,
    by_name: HashMap<String, PathBuf>,
}

impl PackageTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a package under its source path.
    ///
    /// The name index is last-write-wins: if another path already held the
    /// name, it is repointed and the previous path is returned.
    pub fn insert(&mut self, package: LoadedPackage) -> Option<PathBuf> {
        let path = package.source_path.clone();
        let previous = self
            .by_name
            .insert(package.name().to_string(), path.clone())
            .filter(|previous| *previous != path);
        if let Some(previous) = &previous {
            warn!(
                package = %package.name(),
                previous = %previous.display(),
                path = %path.display(),
                "Package name now resolves to a different path"
            );
        }
        self.by_path.insert(path, package);
        previous
    }

    /// Remove the package loaded from `path`.
    ///
    /// The name entry is removed only if it still points at `path`.
    pub fn remove(&mut self, path: &Path) -> Option<LoadedPackage> {
        let package = self.by_path.remove(path)?;
        if self.by_name.get(package.name()).is_some_and(|p| p == path) {
            self.by_name.remove(package.name());
        }
        Some(package)
    }

    /// Look up a package by source path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&LoadedPackage> {
        self.by_path.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &Path) -> Option<&mut LoadedPackage> {
        self.by_path.get_mut(path)
    }

    /// Whether a package is loaded from `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Source path of the package called `name`.
    #[must_use]
    pub fn path_by_name(&self, name: &str) -> Option<&Path> {
        self.by_name.get(name).map(PathBuf::as_path)
    }

    /// Look up a package by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&LoadedPackage> {
        self.path_by_name(name).and_then(|path| self.get(path))
    }

    /// The package whose source directory is the longest component-wise
    /// prefix of `path`.
    #[must_use]
    pub fn containing(&self, path: &Path) -> Option<&LoadedPackage> {
        self.by_path
            .iter()
            .filter(|(source, _)| path.starts_with(source))
            .max_by_key(|(source, _)| source.components().count())
            .map(|(_, package)| package)
    }

    /// Iterate over loaded packages in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &LoadedPackage> {
        self.by_path.values()
    }

    /// Number of loaded packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether no package is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
