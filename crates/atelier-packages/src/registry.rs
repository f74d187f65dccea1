//! The bookkeeping tables of one package manager.

use crate::panel::PanelRegistry;
use crate::search::SearchPathSet;
use crate::table::PackageTable;
use crate::version::VersionRegistry;

/// Owns every table the package manager reads and writes.
///
/// Each manager has its own registry, so independent managers (and tests)
/// never share state.
#[derive(Debug, Default)]
pub struct Registry {
    versions: VersionRegistry,
    search_paths: SearchPathSet,
    packages: PackageTable,
    panels: PanelRegistry,
}

impl Registry {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host component versions.
    #[must_use]
    pub fn versions(&self) -> &VersionRegistry {
        &self.versions
    }

    /// Mutable host component versions.
    pub fn versions_mut(&mut self) -> &mut VersionRegistry {
        &mut self.versions
    }

    /// Package search directories.
    #[must_use]
    pub fn search_paths(&self) -> &SearchPathSet {
        &self.search_paths
    }

    /// Mutable package search directories.
    pub fn search_paths_mut(&mut self) -> &mut SearchPathSet {
        &mut self.search_paths
    }

    /// Loaded packages.
    #[must_use]
    pub fn packages(&self) -> &PackageTable {
        &self.packages
    }

    pub(crate) fn packages_mut(&mut self) -> &mut PackageTable {
        &mut self.packages
    }

    /// Registered panels.
    #[must_use]
    pub fn panels(&self) -> &PanelRegistry {
        &self.panels
    }

    pub(crate) fn panels_mut(&mut self) -> &mut PanelRegistry {
        &mut self.panels
    }
}
