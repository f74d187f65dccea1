//! Package lifecycle error and warning types.

use std::path::PathBuf;

use crate::build::BuildError;
use crate::module::ModuleError;
use crate::version::HostMismatch;

/// Fatal errors from loading, building or reloading a package.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// The package manifest is missing or malformed.
    #[error("manifest error in {path}: {message}")]
    Manifest {
        /// Path to the manifest file.
        path: PathBuf,
        /// Read or parse error message.
        message: String,
    },

    /// A `hosts` constraint of the manifest is not satisfied.
    #[error("package {package} is incompatible with the host: {mismatch}")]
    HostIncompatible {
        /// The package that declared the constraint.
        package: String,
        /// Which constraint failed and why.
        #[source]
        mismatch: HostMismatch,
    },

    /// A declared dependency was not found in any search path.
    #[error("package {package} depends on {dependency}, which is not in any search path")]
    DependencyNotFound {
        /// The dependent package.
        package: String,
        /// The dependency name that could not be resolved.
        dependency: String,
    },

    /// A dependency chain re-entered a package that is still loading.
    #[error("dependency cycle: {} is already being loaded", path.display())]
    DependencyCycle {
        /// The package directory that was re-entered.
        path: PathBuf,
    },

    /// The build step failed.
    #[error("failed to build package {package}: {source}")]
    BuildFailed {
        /// The package being built.
        package: String,
        /// The builder error.
        #[source]
        source: BuildError,
    },

    /// The localization file exists but could not be read or parsed.
    #[error("failed to load localization {path}: {message}")]
    I18nLoad {
        /// Path to the localization file.
        path: PathBuf,
        /// Read or parse error message.
        message: String,
    },

    /// The entry module could not be loaded.
    #[error("failed to load entry module {main} of package {package}: {source}")]
    MainLoad {
        /// The package declaring the entry module.
        package: String,
        /// The declared `main` path.
        main: String,
        /// The module loader error.
        #[source]
        source: ModuleError,
    },

    /// The entry module's `load` hook failed; registrations were rolled back.
    #[error("load hook of package {package} failed: {message}")]
    LoadHook {
        /// The package whose hook failed.
        package: String,
        /// Hook failure message.
        message: String,
    },
}

/// Result type for package lifecycle operations.
pub type PackageResult<T> = Result<T, PackageError>;

/// Non-fatal conditions recorded while loading or unloading a package.
///
/// Each warning is logged at `warn` when it happens and returned in the
/// operation's report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackageWarning {
    /// A panel with the same identifier is already registered.
    #[error("panel {id} of package {package} already exists")]
    PanelCollision {
        /// The package declaring the panel.
        package: String,
        /// The colliding `package.panel` identifier.
        id: String,
    },

    /// A menu path has no parent segment.
    #[error("menu path '{path}' of package {package} has no parent menu")]
    InvalidMenuPath {
        /// The package declaring the menu.
        package: String,
        /// The localized menu path.
        path: String,
    },

    /// The image decoder rejected a menu icon; the entry was added without it.
    #[error("icon of menu '{path}' in package {package} could not be decoded: {message}")]
    InvalidMenuIcon {
        /// The package declaring the menu.
        package: String,
        /// The localized menu path.
        path: String,
        /// Decoder error message.
        message: String,
    },

    /// The menu service refused to add an entry.
    #[error("menu '{path}' of package {package} was rejected: {message}")]
    MenuRejected {
        /// The package declaring the menu.
        package: String,
        /// The localized menu path.
        path: String,
        /// Menu service error message.
        message: String,
    },

    /// The message transport refused a subscription.
    #[error("message '{message}' of package {package} could not be registered: {reason}")]
    MessageRejected {
        /// The package exporting the message.
        package: String,
        /// The namespaced message name.
        message: String,
        /// Transport error message.
        reason: String,
    },

    /// The entry module's `unload` hook failed.
    #[error("unload hook of package {package} failed: {message}")]
    UnloadHookFailed {
        /// The package whose hook failed.
        package: String,
        /// Hook failure message.
        message: String,
    },

    /// The entry module was not in the module cache.
    #[error("module {} of package {package} was not cached", module.display())]
    UncacheFailed {
        /// The package being unloaded.
        package: String,
        /// The entry module path.
        module: PathBuf,
    },

    /// A host collaborator failed while tearing down a registration.
    #[error("teardown of {target} for package {package} failed: {message}")]
    TeardownFailed {
        /// The package being unloaded.
        package: String,
        /// What was being removed.
        target: String,
        /// Collaborator error message.
        message: String,
    },
}

impl PackageWarning {
    /// Name of the package the warning refers to.
    #[must_use]
    pub fn package(&self) -> &str {
        match self {
            Self::PanelCollision { package, .. }
            | Self::InvalidMenuPath { package, .. }
            | Self::InvalidMenuIcon { package, .. }
            | Self::MenuRejected { package, .. }
            | Self::MessageRejected { package, .. }
            | Self::UnloadHookFailed { package, .. }
            | Self::UncacheFailed { package, .. }
            | Self::TeardownFailed { package, .. } => package,
        }
    }
}
