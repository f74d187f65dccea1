//! The package lifecycle engine.
//!
//! [`PackageManager`] loads a package directory by reading its manifest,
//! checking host compatibility, loading dependencies, resolving the build
//! output, then registering localization, messages, menus and panels with
//! the host before running the entry module's `load` hook. Unload reverses
//! each registration independently; reload is rebuild + unload + load.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use atelier_config::Config;

use crate::build::{self, BuildError, BuildOptions, Builder, DEV_OUTPUT_DIR};
use crate::dispatcher::MessageDispatcher;
use crate::error::{PackageError, PackageResult, PackageWarning};
use crate::graph::ModuleGraph;
use crate::host::{HostServices, MessageHandler, split_menu_path};
use crate::manifest::{PackageManifest, read_manifest};
use crate::module::{ModuleLoader, PackageModule, message_name};
use crate::panel::{PanelInfo, panel_id};
use crate::registry::Registry;
use crate::report::{LoadReport, UnloadReport};
use crate::table::LoadedPackage;

/// Broadcast after a package finished loading. Payload: the package name.
pub const PACKAGE_LOADED: &str = "package:loaded";

/// Broadcast after a package was unloaded. Payload: the package name.
pub const PACKAGE_UNLOADED: &str = "package:unloaded";

/// Directory of localization files inside a package output directory.
pub const I18N_DIR: &str = "i18n";

/// Language used until one is configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Options for [`PackageManager::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Rebuild even if a matching build output exists.
    pub build: bool,
}

/// Options for [`PackageManager::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOptions {
    /// Rebuild packages that declare `build` before reloading.
    pub rebuild: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self { rebuild: true }
    }
}

/// One reversible registration of a loaded package.
#[derive(Debug)]
enum Teardown {
    Localization,
    Panel(String),
    Menu(String),
    Messages,
    Module { entry: PathBuf, root: PathBuf },
    TableEntry,
}

/// Loads, unloads and reloads packages against a set of host services.
pub struct PackageManager {
    registry: Registry,
    modules: ModuleGraph,
    host: HostServices,
    builder: Arc<dyn Builder>,
    loader: Arc<dyn ModuleLoader>,
    language: String,
    build_options: BuildOptions,
    output_dir: PathBuf,
    builtin_dir: Option<PathBuf>,
}

impl PackageManager {
    /// Create a manager with empty tables.
    #[must_use]
    pub fn new(host: HostServices, builder: Arc<dyn Builder>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            registry: Registry::new(),
            modules: ModuleGraph::new(),
            host,
            builder,
            loader,
            language: DEFAULT_LANGUAGE.to_string(),
            build_options: BuildOptions::default(),
            output_dir: PathBuf::from(DEV_OUTPUT_DIR),
            builtin_dir: None,
        }
    }

    /// Set the options passed to every build.
    #[must_use]
    pub fn with_build_options(mut self, options: BuildOptions) -> Self {
        self.build_options = options;
        self
    }

    /// Set the build output directory checked for reusable builds.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the directory whose packages are reported as builtin.
    #[must_use]
    pub fn with_builtin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.builtin_dir = Some(dir.into());
        self
    }

    /// Apply the `[packages]` and `[build]` configuration sections.
    ///
    /// Search paths and host versions are added to the existing ones.
    pub fn apply_config(&mut self, config: &Config) {
        let packages = &config.packages;
        self.add_search_paths(packages.search_paths.iter().cloned());
        for (host, version) in &packages.hosts {
            self.registry.versions_mut().set(host, version);
        }
        self.language.clone_from(&packages.language);
        self.builtin_dir.clone_from(&packages.builtin_dir);
        self.output_dir.clone_from(&config.build.output_dir);
        self.build_options = BuildOptions {
            minify: config.build.minify,
            transpile: config.build.transpile,
        };
        debug!(
            language = %self.language,
            search_paths = self.registry.search_paths().paths().len(),
            "Applied package configuration"
        );
    }

    // -----------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------

    /// Load the package in directory `path`, loading its dependencies first.
    ///
    /// Loading an already-loaded path is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`PackageError`]; registrations made before a
    /// failing `load` hook are rolled back.
    pub fn load<'a>(
        &'a mut self,
        path: &'a Path,
        options: LoadOptions,
    ) -> BoxFuture<'a, PackageResult<LoadReport>> {
        self.load_below(path, options, &[])
    }

    /// Load `path` as a dependency of the packages in `ancestors`, outermost
    /// first.
    fn load_below<'a>(
        &'a mut self,
        path: &'a Path,
        options: LoadOptions,
        ancestors: &'a [PathBuf],
    ) -> BoxFuture<'a, PackageResult<LoadReport>> {
        Box::pin(async move {
            if let Some(package) = self.registry.packages().get(path) {
                debug!(package = %package.name(), path = %path.display(), "Package already loaded");
                return Ok(LoadReport::already_loaded(path, package.name()));
            }
            if ancestors.iter().any(|ancestor| ancestor == path) {
                return Err(PackageError::DependencyCycle {
                    path: path.to_path_buf(),
                });
            }

            let result = self.load_uncached(path, options, ancestors).await;
            if let Err(e) = &result {
                error!(path = %path.display(), error = %e, "Failed to load package");
            }
            result
        })
    }

    async fn load_uncached(
        &mut self,
        path: &Path,
        options: LoadOptions,
        ancestors: &[PathBuf],
    ) -> PackageResult<LoadReport> {
        let manifest = read_manifest(path).await?;
        let name = manifest.name.clone();
        debug!(package = %name, path = %path.display(), "Loading package");

        self.registry
            .versions()
            .check_manifest(&manifest)
            .map_err(|mismatch| PackageError::HostIncompatible {
                package: name.clone(),
                mismatch,
            })?;

        let mut chain = ancestors.to_vec();
        chain.push(path.to_path_buf());
        let mut warnings = Vec::new();
        for dependency in manifest.dependency_names() {
            let dependency_path = self.registry.search_paths().find(dependency).ok_or_else(|| {
                PackageError::DependencyNotFound {
                    package: name.clone(),
                    dependency: dependency.to_string(),
                }
            })?;
            debug!(package = %name, dependency, "Loading dependency");
            let report = self
                .load_below(&dependency_path, LoadOptions::default(), &chain)
                .await?;
            warnings.extend(report.warnings);
        }

        let output = self
            .resolve_output(&manifest, path, options.build)
            .await
            .map_err(|source| PackageError::BuildFailed {
                package: name.clone(),
                source,
            })?;

        self.register(manifest, path, output, warnings).await
    }

    async fn resolve_output(
        &self,
        manifest: &PackageManifest,
        source: &Path,
        force: bool,
    ) -> Result<PathBuf, BuildError> {
        if !manifest.build {
            return Ok(source.to_path_buf());
        }
        if !force
            && let Some(cached) = build::cached_output(manifest, source, &self.output_dir).await
        {
            debug!(package = %manifest.name, output = %cached.display(), "Reusing build output");
            return Ok(cached);
        }
        info!(package = %manifest.name, "Building package");
        self.build(source).await
    }

    /// Register a package whose output directory is resolved, then run its
    /// `load` hook.
    async fn register(
        &mut self,
        manifest: PackageManifest,
        source: &Path,
        output: PathBuf,
        mut warnings: Vec<PackageWarning>,
    ) -> PackageResult<LoadReport> {
        let name = manifest.name.clone();
        let mut undo = Vec::new();

        if self.load_localization(&name, &output).await? {
            undo.push(Teardown::Localization);
        }

        let module = match &manifest.main {
            Some(main) => {
                let entry = output.join(main);
                let exports = self
                    .modules
                    .require(&entry, self.loader.as_ref())
                    .await
                    .map_err(|source| PackageError::MainLoad {
                        package: name.clone(),
                        main: main.clone(),
                        source,
                    })?;
                undo.push(Teardown::Module {
                    entry: entry.clone(),
                    root: output.clone(),
                });
                Some((entry, exports))
            },
            None => None,
        };

        let mut messages = MessageDispatcher::new(Arc::clone(&self.host.transport));
        if let Some((_, exports)) = &module {
            for message in exports.messages() {
                let full_name = message_name(&name, &message);
                if let Err(e) = messages.on(&full_name, bind_handler(exports, message)) {
                    record(
                        &mut warnings,
                        PackageWarning::MessageRejected {
                            package: name.clone(),
                            message: full_name,
                            reason: e.to_string(),
                        },
                    );
                }
            }
            undo.push(Teardown::Messages);
        }

        let mut menu_paths = Vec::new();
        for (menu_path, item) in &manifest.main_menu {
            let localized = self.host.localization.format_path(menu_path);
            let Some((parent, label)) = split_menu_path(&localized) else {
                record(
                    &mut warnings,
                    PackageWarning::InvalidMenuPath {
                        package: name.clone(),
                        path: localized.clone(),
                    },
                );
                continue;
            };

            let icon = match &item.icon {
                Some(icon) => match self.host.images.from_path(&output.join(icon)) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        record(
                            &mut warnings,
                            PackageWarning::InvalidMenuIcon {
                                package: name.clone(),
                                path: localized.clone(),
                                message: e.to_string(),
                            },
                        );
                        None
                    },
                },
                None => None,
            };

            match self.host.menu.add(parent, item.template(label, icon)) {
                Ok(()) => {
                    debug!(package = %name, menu = %localized, "Added menu entry");
                    menu_paths.push(localized.clone());
                    undo.push(Teardown::Menu(localized));
                },
                Err(e) => record(
                    &mut warnings,
                    PackageWarning::MenuRejected {
                        package: name.clone(),
                        path: localized.clone(),
                        message: e.to_string(),
                    },
                ),
            }
        }

        let mut panel_ids = Vec::new();
        for (panel, def) in &manifest.panels {
            let id = panel_id(&name, panel);
            if self
                .registry
                .panels_mut()
                .try_insert(id.clone(), def.resolve(&id, &output))
            {
                debug!(package = %name, panel = %id, "Registered panel");
                panel_ids.push(id.clone());
                undo.push(Teardown::Panel(id));
            } else {
                record(
                    &mut warnings,
                    PackageWarning::PanelCollision {
                        package: name.clone(),
                        id,
                    },
                );
            }
        }

        let (entry, exports) = module.unzip();
        let package = LoadedPackage::new(
            manifest,
            source.to_path_buf(),
            output,
            entry,
            messages,
            panel_ids,
            menu_paths,
        );
        self.registry.packages_mut().insert(package);
        undo.push(Teardown::TableEntry);

        if let Some(exports) = exports
            && let Err(e) = exports.load().await
        {
            warn!(package = %name, error = %e, "Load hook failed, rolling back");
            let mut rollback_warnings = Vec::new();
            for step in undo.into_iter().rev() {
                self.teardown(&name, source, step, &mut rollback_warnings).await;
            }
            self.host
                .broadcaster
                .notify_all_windows(PACKAGE_UNLOADED, Value::String(name.clone()))
                .await;
            return Err(PackageError::LoadHook {
                package: name,
                message: e.to_string(),
            });
        }

        info!(package = %name, path = %source.display(), "Package loaded");
        self.host
            .broadcaster
            .notify_all_windows(PACKAGE_LOADED, Value::String(name.clone()))
            .await;
        Ok(LoadReport::loaded(source, name, warnings))
    }

    /// Extend the host localization table from `<output>/i18n/<lang>.json`.
    ///
    /// Returns whether a localization file was found.
    async fn load_localization(&self, name: &str, output: &Path) -> PackageResult<bool> {
        let path = output
            .join(I18N_DIR)
            .join(format!("{}.json", self.language));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(PackageError::I18nLoad {
                    path,
                    message: e.to_string(),
                });
            },
        };
        let contents: Value =
            serde_json::from_str(&content).map_err(|e| PackageError::I18nLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut fragment = Map::new();
        fragment.insert(name.to_string(), contents);
        self.host.localization.extend(fragment);
        debug!(package = %name, language = %self.language, "Loaded localization");
        Ok(true)
    }

    // -----------------------------------------------------------------
    // Unload / reload
    // -----------------------------------------------------------------

    /// Unload the package loaded from `path`.
    ///
    /// Every teardown step runs even if an earlier one fails; failures are
    /// returned as warnings. Unloading a path that is not loaded does
    /// nothing.
    pub async fn unload(&mut self, path: &Path) -> UnloadReport {
        let Some(package) = self.registry.packages().get(path) else {
            debug!(path = %path.display(), "Package not loaded, nothing to unload");
            return UnloadReport::not_loaded(path);
        };

        let name = package.name().to_string();
        let mut steps = vec![Teardown::Localization];
        steps.extend(package.panel_ids().iter().cloned().map(Teardown::Panel));
        steps.extend(package.menu_paths().iter().cloned().map(Teardown::Menu));
        steps.push(Teardown::Messages);
        if let Some(entry) = package.main_module() {
            steps.push(Teardown::Module {
                entry: entry.to_path_buf(),
                root: package.output_path().to_path_buf(),
            });
        }
        steps.push(Teardown::TableEntry);

        let mut warnings = Vec::new();
        for step in steps {
            self.teardown(&name, path, step, &mut warnings).await;
        }

        info!(package = %name, path = %path.display(), "Package unloaded");
        self.host
            .broadcaster
            .notify_all_windows(PACKAGE_UNLOADED, Value::String(name.clone()))
            .await;
        UnloadReport {
            path: path.to_path_buf(),
            name: Some(name),
            warnings,
        }
    }

    /// Unload every loaded package.
    pub async fn unload_all(&mut self) -> Vec<UnloadReport> {
        let paths: Vec<PathBuf> = self
            .registry
            .packages()
            .iter()
            .map(|package| package.source_path().to_path_buf())
            .collect();
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.unload(&path).await);
        }
        reports
    }

    /// Reload the package loaded from `path`: rebuild it if requested and
    /// it declares `build`, unload it, then load it again.
    ///
    /// Returns `Ok(None)` if nothing is loaded at `path`. A failed final
    /// load leaves the package unloaded.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::BuildFailed`] if the rebuild fails (the
    /// package stays loaded), or the error of the final load.
    pub async fn reload(
        &mut self,
        path: &Path,
        options: ReloadOptions,
    ) -> PackageResult<Option<LoadReport>> {
        let Some(package) = self.registry.packages().get(path) else {
            debug!(path = %path.display(), "Package not loaded, nothing to reload");
            return Ok(None);
        };
        let name = package.name().to_string();

        if options.rebuild && package.manifest().build {
            info!(package = %name, "Rebuilding package");
            self.build(path)
                .await
                .map_err(|source| PackageError::BuildFailed {
                    package: name.clone(),
                    source,
                })?;
        }

        self.unload(path).await;
        let report = self.load(path, LoadOptions::default()).await?;
        info!(package = %name, "Package reloaded");
        Ok(Some(report))
    }

    /// Build the package at `path` with the configured builder and options.
    ///
    /// # Errors
    ///
    /// Returns the builder's error unchanged.
    pub async fn build(&self, path: &Path) -> Result<PathBuf, BuildError> {
        match self.builder.build(path, &self.build_options).await {
            Ok(output) => Ok(output),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to build package");
                Err(e)
            },
        }
    }

    async fn teardown(
        &mut self,
        name: &str,
        source: &Path,
        step: Teardown,
        warnings: &mut Vec<PackageWarning>,
    ) {
        match step {
            Teardown::Localization => self.host.localization.unset(&[name.to_string()]),
            Teardown::Panel(id) => {
                self.registry.panels_mut().remove(&id);
            },
            Teardown::Menu(path) => {
                if let Err(e) = self.host.menu.remove(&path) {
                    record(
                        warnings,
                        PackageWarning::TeardownFailed {
                            package: name.to_string(),
                            target: format!("menu '{path}'"),
                            message: e.to_string(),
                        },
                    );
                }
            },
            Teardown::Messages => {
                if let Some(package) = self.registry.packages_mut().get_mut(source) {
                    let count = package.messages.clear();
                    debug!(package = %name, count, "Cleared message subscriptions");
                }
            },
            Teardown::Module { entry, root } => {
                self.release_module(name, &entry, &root, warnings).await;
            },
            Teardown::TableEntry => {
                self.registry.packages_mut().remove(source);
            },
        }
    }

    /// Run the entry module's `unload` hook and evict it with everything it
    /// required from inside `root`.
    async fn release_module(
        &mut self,
        name: &str,
        entry: &Path,
        root: &Path,
        warnings: &mut Vec<PackageWarning>,
    ) {
        let Some(exports) = self.modules.get(entry) else {
            record(
                warnings,
                PackageWarning::UncacheFailed {
                    package: name.to_string(),
                    module: entry.to_path_buf(),
                },
            );
            return;
        };
        if let Err(e) = exports.unload().await {
            record(
                warnings,
                PackageWarning::UnloadHookFailed {
                    package: name.to_string(),
                    message: e.to_string(),
                },
            );
        }
        self.modules.evict_under(entry, root);
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// The manager's tables.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The module cache.
    #[must_use]
    pub fn modules(&self) -> &ModuleGraph {
        &self.modules
    }

    /// Iterate over loaded packages.
    pub fn packages(&self) -> impl Iterator<Item = &LoadedPackage> {
        self.registry.packages().iter()
    }

    /// Whether a package is loaded from `path`.
    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.registry.packages().contains(path)
    }

    /// Source path of the loaded package called `name`.
    #[must_use]
    pub fn find_package_path_by_name(&self, name: &str) -> Option<&Path> {
        self.registry.packages().path_by_name(name)
    }

    /// Alias of [`find_package_path_by_name`](Self::find_package_path_by_name).
    #[must_use]
    pub fn package_path(&self, name: &str) -> Option<&Path> {
        self.find_package_path_by_name(name)
    }

    /// The loaded package whose source directory contains `path`.
    #[must_use]
    pub fn find_package_info_containing_path(&self, path: &Path) -> Option<&LoadedPackage> {
        self.registry.packages().containing(path)
    }

    /// The package loaded from exactly `path`.
    #[must_use]
    pub fn package_info(&self, path: &Path) -> Option<&LoadedPackage> {
        self.registry.packages().get(path)
    }

    /// A registered panel by `package.panel` identifier.
    #[must_use]
    pub fn panel_info(&self, id: &str) -> Option<&PanelInfo> {
        self.registry.panels().get(id)
    }

    /// Whether `path` lies under the configured builtin directory.
    #[must_use]
    pub fn is_builtin(&self, path: &Path) -> bool {
        self.builtin_dir
            .as_deref()
            .is_some_and(|dir| path.starts_with(dir))
    }

    // -----------------------------------------------------------------
    // Search paths and host settings
    // -----------------------------------------------------------------

    /// Append package search directories, skipping duplicates.
    pub fn add_search_paths<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.registry.search_paths_mut().add(paths)
    }

    /// Remove a search directory. Returns whether it was registered.
    pub fn remove_search_path(&mut self, path: &Path) -> bool {
        self.registry.search_paths_mut().remove(path)
    }

    /// Remove every search directory.
    pub fn reset_search_paths(&mut self) {
        self.registry.search_paths_mut().reset();
    }

    /// Registered search directories in search order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        self.registry.search_paths().paths()
    }

    /// Resolve a package name through the search directories.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.registry.search_paths().find(name)
    }

    /// Active localization language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Change the localization language used by subsequent loads.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    /// Set the version of one host component.
    pub fn set_host_version(&mut self, host: impl Into<String>, version: impl Into<String>) {
        self.registry.versions_mut().set(host, version);
    }

    /// Replace every host component version.
    pub fn set_host_versions<I, K, V>(&mut self, versions: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.registry.versions_mut().replace(versions);
    }
}

impl std::fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("registry", &self.registry)
            .field("modules", &self.modules)
            .field("language", &self.language)
            .field("build_options", &self.build_options)
            .field("output_dir", &self.output_dir)
            .field("builtin_dir", &self.builtin_dir)
            .finish_non_exhaustive()
    }
}

/// Bind a module's message handler for one message name.
fn bind_handler(exports: &Arc<dyn PackageModule>, message: String) -> MessageHandler {
    let exports = Arc::clone(exports);
    Arc::new(move |payload| exports.on_message(&message, payload))
}

fn record(warnings: &mut Vec<PackageWarning>, warning: PackageWarning) {
    warn!(package = %warning.package(), warning = %warning, "Package warning");
    warnings.push(warning);
}
