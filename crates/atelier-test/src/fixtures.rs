//! Package directories on disk and a ready-made host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tempfile::TempDir;

use atelier_packages::{DEV_OUTPUT_DIR, HostServices, MANIFEST_FILE_NAME, PackageManager};

use crate::mocks::{
    CountingBuilder, RecordingBroadcaster, RecordingLocalization, RecordingMenu,
    RecordingTransport, ScriptedModuleLoader, StubImageDecoder,
};

/// Builder for a package directory with a `package.json` manifest.
///
/// Manifest objects are written with sorted keys, so menus and panels are
/// declared in alphabetical order.
#[derive(Debug, Clone)]
pub struct PackageFixture {
    name: String,
    manifest: Map<String, Value>,
    files: Vec<(PathBuf, String)>,
}

impl PackageFixture {
    /// A package called `name` at version `1.0.0`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut manifest = Map::new();
        manifest.insert("name".to_string(), Value::String(name.clone()));
        manifest.insert("version".to_string(), json!("1.0.0"));
        Self {
            name,
            manifest,
            files: Vec::new(),
        }
    }

    /// Set the manifest version.
    #[must_use]
    pub fn with_version(self, version: &str) -> Self {
        self.with_field("version", json!(version))
    }

    /// Set the entry module, relative to the output directory.
    #[must_use]
    pub fn with_main(self, main: &str) -> Self {
        self.with_field("main", json!(main))
    }

    /// Mark the package as needing a build.
    #[must_use]
    pub fn with_build(self) -> Self {
        self.with_field("build", json!(true))
    }

    /// Require a host component version range.
    #[must_use]
    pub fn with_host(self, host: &str, range: &str) -> Self {
        self.insert_into("hosts", host, json!(range))
    }

    /// Depend on another package by name.
    #[must_use]
    pub fn with_dependency(self, name: &str, range: &str) -> Self {
        self.insert_into("pkgDependencies", name, json!(range))
    }

    /// Declare a main-menu entry.
    #[must_use]
    pub fn with_menu(self, path: &str, item: Value) -> Self {
        self.insert_into("main-menu", path, item)
    }

    /// Declare a panel.
    #[must_use]
    pub fn with_panel(self, name: &str, panel: Value) -> Self {
        self.insert_into("panels", name, panel)
    }

    /// Set any manifest field.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.manifest.insert(key.to_string(), value);
        self
    }

    /// Write a localization file `i18n/<language>.json`.
    #[must_use]
    pub fn with_i18n(self, language: &str, contents: &Value) -> Self {
        self.with_file(format!("i18n/{language}.json"), contents.to_string())
    }

    /// Write an extra file relative to the package directory.
    #[must_use]
    pub fn with_file(mut self, relative: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.push((relative.into(), contents.into()));
        self
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write the package to `<parent>/<name>` and return that directory.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    #[must_use]
    pub fn write(&self, parent: &Path) -> PathBuf {
        let dir = parent.join(&self.name);
        write_file(
            &dir.join(MANIFEST_FILE_NAME),
            &Value::Object(self.manifest.clone()).to_string(),
        );
        for (relative, contents) in &self.files {
            write_file(&dir.join(relative), contents);
        }
        dir
    }

    fn insert_into(mut self, field: &str, key: &str, value: Value) -> Self {
        let entry = self
            .manifest
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value);
        }
        self
    }
}

/// Write a `bin/dev/package.json` claiming `version` into `package_dir`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_build_output(package_dir: &Path, name: &str, version: &str) -> PathBuf {
    let output = package_dir.join(DEV_OUTPUT_DIR);
    write_file(
        &output.join(MANIFEST_FILE_NAME),
        &json!({ "name": name, "version": version }).to_string(),
    );
    output
}

#[allow(clippy::expect_used)]
fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(path, contents).expect("write fixture file");
}

/// Create a fresh temporary directory for package fixtures.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_workspace() -> TempDir {
    tempfile::tempdir().expect("create temp workspace")
}

/// Every mock collaborator, sharing state with the manager it builds.
#[derive(Debug, Clone, Default)]
pub struct TestHost {
    /// Main menu.
    pub menu: RecordingMenu,
    /// Localization table.
    pub localization: RecordingLocalization,
    /// Message transport.
    pub transport: RecordingTransport,
    /// Window broadcaster.
    pub broadcaster: RecordingBroadcaster,
    /// Image decoder.
    pub images: StubImageDecoder,
    /// Package builder.
    pub builder: CountingBuilder,
    /// Module loader.
    pub loader: ScriptedModuleLoader,
}

impl TestHost {
    /// A host with default mocks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The host services backed by these mocks.
    #[must_use]
    pub fn services(&self) -> HostServices {
        HostServices {
            menu: Arc::new(self.menu.clone()),
            localization: Arc::new(self.localization.clone()),
            transport: Arc::new(self.transport.clone()),
            broadcaster: Arc::new(self.broadcaster.clone()),
            images: Arc::new(self.images.clone()),
        }
    }

    /// A package manager wired to these mocks.
    #[must_use]
    pub fn manager(&self) -> PackageManager {
        PackageManager::new(
            self.services(),
            Arc::new(self.builder.clone()),
            Arc::new(self.loader.clone()),
        )
    }
}
