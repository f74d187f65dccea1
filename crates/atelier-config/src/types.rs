//! Configuration types.
//!
//! Every struct implements [`Default`] so that a bare `[section]` header in
//! TOML produces a working configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration of the editor's package system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package discovery, language and host versions.
    pub packages: PackagesSection,
    /// How packages with `"build": true` are built.
    pub build: BuildSection,
    /// Logging level, format and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// PackagesSection
// ---------------------------------------------------------------------------

/// Package discovery and host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesSection {
    /// Directories scanned to resolve dependency names, in order.
    pub search_paths: Vec<PathBuf>,
    /// Localization language, e.g. `"en"`.
    pub language: String,
    /// Directory holding the packages shipped with the editor.
    pub builtin_dir: Option<PathBuf>,
    /// Host component versions checked against manifest `hosts` ranges.
    pub hosts: BTreeMap<String, String>,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            language: "en".to_owned(),
            builtin_dir: None,
            hosts: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildSection
// ---------------------------------------------------------------------------

/// External build command settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Program and arguments, run inside the package directory.
    pub command: Vec<String>,
    /// Build output directory, relative to the package directory.
    pub output_dir: PathBuf,
    /// Ask the build to minify its output.
    pub minify: bool,
    /// Ask the build to transpile sources.
    pub transpile: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: vec!["npm".to_owned(), "run".to_owned(), "build".to_owned()],
            output_dir: PathBuf::from("bin/dev"),
            minify: false,
            transpile: false,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["atelier_packages=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
