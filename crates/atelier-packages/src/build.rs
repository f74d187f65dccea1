//! Package build step and build-output reuse.
//!
//! Packages with `"build": true` run from a build output directory rather
//! than their source directory. An existing `bin/dev` output whose manifest
//! version matches the source manifest is reused without rebuilding.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use atelier_config::BuildSection;

use crate::manifest::{MANIFEST_FILE_NAME, PackageManifest};

/// Default build output directory, relative to the package source.
pub const DEV_OUTPUT_DIR: &str = "bin/dev";

/// Environment variable telling the build command whether to minify.
pub const MINIFY_ENV: &str = "ATELIER_BUILD_MINIFY";

/// Environment variable telling the build command whether to transpile.
pub const TRANSPILE_ENV: &str = "ATELIER_BUILD_TRANSPILE";

/// Options passed to every build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Minify the output.
    pub minify: bool,
    /// Transpile sources for older runtimes.
    pub transpile: bool,
}

/// Errors from building a package.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build command could not be started.
    #[error("failed to run build command `{command}`: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The build command exited unsuccessfully.
    #[error("build command `{command}` failed with {status}: {stderr}")]
    Failed {
        /// The command line.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The build finished but produced no output directory.
    #[error("build produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    /// No build command is configured.
    #[error("no build command configured")]
    NoCommand,

    /// Any other builder-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Produces a runnable output directory from a package source directory.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build the package at `path`, returning the output directory.
    async fn build(&self, path: &Path, options: &BuildOptions) -> Result<PathBuf, BuildError>;
}

/// Return `<source>/<output_dir>` if it holds a build of the same version
/// as the source manifest.
pub async fn cached_output(
    manifest: &PackageManifest,
    source: &Path,
    output_dir: &Path,
) -> Option<PathBuf> {
    let output = source.join(output_dir);
    let content = tokio::fs::read_to_string(output.join(MANIFEST_FILE_NAME))
        .await
        .ok()?;
    let built: serde_json::Value = serde_json::from_str(&content).ok()?;
    let built_version = built.get("version").and_then(serde_json::Value::as_str)?;
    if built_version == manifest.version {
        Some(output)
    } else {
        debug!(
            package = %manifest.name,
            built = built_version,
            source = %manifest.version,
            "Build output is stale"
        );
        None
    }
}

/// Builder that runs an external command inside the package directory.
///
/// The command receives the build options as `ATELIER_BUILD_MINIFY` and
/// `ATELIER_BUILD_TRANSPILE` (`1` or `0`) and must write its output to
/// `<package>/<output_dir>`.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
}

impl ProcessBuilder {
    /// Create a builder for `program` with `args`, writing to `bin/dev`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir: PathBuf::from(DEV_OUTPUT_DIR),
        }
    }

    /// Set the output directory, relative to the package directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Create a builder from the `[build]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoCommand`] if the configured command is empty.
    pub fn from_config(section: &BuildSection) -> Result<Self, BuildError> {
        let (program, args) = section.command.split_first().ok_or(BuildError::NoCommand)?;
        Ok(Self::new(program.clone(), args.to_vec()).with_output_dir(&section.output_dir))
    }

    /// The output directory, relative to the package directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

#[async_trait]
impl Builder for ProcessBuilder {
    async fn build(&self, path: &Path, options: &BuildOptions) -> Result<PathBuf, BuildError> {
        let command = self.command_line();
        info!(path = %path.display(), command = %command, "Running build command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(path)
            .env(MINIFY_ENV, flag(options.minify))
            .env(TRANSPILE_ENV, flag(options.transpile))
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let output_path = path.join(&self.output_dir);
        if !output_path.is_dir() {
            return Err(BuildError::MissingOutput(output_path));
        }
        debug!(output = %output_path.display(), "Build finished");
        Ok(output_path)
    }
}
