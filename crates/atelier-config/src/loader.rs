//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` -> base
//! 2. Merge `~/.atelier/config.toml` (user)
//! 3. Merge `{workspace}/.atelier/config.toml` (workspace)
//! 4. Apply env var fallbacks for fields no file set
//! 5. Deserialize the merged tree -> `Config`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Name of the per-user and per-workspace config directory.
pub const CONFIG_DIR: &str = ".atelier";

/// Name of the config file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// A loaded configuration together with where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Layer that set each leaf field.
    pub field_sources: FieldSources,
    /// Config files that were found and merged, in merge order.
    pub loaded_files: Vec<PathBuf>,
}

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the root of the open project; if `None` the
/// workspace layer is skipped. `home_override` names the directory to use
/// in place of `~/.atelier`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let user_path = match home_override {
        Some(dir) => dir.join(CONFIG_FILE),
        None => home_directory()?.join(CONFIG_DIR).join(CONFIG_FILE),
    };
    let workspace_path = workspace_root.map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE));
    load_layers(Some(&user_path), workspace_path.as_deref(), &collect_env_vars())
}

/// Merge defaults, the given files and env fallbacks, then validate.
pub(crate) fn load_layers(
    user_path: Option<&Path>,
    workspace_path: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let layers = [
        (user_path, ConfigLayer::User),
        (workspace_path, ConfigLayer::Workspace),
    ];
    for (path, layer) in layers {
        let Some(path) = path else {
            continue;
        };
        if let Some(overlay) = try_load_file(path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            loaded_files.push(path.to_path_buf());
            info!(path = %path.display(), layer = %layer, "Loaded config");
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "Applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read_limited(path)?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match read_limited(path) {
        Ok(content) => content,
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "Config file not found, skipping");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

/// Read a file, rejecting anything over [`MAX_CONFIG_FILE_SIZE`].
///
/// The size is checked after a single read to avoid a stat/read race.
fn read_limited(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }
    Ok(content)
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config.packages.language, "en");
        assert_eq!(config.build.output_dir, PathBuf::from("bin/dev"));
        assert_eq!(config.build.command, vec!["npm", "run", "build"]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_without_files() {
        let resolved = load_layers(None, None, &HashMap::new()).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("packages.language"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_workspace_overrides_user() {
        let user = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let user_path = write(
            user.path(),
            "[packages]\nlanguage = \"de\"\nsearch_paths = [\"/user/pkgs\"]\n",
        );
        let workspace_path = write(workspace.path(), "[packages]\nlanguage = \"fr\"\n");

        let resolved =
            load_layers(Some(&user_path), Some(&workspace_path), &HashMap::new()).unwrap();
        assert_eq!(resolved.config.packages.language, "fr");
        assert_eq!(
            resolved.config.packages.search_paths,
            vec![PathBuf::from("/user/pkgs")]
        );
        assert_eq!(resolved.loaded_files, vec![user_path, workspace_path]);
        assert_eq!(
            resolved.field_sources.get("packages.language"),
            Some(&ConfigLayer::Workspace)
        );
    }

    #[test]
    fn test_env_is_fallback_only() {
        let user = tempfile::tempdir().unwrap();
        let user_path = write(user.path(), "[logging]\nlevel = \"warn\"\n");
        let env: HashMap<String, String> = [
            ("ATELIER_LOG".to_owned(), "trace".to_owned()),
            ("ATELIER_LANG".to_owned(), "ja".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_layers(Some(&user_path), None, &env).unwrap();
        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(resolved.config.packages.language, "ja");
    }

    #[test]
    fn test_host_versions_from_file() {
        let user = tempfile::tempdir().unwrap();
        let user_path = write(user.path(), "[packages.hosts]\natelier = \"1.4.0\"\n");
        let resolved = load_layers(Some(&user_path), None, &HashMap::new()).unwrap();
        assert_eq!(
            resolved.config.packages.hosts.get("atelier").map(String::as_str),
            Some("1.4.0")
        );
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let user = tempfile::tempdir().unwrap();
        let user_path = write(user.path(), "[logging]\nformat = \"xml\"\n");
        let result = load_layers(Some(&user_path), None, &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let user = tempfile::tempdir().unwrap();
        let user_path = write(user.path(), "[packages\n");
        let result = load_layers(Some(&user_path), None, &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let padding = "#".repeat(1_048_600);
        let path = write(dir.path(), &padding);
        assert!(matches!(
            load_file(&path),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_try_load_file_missing() {
        let result = try_load_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_with_home_override() {
        let home = tempfile::tempdir().unwrap();
        write(home.path(), "[build]\nminify = true\n");
        let resolved = load(None, Some(home.path())).unwrap();
        assert!(resolved.config.build.minify);
    }
}
