//! Environment variable fallbacks.
//!
//! Environment variables only fill fields that no config file set. They
//! never override a value from `~/.atelier/config.toml` or the workspace.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources, set_path};

/// Prefix of every environment variable this crate reads.
pub const ENV_PREFIX: &str = "ATELIER_";

/// How an environment variable's value is converted.
#[derive(Clone, Copy)]
enum EnvKind {
    String,
    PathList,
}

/// Environment variable -> dotted config path.
const ENV_FALLBACKS: &[(&str, &str, EnvKind)] = &[
    ("ATELIER_LANG", "packages.language", EnvKind::String),
    ("ATELIER_LOG", "logging.level", EnvKind::String),
    ("ATELIER_PACKAGE_PATH", "packages.search_paths", EnvKind::PathList),
];

/// Collect every `ATELIER_*` environment variable.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply environment fallbacks to fields still at their default value.
///
/// Returns how many fields were set.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied: usize = 0;
    for (var, path, kind) in ENV_FALLBACKS {
        let Some(raw) = env_vars.get(*var).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };
        let set_by_file = sources
            .get(*path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            debug!(var, field = path, "Config file value takes precedence over env var");
            continue;
        }

        let value = match kind {
            EnvKind::String => toml::Value::String(raw.to_owned()),
            EnvKind::PathList => toml::Value::Array(
                std::env::split_paths(raw)
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| toml::Value::String(p.display().to_string()))
                    .collect(),
            ),
        };
        set_path(merged, path, value);
        sources.insert((*path).to_owned(), ConfigLayer::Environment);
        applied = applied.saturating_add(1);
    }
    applied
}
