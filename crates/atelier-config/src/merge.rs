//! Deep merge of TOML values across configuration layers.
//!
//! The merge operates on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key absent from an overlay never overrides the base layer.

use std::collections::HashMap;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.atelier/config.toml`).
    User,
    /// Workspace-level configuration (`{workspace}/.atelier/config.toml`).
    Workspace,
    /// Environment variable fallback.
    Environment,
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.atelier/config.toml)"),
            Self::Workspace => write!(f, "workspace (.atelier/config.toml)"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each field's value, keyed by dotted path.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge per key; scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    } else {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer.clone());
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Record every leaf path under `val` as coming from `layer`.
pub fn record_leaves(val: &toml::Value, prefix: &str, layer: &ConfigLayer, sources: &mut FieldSources) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

/// Set the value at a dotted path, creating intermediate tables.
pub(crate) fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let toml::Value::Table(table) = current else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_tables_merge_and_scalars_replace() {
        let mut base = parse(
            r#"
            [packages]
            language = "en"
            search_paths = ["/a"]
            [build]
            minify = false
            "#,
        );
        let overlay = parse(
            r#"
            [packages]
            search_paths = ["/b"]
            "#,
        );
        let mut sources = FieldSources::new();
        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(base["packages"]["language"].as_str(), Some("en"));
        let paths = base["packages"]["search_paths"].as_array().unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].as_str(), Some("/b"));
        assert_eq!(base["build"]["minify"].as_bool(), Some(false));
        assert_eq!(sources.get("packages.search_paths"), Some(&ConfigLayer::User));
        assert!(sources.get("packages.language").is_none());
    }

    #[test]
    fn test_new_tables_record_all_leaves() {
        let mut base = parse("[packages]\nlanguage = \"en\"");
        let overlay = parse("[packages.hosts]\natelier = \"1.0.0\"");
        let mut sources = FieldSources::new();
        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::Workspace, &mut sources);
        assert_eq!(
            sources.get("packages.hosts.atelier"),
            Some(&ConfigLayer::Workspace)
        );
    }

    #[test]
    fn test_set_path_creates_tables() {
        let mut root = parse("");
        set_path(&mut root, "packages.language", toml::Value::from("de"));
        assert_eq!(root["packages"]["language"].as_str(), Some("de"));
    }
}
