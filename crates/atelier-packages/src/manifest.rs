//! Package manifest (`package.json`) types and loading.
//!
//! A package is a directory containing a `package.json` manifest. Map-valued
//! sections (`hosts`, `pkgDependencies`, `main-menu`, `panels`) keep their
//! declaration order, which decides which host mismatch is reported,
//! dependency load order and which of two colliding panels wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PackageError, PackageResult};

/// Manifest file name inside every package directory.
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// A package manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Unique package name. Primary key of the name index.
    pub name: String,
    /// Semantic version of the package.
    #[serde(default)]
    pub version: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Host component name to required version range, in declaration order.
    #[serde(default, with = "ordered", skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<(String, String)>,
    /// Packages that must be loaded first, in declaration order. The
    /// constraint value is kept but not evaluated.
    #[serde(
        default,
        rename = "pkgDependencies",
        with = "ordered",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub pkg_dependencies: Vec<(String, Value)>,
    /// Whether the package must be built before it can run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub build: bool,
    /// Entry module path, relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Main-menu entries keyed by slash-separated menu path.
    #[serde(
        default,
        rename = "main-menu",
        with = "ordered",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub main_menu: Vec<(String, MenuItemDef)>,
    /// Panel definitions keyed by panel name.
    #[serde(default, with = "ordered", skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<(String, PanelDef)>,
    /// Fields this crate does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Names of the declared dependencies, in declaration order.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.pkg_dependencies.iter().map(|(name, _)| name.as_str())
    }
}

/// A `main-menu` entry as declared in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItemDef {
    /// Label override; defaults to the last segment of the menu path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Icon path, relative to the package output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,
    /// Message sent when the entry is activated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Keyboard accelerator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<String>,
    /// Any further template fields, passed through to the menu service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A panel as declared in the manifest. Missing fields are filled in when
/// the panel is registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelDef {
    /// Panel kind, e.g. `dockable`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Window title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the panel can be popped out into its own window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popable: Option<bool>,
    /// Messages the panel listens to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<String>>,
    /// Directory the panel is served from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Any further fields, passed through to the panel info.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read and parse `<dir>/package.json`.
///
/// # Errors
///
/// Returns [`PackageError::Manifest`] if the file cannot be read, is not
/// valid JSON, or has an empty `name`.
pub async fn read_manifest(dir: &Path) -> PackageResult<PackageManifest> {
    let path = dir.join(MANIFEST_FILE_NAME);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| PackageError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;
    parse_manifest(&path, &content)
}

/// Parse manifest JSON read from `path`.
///
/// # Errors
///
/// Returns [`PackageError::Manifest`] on invalid JSON or an empty `name`.
pub fn parse_manifest(path: &Path, content: &str) -> PackageResult<PackageManifest> {
    let manifest: PackageManifest =
        serde_json::from_str(content).map_err(|e| PackageError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    if manifest.name.trim().is_empty() {
        return Err(PackageError::Manifest {
            path: path.to_path_buf(),
            message: "package name must not be empty".to_string(),
        });
    }
    Ok(manifest)
}

/// Serde adapter for JSON objects that must keep key order.
///
/// `null` deserializes as an empty list.
mod ordered {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};

    #[allow(clippy::ptr_arg)]
    pub(super) fn serialize<S, T>(entries: &Vec<(String, T)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub(super) fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        deserializer.deserialize_any(OrderedVisitor(PhantomData))
    }

    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a JSON object")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, T>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }
}
