//! Requests the package manager answers for host windows.
//!
//! | message               | payload            | answer                   |
//! |-----------------------|--------------------|--------------------------|
//! | `package:query-infos` | none               | every loaded package     |
//! | `package:query-info`  | `{"name": "..."}`  | one package by name      |
//! | `package:reload`      | `{"name": "..."}`  | accepted, reload queued  |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::manager::{PackageManager, ReloadOptions};
use crate::manifest::PackageManifest;

/// Wire name of [`PackageRequest::QueryInfos`].
pub const QUERY_INFOS: &str = "package:query-infos";
/// Wire name of [`PackageRequest::QueryInfo`].
pub const QUERY_INFO: &str = "package:query-info";
/// Wire name of [`PackageRequest::Reload`].
pub const RELOAD: &str = "package:reload";

/// A request addressed to the package manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request")]
pub enum PackageRequest {
    /// Describe every loaded package.
    #[serde(rename = "package:query-infos")]
    QueryInfos,
    /// Describe one package by name.
    #[serde(rename = "package:query-info")]
    QueryInfo {
        /// Package name.
        name: String,
    },
    /// Reload a package by name.
    #[serde(rename = "package:reload")]
    Reload {
        /// Package name.
        name: String,
    },
}

#[derive(Deserialize)]
struct NamePayload {
    name: String,
}

impl PackageRequest {
    /// The wire name of this request.
    #[must_use]
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::QueryInfos => QUERY_INFOS,
            Self::QueryInfo { .. } => QUERY_INFO,
            Self::Reload { .. } => RELOAD,
        }
    }

    /// Decode a request from its wire name and payload.
    ///
    /// The payload of the named requests is either `{"name": ...}` or a
    /// bare string. Returns `None` for unknown messages or bad payloads.
    #[must_use]
    pub fn from_message(message: &str, payload: &Value) -> Option<Self> {
        let name = || match payload {
            Value::String(name) => Some(name.clone()),
            other => serde_json::from_value::<NamePayload>(other.clone())
                .ok()
                .map(|p| p.name),
        };
        match message {
            QUERY_INFOS => Some(Self::QueryInfos),
            QUERY_INFO => name().map(|name| Self::QueryInfo { name }),
            RELOAD => name().map(|name| Self::Reload { name }),
            _ => None,
        }
    }
}

/// How a package appears to host windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Source directory; empty if the package is unknown.
    pub path: PathBuf,
    /// Whether the package ships with the application.
    pub builtin: bool,
    /// Always true: every loaded package is enabled.
    pub enabled: bool,
    /// The manifest, if the package is loaded.
    pub info: Option<PackageManifest>,
}

/// Answer to a [`PackageRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PackageResponse {
    /// Answer to [`PackageRequest::QueryInfos`].
    Infos(Vec<PackageDescriptor>),
    /// Answer to [`PackageRequest::QueryInfo`].
    Info(PackageDescriptor),
    /// Answer to [`PackageRequest::Reload`]; the outcome is only logged.
    Accepted,
}

impl PackageManager {
    /// Describe every loaded package, ordered by path.
    #[must_use]
    pub fn query_infos(&self) -> Vec<PackageDescriptor> {
        let mut infos: Vec<PackageDescriptor> = self
            .packages()
            .map(|package| PackageDescriptor {
                path: package.source_path().to_path_buf(),
                builtin: self.is_builtin(package.source_path()),
                enabled: true,
                info: Some(package.manifest().clone()),
            })
            .collect();
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        infos
    }

    /// Describe one package by name. Unknown names yield an empty path and
    /// no info.
    #[must_use]
    pub fn query_info(&self, name: &str) -> PackageDescriptor {
        let package = self
            .find_package_path_by_name(name)
            .and_then(|path| self.package_info(path));
        let path = package
            .map(|package| package.source_path().to_path_buf())
            .unwrap_or_default();
        PackageDescriptor {
            builtin: package.is_some() && self.is_builtin(&path),
            enabled: true,
            info: package.map(|package| package.manifest().clone()),
            path,
        }
    }

    /// Answer a request from a host window.
    ///
    /// Reload failures are logged, not returned.
    pub async fn handle_request(&mut self, request: PackageRequest) -> PackageResponse {
        match request {
            PackageRequest::QueryInfos => PackageResponse::Infos(self.query_infos()),
            PackageRequest::QueryInfo { name } => PackageResponse::Info(self.query_info(&name)),
            PackageRequest::Reload { name } => {
                let Some(path) = self.find_package_path_by_name(&name).map(PathBuf::from) else {
                    error!(package = %name, "Failed to reload package, not found");
                    return PackageResponse::Accepted;
                };
                if let Err(e) = self.reload(&path, ReloadOptions::default()).await {
                    warn!(package = %name, error = %e, "Reload request failed");
                }
                PackageResponse::Accepted
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_message_decodes_payloads() {
        assert_eq!(
            PackageRequest::from_message(QUERY_INFOS, &Value::Null),
            Some(PackageRequest::QueryInfos)
        );
        assert_eq!(
            PackageRequest::from_message(QUERY_INFO, &json!({"name": "foo"})),
            Some(PackageRequest::QueryInfo { name: "foo".into() })
        );
        assert_eq!(
            PackageRequest::from_message(RELOAD, &json!("foo")),
            Some(PackageRequest::Reload { name: "foo".into() })
        );
        assert_eq!(PackageRequest::from_message(RELOAD, &json!(42)), None);
        assert_eq!(PackageRequest::from_message("package:other", &Value::Null), None);
    }

    #[test]
    fn test_request_wire_names() {
        let request = PackageRequest::Reload { name: "foo".into() };
        assert_eq!(request.message_name(), RELOAD);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({"request": "package:reload", "name": "foo"}));
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = PackageDescriptor {
            path: PathBuf::from("/pkgs/foo"),
            builtin: false,
            enabled: true,
            info: None,
        };
        let json = serde_json::to_value(PackageResponse::Info(descriptor)).unwrap();
        assert_eq!(json["path"], "/pkgs/foo");
        assert_eq!(json["enabled"], true);
        assert!(json["info"].is_null());
        assert_eq!(serde_json::to_value(PackageResponse::Accepted).unwrap(), Value::Null);
    }
}
