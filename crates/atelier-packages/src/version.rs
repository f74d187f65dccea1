//! Host component versions and manifest `hosts` compatibility checks.
//!
//! Ranges use the npm dialect found in package manifests: comparators are
//! separated by spaces (`>=1.0.0 <2.0.0`), alternatives by `||`, and
//! `a - b` is an inclusive hyphen range. They are normalized to the
//! comma-separated form of the `semver` crate before evaluation.

use std::collections::HashMap;

use semver::{Version, VersionReq};

use crate::manifest::PackageManifest;

/// Why a manifest's host constraint is not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostMismatch {
    /// The host component is not known to this application.
    #[error("host '{0}' does not exist")]
    Missing(String),

    /// The host version does not satisfy the required range.
    #[error("host '{host}' is at {found}, but {required} is required")]
    Unsatisfied {
        /// Host component name.
        host: String,
        /// Required range from the manifest.
        required: String,
        /// Version the host reports.
        found: String,
    },

    /// The recorded host version is not valid semver.
    #[error("host '{host}' reports invalid version '{version}'")]
    InvalidVersion {
        /// Host component name.
        host: String,
        /// The unparseable version.
        version: String,
    },

    /// The manifest's range could not be parsed.
    #[error("invalid version range '{range}' for host '{host}'")]
    InvalidRange {
        /// Host component name.
        host: String,
        /// The unparseable range.
        range: String,
    },
}

/// Versions of the host application's components, e.g. `{"atelier": "1.2.0"}`.
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    versions: HashMap<String, String>,
}

impl VersionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version of one host component.
    pub fn set(&mut self, host: impl Into<String>, version: impl Into<String>) {
        self.versions.insert(host.into(), version.into());
    }

    /// Replace every recorded version.
    pub fn replace<I, K, V>(&mut self, versions: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.versions = versions
            .into_iter()
            .map(|(host, version)| (host.into(), version.into()))
            .collect();
    }

    /// Version of a host component, if known.
    #[must_use]
    pub fn get(&self, host: &str) -> Option<&str> {
        self.versions.get(host).map(String::as_str)
    }

    /// Iterate over `(host, version)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.versions
            .iter()
            .map(|(host, version)| (host.as_str(), version.as_str()))
    }

    /// Number of recorded hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether no host is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Check a single `host: range` constraint.
    ///
    /// # Errors
    ///
    /// Returns the [`HostMismatch`] describing why the constraint fails.
    pub fn check(&self, host: &str, range: &str) -> Result<(), HostMismatch> {
        let found = self
            .get(host)
            .ok_or_else(|| HostMismatch::Missing(host.to_string()))?;
        let version = Version::parse(found.trim()).map_err(|_| HostMismatch::InvalidVersion {
            host: host.to_string(),
            version: found.to_string(),
        })?;
        let alternatives = parse_range(range).ok_or_else(|| HostMismatch::InvalidRange {
            host: host.to_string(),
            range: range.to_string(),
        })?;
        if alternatives.iter().any(|req| req.matches(&version)) {
            Ok(())
        } else {
            Err(HostMismatch::Unsatisfied {
                host: host.to_string(),
                required: range.to_string(),
                found: found.to_string(),
            })
        }
    }

    /// Check every `hosts` constraint of a manifest, stopping at the first
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`HostMismatch`] encountered.
    pub fn check_manifest(&self, manifest: &PackageManifest) -> Result<(), HostMismatch> {
        manifest
            .hosts
            .iter()
            .try_for_each(|(host, range)| self.check(host, range))
    }
}

/// Whether `version` satisfies the npm-style `range`.
///
/// Unparseable input never satisfies.
#[must_use]
pub fn satisfies(version: &str, range: &str) -> bool {
    let Ok(version) = Version::parse(version.trim()) else {
        return false;
    };
    parse_range(range).is_some_and(|alternatives| alternatives.iter().any(|req| req.matches(&version)))
}

/// Parse an npm-style range into its `||` alternatives.
fn parse_range(range: &str) -> Option<Vec<VersionReq>> {
    range
        .split("||")
        .map(|alternative| VersionReq::parse(&normalize_comparators(alternative.trim())).ok())
        .collect()
}

/// Rewrite one space-separated comparator set into `semver` syntax.
fn normalize_comparators(set: &str) -> String {
    if set.is_empty() {
        return "*".to_string();
    }
    if set.contains(',') {
        return set.to_string();
    }

    let tokens: Vec<&str> = set.split_whitespace().collect();
    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={}, <={}", strip_v(low), strip_v(high));
    }

    // Operators may be written apart from their version (`>= 1.0.0`).
    let mut comparators: Vec<String> = Vec::with_capacity(tokens.len());
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{}", strip_v(token)),
            None => exact_if_bare(strip_v(token)),
        };
        comparators.push(comparator);
    }
    comparators.join(", ")
}

/// In npm a bare version is exact, or an x-range when partial. In `semver`
/// both are carets.
fn exact_if_bare(token: &str) -> String {
    if !token.starts_with(|c: char| c.is_ascii_digit()) || token.contains(['x', 'X', '*']) {
        return token.to_string();
    }
    let core = token.split(['-', '+']).next().unwrap_or(token);
    match core.split('.').count() {
        3 => format!("={token}"),
        1 | 2 if core == token => format!("{token}.*"),
        _ => token.to_string(),
    }
}

fn strip_v(token: &str) -> &str {
    token
        .strip_prefix('v')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_and_tilde() {
        assert!(satisfies("1.2.0", "^1.0.0"));
        assert!(!satisfies("2.0.0", "^1.0.0"));
        assert!(satisfies("1.2.9", "~1.2.0"));
        assert!(!satisfies("1.3.0", "~1.2.0"));
    }

    #[test]
    fn test_bare_version_is_exact() {
        assert!(satisfies("1.0.0", "1.0.0"));
        assert!(satisfies("1.0.0-rc.1", "1.0.0-rc.1"));
        assert!(!satisfies("1.0.0", "1.0.0-rc.1"));
        assert!(!satisfies("1.0.1", "1.0.0"));
    }

    #[test]
    fn test_bare_partial_version_is_x_range() {
        assert!(satisfies("1.2.7", "1.2"));
        assert!(!satisfies("1.5.0", "1.2"));
        assert!(satisfies("1.9.0", "1"));
        assert!(!satisfies("2.0.0", "1"));
        assert!(!satisfies("1.9.0", ">=1.0.0 1.2"));
        assert!(satisfies("1.2.3", ">=1.0.0 1.2"));
    }

    #[test]
    fn test_space_separated_comparators() {
        assert!(satisfies("1.5.0", ">=1.0.0 <2.0.0"));
        assert!(!satisfies("2.0.0", ">=1.0.0 <2.0.0"));
        assert!(satisfies("1.5.0", ">= 1.0.0 < 2.0.0"));
    }

    #[test]
    fn test_alternatives() {
        assert!(satisfies("3.1.0", "^1.0.0 || ^3.0.0"));
        assert!(!satisfies("2.1.0", "^1.0.0 || ^3.0.0"));
    }

    #[test]
    fn test_hyphen_range_is_inclusive() {
        assert!(satisfies("2.0.0", "1.0.0 - 2.0.0"));
        assert!(!satisfies("2.0.1", "1.0.0 - 2.0.0"));
    }

    #[test]
    fn test_wildcards() {
        assert!(satisfies("4.5.6", "*"));
        assert!(satisfies("4.5.6", ""));
        assert!(satisfies("1.9.0", "1.x"));
    }

    #[test]
    fn test_invalid_input_never_satisfies() {
        assert!(!satisfies("not-a-version", "^1.0.0"));
        assert!(!satisfies("1.0.0", ">>>nope"));
    }

    #[test]
    fn test_check_missing_host() {
        let registry = VersionRegistry::new();
        assert_eq!(
            registry.check("atelier", "^1.0.0"),
            Err(HostMismatch::Missing("atelier".into()))
        );
    }

    #[test]
    fn test_check_unsatisfied_host() {
        let mut registry = VersionRegistry::new();
        registry.set("atelier", "0.9.0");
        assert!(matches!(
            registry.check("atelier", "^1.0.0"),
            Err(HostMismatch::Unsatisfied { .. })
        ));
        registry.set("atelier", "1.2.0");
        assert!(registry.check("atelier", "^1.0.0").is_ok());
    }

    #[test]
    fn test_check_invalid_range() {
        let mut registry = VersionRegistry::new();
        registry.set("atelier", "1.0.0");
        assert!(matches!(
            registry.check("atelier", "!!"),
            Err(HostMismatch::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_check_manifest_reports_first_declared_host() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{"name": "app", "hosts": {"zeta": "^2.0.0", "alpha": "^2.0.0"}}"#,
        )
        .unwrap();
        let mut registry = VersionRegistry::new();
        registry.set("alpha", "1.0.0");
        registry.set("zeta", "1.0.0");

        assert!(matches!(
            registry.check_manifest(&manifest),
            Err(HostMismatch::Unsatisfied { ref host, .. }) if host == "zeta"
        ));
    }

    #[test]
    fn test_replace_drops_old_hosts() {
        let mut registry = VersionRegistry::new();
        registry.set("old", "1.0.0");
        registry.replace([("atelier", "2.0.0")]);
        assert!(registry.get("old").is_none());
        assert_eq!(registry.get("atelier"), Some("2.0.0"));
        assert_eq!(registry.len(), 1);
    }
}
