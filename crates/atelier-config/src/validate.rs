//! Post-merge configuration validation.

use std::path::Component;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_packages(config)?;
    validate_build(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_packages(config: &Config) -> ConfigResult<()> {
    let p = &config.packages;

    // Used as a file name: i18n/<language>.json
    let language_ok = !p.language.is_empty()
        && p
            .language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !language_ok {
        return Err(invalid(
            "packages.language",
            format!(
                "'{}' is not a valid language tag; use letters, digits, '-' or '_'",
                p.language
            ),
        ));
    }

    for (host, version) in &p.hosts {
        if semver::Version::parse(version).is_err() {
            return Err(invalid(
                format!("packages.hosts.{host}"),
                format!("'{version}' is not a semantic version"),
            ));
        }
    }

    Ok(())
}

fn validate_build(config: &Config) -> ConfigResult<()> {
    let b = &config.build;

    if b.command.first().is_none_or(|program| program.trim().is_empty()) {
        return Err(invalid("build.command", "build command must name a program"));
    }

    let output_ok = !b.output_dir.as_os_str().is_empty()
        && b
            .output_dir
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !output_ok {
        return Err(invalid(
            "build.output_dir",
            format!(
                "'{}' must be a non-empty path relative to the package directory",
                b.output_dir.display()
            ),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}
