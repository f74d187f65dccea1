//! Logging setup for the Atelier package system.
//!
//! Wraps `tracing-subscriber` with a serializable [`LogConfig`] covering
//! level, format, output target and per-crate directives.
//!
//! # Example
//!
//! ```rust,no_run
//! use atelier_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), atelier_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("atelier_packages=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
