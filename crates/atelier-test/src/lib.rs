//! Shared test utilities for the Atelier package system.
//!
//! Recording mocks for every host service, a counting builder, a scripted
//! module loader, and helpers that write package directories to disk.
//!
//! # Usage
//!
//! ```rust,ignore
//! use atelier_test::{PackageFixture, TestHost, test_workspace};
//!
//! #[tokio::test]
//! async fn test_load() {
//!     let dir = test_workspace();
//!     let path = PackageFixture::new("demo").write(dir.path());
//!     let host = TestHost::new();
//!     let mut manager = host.manager();
//!     manager.load(&path, Default::default()).await.unwrap();
//!     assert_eq!(host.broadcaster.payloads("package:loaded").len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test-writer subscriber honoring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
