//! Dynamic package lifecycle manager for the Atelier editor.
//!
//! A package is a directory with a `package.json` manifest. The
//! [`PackageManager`] loads it at runtime and wires its declared
//! capabilities into the host, then tears them out again on unload:
//!
//! - [`PackageManifest`]: name, version, host constraints, dependencies,
//!   build flag, entry module, main-menu entries and panels
//! - [`PackageModule`] / [`ModuleLoader`]: the entry module and how it is
//!   evaluated; [`ModuleGraph`] caches modules and evicts them on unload
//! - [`HostServices`]: menu, localization, message transport, window
//!   broadcast and image decoding supplied by the host
//! - [`Builder`]: turns a package source into a runnable build output
//! - [`Registry`]: the version, search-path, package and panel tables
//!
//! # Message naming
//!
//! Messages exported by an entry module are registered as
//! `packageName:message` unless the name already contains a `:`.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut manager = PackageManager::new(host, builder, loader);
//! manager.set_host_version("atelier", "1.2.0");
//! manager.add_search_paths(["/usr/share/atelier/packages"]);
//!
//! let report = manager.load(Path::new("/packages/foo"), LoadOptions::default()).await?;
//! for warning in &report.warnings {
//!     eprintln!("{warning}");
//! }
//! manager.unload(Path::new("/packages/foo")).await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod broadcast;
pub mod build;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod host;
pub mod ipc;
pub mod manager;
pub mod manifest;
pub mod module;
pub mod panel;
pub mod registry;
pub mod report;
pub mod search;
pub mod table;
pub mod version;

pub use build::{BuildError, BuildOptions, Builder, DEV_OUTPUT_DIR, ProcessBuilder};
pub use dispatcher::MessageDispatcher;
pub use error::{PackageError, PackageResult, PackageWarning};
pub use graph::ModuleGraph;
pub use host::{
    HostError, HostResult, HostServices, ImageDecoder, ImageHandle, Localization, MenuService,
    MenuTemplate, MessageHandler, MessageTransport, SubscriptionId, WindowBroadcaster,
};
pub use ipc::{PackageDescriptor, PackageRequest, PackageResponse};
pub use manager::{LoadOptions, PACKAGE_LOADED, PACKAGE_UNLOADED, PackageManager, ReloadOptions};
pub use manifest::{MANIFEST_FILE_NAME, MenuItemDef, PackageManifest, PanelDef};
pub use module::{InertModule, ModuleError, ModuleLoader, ModuleResult, ModuleSource, PackageModule};
pub use panel::{PanelInfo, PanelRegistry};
pub use registry::Registry;
pub use report::{LoadReport, LoadStatus, UnloadReport};
pub use search::SearchPathSet;
pub use table::{LoadedPackage, PackageTable};
pub use version::{HostMismatch, VersionRegistry};
