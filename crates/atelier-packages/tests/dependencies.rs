//! Dependency resolution, cycle detection and host compatibility.

use serde_json::json;

use atelier_packages::{HostMismatch, LoadOptions, PACKAGE_LOADED, PackageError};
use atelier_test::{PackageFixture, TestHost, test_workspace};

#[tokio::test]
async fn test_dependencies_load_first() {
    let dir = test_workspace();
    PackageFixture::new("base").write(dir.path());
    PackageFixture::new("util")
        .with_dependency("base", "^1.0.0")
        .write(dir.path());
    let app = PackageFixture::new("app")
        .with_dependency("util", "*")
        .with_dependency("base", "*")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.add_search_paths([dir.path()]);

    manager.load(&app, LoadOptions::default()).await.unwrap();

    assert_eq!(
        host.broadcaster.payloads(PACKAGE_LOADED),
        vec![json!("base"), json!("util"), json!("app")]
    );
    assert_eq!(manager.packages().count(), 3);
    assert_eq!(
        manager.find_package_path_by_name("base"),
        Some(dir.path().join("base").as_path())
    );
}

#[tokio::test]
async fn test_missing_dependency_fails() {
    let dir = test_workspace();
    let app = PackageFixture::new("app")
        .with_dependency("ghost", "1.0.0")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.add_search_paths([dir.path()]);

    let err = manager.load(&app, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(&err, PackageError::DependencyNotFound { package, dependency }
        if package == "app" && dependency == "ghost"));
    assert!(!manager.is_loaded(&app));
}

#[tokio::test]
async fn test_dependency_cycle_detected() {
    let dir = test_workspace();
    let a = PackageFixture::new("a").with_dependency("b", "*").write(dir.path());
    PackageFixture::new("b").with_dependency("a", "*").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.add_search_paths([dir.path()]);

    let err = manager.load(&a, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(&err, PackageError::DependencyCycle { path } if *path == a));
    assert_eq!(manager.packages().count(), 0);

    // The failed attempt leaves nothing marked as in progress.
    PackageFixture::new("b").write(dir.path());
    manager.load(&a, LoadOptions::default()).await.unwrap();
    assert_eq!(manager.packages().count(), 2);
}

#[tokio::test]
async fn test_dropped_load_does_not_block_later_loads() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();

    let mut pending = manager.load(&path, LoadOptions::default());
    let _ = futures::poll!(&mut pending);
    drop(pending);

    manager.load(&path, LoadOptions::default()).await.unwrap();
    assert!(manager.is_loaded(&path));
}

#[tokio::test]
async fn test_dependency_host_failure_registers_neither() {
    let dir = test_workspace();
    PackageFixture::new("a")
        .with_host("editor", "^1.0.0")
        .write(dir.path());
    let b = PackageFixture::new("b").with_dependency("a", "*").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.add_search_paths([dir.path()]);
    manager.set_host_version("editor", "0.9.0");

    let err = manager.load(&b, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(&err, PackageError::HostIncompatible { package, .. } if package == "a"));
    assert_eq!(manager.packages().count(), 0);
    assert!(host.broadcaster.payloads(PACKAGE_LOADED).is_empty());
}

#[tokio::test]
async fn test_search_paths_in_order() {
    let dir = test_workspace();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    PackageFixture::new("base").with_version("1.0.0").write(&first);
    PackageFixture::new("base").with_version("2.0.0").write(&second);
    let app = PackageFixture::new("app")
        .with_dependency("base", "*")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.add_search_paths([dir.path().join("missing"), second.clone(), first.clone()]);

    manager.load(&app, LoadOptions::default()).await.unwrap();

    assert_eq!(
        manager.find_package_path_by_name("base"),
        Some(second.join("base").as_path())
    );
}

#[tokio::test]
async fn test_search_path_management() {
    let dir = test_workspace();
    let host = TestHost::new();
    let mut manager = host.manager();

    assert_eq!(manager.add_search_paths([dir.path(), dir.path()]), 1);
    assert!(manager.find("base").is_none());
    PackageFixture::new("base").write(dir.path());
    assert_eq!(manager.find("base"), Some(dir.path().join("base")));

    assert!(manager.remove_search_path(dir.path()));
    assert!(!manager.remove_search_path(dir.path()));
    manager.add_search_paths([dir.path()]);
    manager.reset_search_paths();
    assert!(manager.search_paths().is_empty());
}

#[tokio::test]
async fn test_host_version_mismatch() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_host("atelier", "^2.0.0")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.set_host_version("atelier", "1.4.0");

    let err = manager.load(&path, LoadOptions::default()).await.unwrap_err();

    match err {
        PackageError::HostIncompatible { package, mismatch } => {
            assert_eq!(package, "demo");
            assert!(matches!(mismatch, HostMismatch::Unsatisfied { ref host, .. } if host == "atelier"));
        },
        other => panic!("expected host incompatibility, got {other:?}"),
    }
    assert!(!manager.is_loaded(&path));
}

#[tokio::test]
async fn test_unknown_host_rejected() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_host("renderer", ">=1.0.0")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();

    let err = manager.load(&path, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(
        err,
        PackageError::HostIncompatible {
            mismatch: HostMismatch::Missing(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_compatible_hosts_load() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_host("atelier", "1.x || 2.x")
        .with_host("runtime", ">= 20.0.0")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.set_host_versions([("atelier", "2.3.1"), ("runtime", "20.11.0")]);

    assert!(manager.load(&path, LoadOptions::default()).await.is_ok());
}

#[tokio::test]
async fn test_apply_config() {
    let dir = test_workspace();
    PackageFixture::new("base").write(dir.path());
    let app = PackageFixture::new("app")
        .with_dependency("base", "*")
        .with_host("atelier", "^1.0.0")
        .write(&dir.path().join("apps"));

    let mut config = atelier_config::Config::default();
    config.packages.search_paths = vec![dir.path().to_path_buf()];
    config.packages.hosts.insert("atelier".into(), "1.2.0".into());
    config.packages.language = "de".into();
    config.packages.builtin_dir = Some(dir.path().join("apps"));

    let host = TestHost::new();
    let mut manager = host.manager();
    manager.apply_config(&config);

    assert_eq!(manager.language(), "de");
    manager.load(&app, LoadOptions::default()).await.unwrap();
    assert!(manager.is_builtin(&app));
    assert!(!manager.is_builtin(&dir.path().join("base")));
}

#[tokio::test]
async fn test_editor_range_satisfied_and_unsatisfied() {
    let dir = test_workspace();
    let path = PackageFixture::new("foo")
        .with_host("editor", "^1.0.0")
        .write(dir.path());
    let host = TestHost::new();

    let mut manager = host.manager();
    manager.set_host_version("editor", "1.2.0");
    manager.load(&path, LoadOptions::default()).await.unwrap();
    assert_eq!(manager.package_path("foo"), Some(path.as_path()));

    let mut manager = host.manager();
    manager.set_host_version("editor", "0.9.0");
    let err = manager.load(&path, LoadOptions::default()).await.unwrap_err();
    assert!(matches!(err, PackageError::HostIncompatible { .. }));
    assert_eq!(manager.packages().count(), 0);
    assert!(manager.package_path("foo").is_none());
}
