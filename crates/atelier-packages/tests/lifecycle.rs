//! Load and unload against recording host services.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use atelier_packages::{
    LoadOptions, LoadStatus, PACKAGE_LOADED, PACKAGE_UNLOADED, PackageError, PackageWarning,
};
use atelier_test::{PackageFixture, ScriptedModule, TestHost, init_test_logging, test_workspace};

fn full_featured(dir: &Path) -> std::path::PathBuf {
    PackageFixture::new("demo")
        .with_main("main.js")
        .with_menu("Packages/Demo/Open", json!({ "message": "demo:open", "accelerator": "Ctrl+D" }))
        .with_panel("main", json!({ "title": "Demo" }))
        .with_i18n("en", &json!({ "title": "Demo" }))
        .write(dir)
}

#[tokio::test]
async fn test_load_registers_everything() {
    init_test_logging();
    let dir = test_workspace();
    let path = full_featured(dir.path());
    let host = TestHost::new();
    let module = Arc::new(ScriptedModule::new().with_messages(["ping", "shared:pong"]));
    host.loader.insert(path.join("main.js"), module.clone());
    let mut manager = host.manager();

    let report = manager.load(&path, LoadOptions::default()).await.unwrap();

    assert_eq!(report.status, LoadStatus::Loaded);
    assert_eq!(report.name, "demo");
    assert!(report.warnings.is_empty());
    assert_eq!(module.load_calls(), 1);

    assert_eq!(host.localization.get("demo"), Some(json!({ "title": "Demo" })));
    assert_eq!(host.menu.paths(), vec!["Packages/Demo/Open"]);
    let template = host.menu.template("Packages/Demo/Open").unwrap();
    assert_eq!(template.message.as_deref(), Some("demo:open"));
    assert_eq!(template.accelerator.as_deref(), Some("Ctrl+D"));

    let panel = manager.panel_info("demo.main").unwrap();
    assert_eq!(panel.title, "Demo");
    assert_eq!(panel.kind, "dockable");
    assert!(panel.popable);
    assert_eq!(panel.path, path);

    assert_eq!(host.transport.names(), vec!["demo:ping", "shared:pong"]);
    let answer = host.transport.send("demo:ping", json!(7)).unwrap().unwrap();
    assert_eq!(answer, json!({ "message": "ping", "payload": 7 }));

    assert_eq!(host.broadcaster.payloads(PACKAGE_LOADED), vec![json!("demo")]);
    assert_eq!(manager.find_package_path_by_name("demo"), Some(path.as_path()));
    assert!(manager.is_loaded(&path));
}

#[tokio::test]
async fn test_load_is_idempotent() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();

    manager.load(&path, LoadOptions::default()).await.unwrap();
    let second = manager.load(&path, LoadOptions::default()).await.unwrap();

    assert!(second.is_already_loaded());
    assert_eq!(host.broadcaster.payloads(PACKAGE_LOADED).len(), 1);
    assert_eq!(manager.packages().count(), 1);
}

#[tokio::test]
async fn test_unload_reverses_registrations() {
    let dir = test_workspace();
    let path = full_featured(dir.path());
    let host = TestHost::new();
    let module = Arc::new(ScriptedModule::new().with_messages(["ping"]));
    host.loader.insert(path.join("main.js"), module.clone());
    let mut manager = host.manager();
    manager.load(&path, LoadOptions::default()).await.unwrap();

    let report = manager.unload(&path).await;

    assert!(report.was_loaded());
    assert!(report.warnings.is_empty());
    assert_eq!(module.unload_calls(), 1);
    assert!(host.localization.get("demo").is_none());
    assert!(host.menu.paths().is_empty());
    assert!(manager.panel_info("demo.main").is_none());
    assert_eq!(host.transport.subscription_count(), 0);
    assert!(!manager.modules().contains(&path.join("main.js")));
    assert!(!manager.is_loaded(&path));
    assert!(manager.find_package_path_by_name("demo").is_none());
    assert_eq!(host.broadcaster.payloads(PACKAGE_UNLOADED), vec![json!("demo")]);
}

#[tokio::test]
async fn test_unload_unknown_path_is_noop() {
    let host = TestHost::new();
    let mut manager = host.manager();

    let report = manager.unload(Path::new("/nowhere/demo")).await;

    assert!(!report.was_loaded());
    assert!(host.broadcaster.events().is_empty());
}

#[tokio::test]
async fn test_load_after_unload_reloads_module() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").with_main("main.js").write(dir.path());
    let host = TestHost::new();
    let module = Arc::new(ScriptedModule::new());
    host.loader.insert(path.join("main.js"), module.clone());
    let mut manager = host.manager();

    manager.load(&path, LoadOptions::default()).await.unwrap();
    manager.unload(&path).await;
    manager.load(&path, LoadOptions::default()).await.unwrap();

    assert_eq!(host.loader.load_count(&path.join("main.js")), 2);
    assert_eq!(module.load_calls(), 2);
}

#[tokio::test]
async fn test_load_hook_failure_rolls_back() {
    let dir = test_workspace();
    let path = full_featured(dir.path());
    let host = TestHost::new();
    let module = Arc::new(
        ScriptedModule::new()
            .with_messages(["ping"])
            .failing_load("not today"),
    );
    host.loader.insert(path.join("main.js"), module.clone());
    let mut manager = host.manager();

    let err = manager.load(&path, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(&err, PackageError::LoadHook { package, message }
        if package == "demo" && message == "not today"));
    assert!(!manager.is_loaded(&path));
    assert!(host.localization.get("demo").is_none());
    assert!(host.menu.paths().is_empty());
    assert!(manager.panel_info("demo.main").is_none());
    assert_eq!(host.transport.subscription_count(), 0);
    assert!(!manager.modules().contains(&path.join("main.js")));
    assert!(host.broadcaster.payloads(PACKAGE_LOADED).is_empty());
    assert_eq!(host.broadcaster.payloads(PACKAGE_UNLOADED), vec![json!("demo")]);
    assert_eq!(module.unload_calls(), 1);
}

#[tokio::test]
async fn test_unload_hook_failure_is_a_warning() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").with_main("main.js").write(dir.path());
    let host = TestHost::new();
    host.loader.insert(
        path.join("main.js"),
        Arc::new(ScriptedModule::new().failing_unload("stuck")),
    );
    let mut manager = host.manager();
    manager.load(&path, LoadOptions::default()).await.unwrap();

    let report = manager.unload(&path).await;

    assert!(matches!(
        report.warnings.as_slice(),
        [PackageWarning::UnloadHookFailed { package, .. }] if package == "demo"
    ));
    assert!(!manager.is_loaded(&path));
    assert!(!manager.modules().contains(&path.join("main.js")));
}

#[tokio::test]
async fn test_missing_main_module_fails() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").with_main("main.js").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();

    let err = manager.load(&path, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(err, PackageError::MainLoad { ref main, .. } if main == "main.js"));
    assert!(!manager.is_loaded(&path));
}

#[tokio::test]
async fn test_missing_manifest_fails() {
    let dir = test_workspace();
    let host = TestHost::new();
    let mut manager = host.manager();

    let err = manager
        .load(&dir.path().join("absent"), LoadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PackageError::Manifest { .. }));
}

#[tokio::test]
async fn test_malformed_localization_fails() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_file("i18n/en.json", "{ not json")
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();

    let err = manager.load(&path, LoadOptions::default()).await.unwrap_err();

    assert!(matches!(err, PackageError::I18nLoad { .. }));
}

#[tokio::test]
async fn test_localization_follows_language() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_i18n("en", &json!({ "title": "Demo" }))
        .with_i18n("fr", &json!({ "title": "Démo" }))
        .write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.set_language("fr");

    manager.load(&path, LoadOptions::default()).await.unwrap();

    assert_eq!(host.localization.get("demo"), Some(json!({ "title": "Démo" })));
}

#[tokio::test]
async fn test_menu_problems_are_warnings() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_menu("Broken", json!({}))
        .with_menu("Packages/Demo/Icon", json!({ "icon": "missing.png" }))
        .with_menu("Locked/Entry", json!({}))
        .write(dir.path());
    let host = TestHost::new();
    let host = TestHost {
        menu: host.menu.clone().with_rejected_parent("Locked"),
        ..host
    };
    let mut manager = host.manager();

    let report = manager.load(&path, LoadOptions::default()).await.unwrap();

    assert!(report.warnings.iter().any(|w| matches!(w,
        PackageWarning::InvalidMenuPath { path, .. } if path == "Broken")));
    assert!(report.warnings.iter().any(|w| matches!(w,
        PackageWarning::InvalidMenuIcon { path, .. } if path == "Packages/Demo/Icon")));
    assert!(report.warnings.iter().any(|w| matches!(w,
        PackageWarning::MenuRejected { path, .. } if path == "Locked/Entry")));

    // The entry with a bad icon is still added, without an icon.
    assert_eq!(host.menu.paths(), vec!["Packages/Demo/Icon"]);
    assert!(host.menu.template("Packages/Demo/Icon").unwrap().icon.is_none());
    assert_eq!(
        manager.package_info(&path).unwrap().menu_paths(),
        ["Packages/Demo/Icon".to_string()]
    );
}

#[tokio::test]
async fn test_menu_path_is_localized_and_icon_decoded() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo")
        .with_menu("i18n:packages/Open", json!({ "icon": "icon.png" }))
        .with_file("icon.png", "png")
        .write(dir.path());
    let host = TestHost::new();
    let host = TestHost {
        localization: host.localization.clone().with_translation("i18n:packages", "Paquets"),
        ..host
    };
    let mut manager = host.manager();

    manager.load(&path, LoadOptions::default()).await.unwrap();

    assert_eq!(host.menu.paths(), vec!["Paquets/Open"]);
    assert!(host.menu.template("Paquets/Open").unwrap().icon.is_some());

    manager.unload(&path).await;
    assert_eq!(host.menu.removed(), vec!["Paquets/Open"]);
}

#[tokio::test]
async fn test_rejected_message_is_a_warning() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").with_main("main.js").write(dir.path());
    let host = TestHost::new();
    let host = TestHost {
        transport: host.transport.clone().with_rejected("demo:reserved"),
        ..host
    };
    host.loader.insert(
        path.join("main.js"),
        Arc::new(ScriptedModule::new().with_messages(["reserved", "open"])),
    );
    let mut manager = host.manager();

    let report = manager.load(&path, LoadOptions::default()).await.unwrap();

    assert!(matches!(
        report.warnings.as_slice(),
        [PackageWarning::MessageRejected { message, .. }] if message == "demo:reserved"
    ));
    assert_eq!(host.transport.names(), vec!["demo:open"]);
}

#[tokio::test]
async fn test_panel_collision_keeps_first_owner() {
    let dir = test_workspace();
    let first = PackageFixture::new("demo")
        .with_panel("main", json!({ "title": "First" }))
        .write(&dir.path().join("a"));
    let second = PackageFixture::new("demo")
        .with_panel("main", json!({ "title": "Second" }))
        .write(&dir.path().join("b"));
    let host = TestHost::new();
    let mut manager = host.manager();

    manager.load(&first, LoadOptions::default()).await.unwrap();
    let report = manager.load(&second, LoadOptions::default()).await.unwrap();

    assert!(matches!(
        report.warnings.as_slice(),
        [PackageWarning::PanelCollision { id, .. }] if id == "demo.main"
    ));
    assert_eq!(manager.panel_info("demo.main").unwrap().title, "First");
    // Name index is last-write-wins.
    assert_eq!(manager.find_package_path_by_name("demo"), Some(second.as_path()));

    manager.unload(&second).await;
    assert_eq!(manager.panel_info("demo.main").unwrap().title, "First");
    assert!(manager.is_loaded(&first));
}

#[tokio::test]
async fn test_containing_path_lookup() {
    let dir = test_workspace();
    let path = PackageFixture::new("demo").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.load(&path, LoadOptions::default()).await.unwrap();

    let found = manager
        .find_package_info_containing_path(&path.join("panels").join("main.js"))
        .unwrap();
    assert_eq!(found.name(), "demo");
    assert!(manager
        .find_package_info_containing_path(&dir.path().join("other"))
        .is_none());
}

#[tokio::test]
async fn test_unload_all() {
    let dir = test_workspace();
    let first = PackageFixture::new("one").write(dir.path());
    let second = PackageFixture::new("two").write(dir.path());
    let host = TestHost::new();
    let mut manager = host.manager();
    manager.load(&first, LoadOptions::default()).await.unwrap();
    manager.load(&second, LoadOptions::default()).await.unwrap();

    let reports = manager.unload_all().await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|report| report.was_loaded()));
    assert_eq!(manager.packages().count(), 0);
}
