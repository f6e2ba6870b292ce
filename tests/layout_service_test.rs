//! Tests for LayoutService: tree loading, configuration phase, output preparation

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use buildlayout::application::services::LayoutService;
use buildlayout::application::ApplicationError;
use buildlayout::config::{project_config_path, ModuleDecl, OrderingRule, Settings};
use buildlayout::domain::DomainError;
use buildlayout::infrastructure::traits::RealFileSystem;
use buildlayout::util::testing;

/// Flutter-like layout: `<tmp>/my_app/android/{app,camera,...}`
fn flutter_project(modules: &[&str]) -> (TempDir, PathBuf) {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let android = temp.path().join("my_app").join("android");
    fs::create_dir_all(&android).unwrap();
    for module in modules {
        let dir = android.join(module);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("build.gradle.kts"), "// module\n").unwrap();
    }
    let android = android.canonicalize().unwrap();
    (temp, android)
}

fn service() -> LayoutService {
    LayoutService::new(Arc::new(RealFileSystem))
}

#[test]
fn given_flutter_project_when_configuring_then_output_moves_next_to_android_dir() {
    // Arrange
    let (_temp, android) = flutter_project(&["app", "camera"]);
    let project_parent = android.parent().unwrap().to_path_buf();

    // Act
    let plan = service().configure(&android, &Settings::default()).unwrap();

    // Assert
    assert_eq!(plan.output_root, project_parent.join("build"));
    assert_eq!(plan.tree.root().name(), "android");
    assert_eq!(plan.tree.root().default_output_dir(), android.join("build"));
    assert_eq!(
        plan.tree.node("camera").unwrap().declared_output_dir(),
        project_parent.join("build").join("camera")
    );
    assert_eq!(
        plan.tree.node("app").unwrap().default_output_dir(),
        android.join("app").join("build")
    );
}

#[test]
fn given_defaults_when_configuring_then_every_module_waits_for_app() {
    let (_temp, android) = flutter_project(&["app", "camera", "url_launcher"]);

    let plan = service().configure(&android, &Settings::default()).unwrap();

    let tree = &plan.tree;
    assert!(tree.node("app").unwrap().evaluation_dependencies().is_empty());
    for name in ["camera", "url_launcher"] {
        assert!(tree.node(name).unwrap().evaluation_dependencies().contains("app"));
    }
    assert_eq!(
        tree.configuration_waves(),
        vec![
            vec!["android".to_string(), "app".to_string()],
            vec!["camera".to_string(), "url_launcher".to_string()],
        ]
    );
}

#[test]
fn given_defaults_when_configuring_then_clean_task_targets_relocated_root() {
    let (_temp, android) = flutter_project(&["app"]);

    let plan = service().configure(&android, &Settings::default()).unwrap();

    let task = plan.clean().expect("clean task registered");
    assert_eq!(task.name, "clean");
    assert_eq!(task.target, plan.output_root);
    assert_eq!(plan.buildscript.plugins.len(), 3);
    assert_eq!(plan.buildscript.repositories.len(), 2);
}

#[test]
fn given_directories_without_markers_when_discovering_then_ignored() {
    let (_temp, android) = flutter_project(&["app"]);
    fs::create_dir_all(android.join("gradle/wrapper")).unwrap();
    fs::create_dir_all(android.join(".gradle")).unwrap();
    fs::write(android.join(".gradle").join("build.gradle"), "").unwrap();

    let modules = service()
        .discover_modules(&android, &Settings::default().module_markers)
        .unwrap();

    assert_eq!(modules, vec![ModuleDecl::new("app")]);
}

#[test]
fn given_missing_primary_module_when_configuring_then_unknown_node() {
    let (_temp, android) = flutter_project(&["camera"]);

    let err = service()
        .configure(&android, &Settings::default())
        .unwrap_err();

    assert!(
        matches!(err, ApplicationError::Domain(DomainError::UnknownNode(ref n)) if n == "app"),
        "got {err:?}"
    );
}

#[test]
fn given_primary_first_disabled_when_configuring_then_no_edges() {
    let (_temp, android) = flutter_project(&["camera", "maps"]);
    let settings = Settings {
        enforce_primary_first: false,
        ..Settings::default()
    };

    let plan = service().configure(&android, &settings).unwrap();

    assert!(plan.tree.evaluation_edges().is_empty());
    assert_eq!(plan.tree.configuration_waves().len(), 1);
}

#[test]
fn given_declared_modules_outside_project_when_configuring_then_uses_declared_paths() {
    let (temp, android) = flutter_project(&["app"]);
    let settings = Settings {
        root_name: Some("root".into()),
        modules: vec![
            ModuleDecl::new("app"),
            ModuleDecl {
                name: "camera".into(),
                path: Some(PathBuf::from("../../plugins/camera/android")),
            },
        ],
        ..Settings::default()
    };

    let plan = service().configure(&android, &settings).unwrap();

    let camera = plan.tree.node("camera").unwrap();
    assert_eq!(
        camera.default_output_dir(),
        temp.path()
            .canonicalize()
            .unwrap()
            .join("plugins/camera/android/build")
    );
    assert_eq!(camera.declared_output_dir(), plan.output_root.join("camera"));
    assert_eq!(plan.tree.root().name(), "root");
}

#[test]
fn given_cyclic_ordering_rules_when_configuring_then_aborts_with_cycle() {
    let (_temp, android) = flutter_project(&["app", "camera"]);
    let settings = Settings {
        ordering: vec![OrderingRule {
            dependent: "app".into(),
            required: "camera".into(),
        }],
        ..Settings::default()
    };

    let err = service().configure(&android, &settings).unwrap_err();

    match err {
        ApplicationError::Domain(DomainError::CyclicDependency { dependent, required, .. }) => {
            assert_eq!(dependent, "camera");
            assert_eq!(required, "app");
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn given_invalid_plugin_coordinate_when_configuring_then_fails() {
    let (_temp, android) = flutter_project(&["app"]);
    let mut settings = Settings::default();
    settings.buildscript.plugins.push("not-a-coordinate".into());

    let err = service().configure(&android, &settings).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::InvalidCoordinate(_))
    ));
}

#[test]
fn given_missing_project_dir_when_configuring_then_operation_failed() {
    let temp = TempDir::new().unwrap();

    let err = service()
        .configure(&temp.path().join("nope"), &Settings::default())
        .unwrap_err();

    assert!(matches!(err, ApplicationError::OperationFailed { .. }));
}

#[test]
fn given_project_dir_with_space_and_underscore_when_configuring_then_root_named_after_it() {
    for dir_name in ["my android", "_android"] {
        testing::init_test_setup();
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("my_app").join(dir_name);
        fs::create_dir_all(project.join("app")).unwrap();
        fs::write(project.join("app/build.gradle"), "").unwrap();
        let project = project.canonicalize().unwrap();

        let plan = service().configure(&project, &Settings::default()).unwrap();

        assert_eq!(plan.tree.root().name(), dir_name);
        assert_eq!(plan.output_root, project.parent().unwrap().join("build"));
    }
}

#[test]
fn given_env_var_in_offset_when_configuring_then_relocates_to_expanded_path() {
    let (_temp, android) = flutter_project(&["app"]);
    std::env::set_var("FLUTTER_SHARED_OUT", "shared-out");
    fs::write(
        project_config_path(&android),
        "output_offset = \"../../$FLUTTER_SHARED_OUT\"\n",
    )
    .unwrap();
    let settings = Settings::load_file(&project_config_path(&android)).unwrap();

    let plan = service().configure(&android, &settings).unwrap();

    assert_eq!(
        plan.output_root,
        android.parent().unwrap().join("shared-out")
    );
    assert_eq!(plan.clean().unwrap().target, plan.output_root);
}

#[test]
fn given_home_relative_offset_when_loading_then_invalid_path_before_configuring() {
    let (_temp, android) = flutter_project(&["app"]);
    fs::write(
        project_config_path(&android),
        "output_offset = \"~/flutter-out\"\n",
    )
    .unwrap();

    let err = Settings::load_file(&project_config_path(&android)).unwrap_err();

    match err {
        ApplicationError::Domain(DomainError::InvalidPath { path, reason }) => {
            assert_eq!(path, PathBuf::from("~/flutter-out"));
            assert!(reason.contains('~'), "got {reason}");
        }
        other => panic!("expected invalid path, got {other:?}"),
    }
}

// ============================================================
// prepare_output_dirs
// ============================================================

#[test]
fn given_plan_when_preparing_then_creates_all_output_dirs() {
    let (_temp, android) = flutter_project(&["app", "camera"]);
    let svc = service();
    let plan = svc.configure(&android, &Settings::default()).unwrap();

    let created = svc.prepare_output_dirs(&plan).unwrap();

    assert_eq!(created.len(), 3);
    for dir in &created {
        assert!(dir.is_dir(), "{} should exist", dir.display());
    }
    assert!(!android.join("build").exists(), "default output must stay unused");
}

#[test]
fn given_unwritable_output_root_when_preparing_then_invalid_path() {
    // A regular file where the output root should go makes every mkdir fail.
    let (_temp, android) = flutter_project(&["app"]);
    let svc = service();
    let plan = svc.configure(&android, &Settings::default()).unwrap();
    fs::write(&plan.output_root, "occupied").unwrap();

    let err = svc.prepare_output_dirs(&plan).unwrap_err();

    match err {
        ApplicationError::Domain(DomainError::InvalidPath { path, .. }) => {
            assert!(path.starts_with(&plan.output_root));
        }
        other => panic!("expected invalid path, got {other:?}"),
    }
}

#[test]
fn given_relocated_plan_when_preparing_twice_then_idempotent() {
    let (_temp, android) = flutter_project(&["app"]);
    let svc = service();
    let plan = svc.configure(&android, &Settings::default()).unwrap();

    let first = svc.prepare_output_dirs(&plan).unwrap();
    let second = svc.prepare_output_dirs(&plan).unwrap();

    assert_eq!(first, second);
    assert!(Path::new(&plan.output_root).is_dir());
}
