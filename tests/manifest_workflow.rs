// tests/manifest_workflow.rs

//! Register, install, update and uninstall real component directories with
//! the manifest-driven applier and a command-driven snapshot facility.

mod common;

use common::{open, setup_test_db};
use plinth::apply::MARKER_FILE;
use plinth::config::BackupSection;
use plinth::db::models::{BackupLinkRecord, BackupOperationKind, ComponentStatus, OperationKind};
use plinth::manifest::{ComponentManifest, MANIFEST_FILE};
use plinth::registry::{self, RegistryStore, SqliteRegistry};
use plinth::{CommandSnapshots, Error, ManifestApplier, Orchestrator};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_manifest(dir: &Path, content: &str) {
    fs::write(dir.join(MANIFEST_FILE), content).unwrap();
}

fn register_dir(store: &SqliteRegistry<'_>, dir: &Path) {
    let manifest = ComponentManifest::load(dir).unwrap();
    let record = manifest.to_record(dir.to_str().unwrap()).unwrap();
    registry::register(store, record).unwrap();
}

fn marker(dir: &Path) -> Option<String> {
    fs::read_to_string(dir.join(MARKER_FILE))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Snapshot ids are the labels; restores are appended to `restored.log`
fn snapshots(work: &Path) -> CommandSnapshots {
    let log = work.join("restored.log");
    CommandSnapshots::new(
        vec!["sh".into(), "-c".into(), "echo {label}".into()],
        Some(vec![
            "sh".into(),
            "-c".into(),
            format!("echo {{id}} >> {}", log.display()),
        ]),
        None,
    )
}

#[test]
fn full_lifecycle_with_rollback() {
    let (_temp, db_path) = setup_test_db();
    let conn = open(&db_path);
    let store = SqliteRegistry::new(&conn);

    let work = TempDir::new().unwrap();
    let base = work.path().join("base");
    fs::create_dir(&base).unwrap();
    write_manifest(
        &base,
        "name = \"base\"\nversion = \"1.0.0\"\n[hooks]\ninstall = [\"sh\", \"-c\", \"touch installed.flag\"]\n",
    );
    register_dir(&store, &base);

    let facility = snapshots(work.path());
    let applier = ManifestApplier::new();
    let orchestrator = Orchestrator::new(&conn, &store, &facility, &applier, &BackupSection::default());

    // Install
    orchestrator.install("base").unwrap();
    assert_eq!(marker(&base).as_deref(), Some("1.0.0"));
    assert!(base.join("installed.flag").exists());

    // A new version whose migration fails
    write_manifest(
        &base,
        "name = \"base\"\nversion = \"1.1.0\"\n[hooks]\nupdate = [\"sh\", \"-c\", \"exit 3\"]\n",
    );
    register_dir(&store, &base);
    let record = store.get("base").unwrap().unwrap();
    assert!(record.has_update());

    let err = orchestrator.update("base").unwrap_err();
    assert!(matches!(err, Error::ApplyFailed { .. }));
    assert!(err.to_string().contains("exit code 3"));

    let restored = fs::read_to_string(work.path().join("restored.log")).unwrap();
    assert!(restored.starts_with("base-1.0.0-pre_update-"));
    assert_eq!(marker(&base).as_deref(), Some("1.0.0"));
    assert_eq!(
        store.get("base").unwrap().unwrap().installed_version.as_deref(),
        Some("1.0.0")
    );

    // Fixed migration
    write_manifest(
        &base,
        "name = \"base\"\nversion = \"1.1.0\"\n[hooks]\nupdate = [\"sh\", \"-c\", \"test \\\"$PLINTH_FROM_VERSION\\\" = 1.0.0\"]\n",
    );
    register_dir(&store, &base);
    let report = orchestrator.update("base").unwrap();
    assert_eq!(report.to_version, "1.1.0");
    assert_eq!(marker(&base).as_deref(), Some("1.1.0"));

    let links = BackupLinkRecord::find_by_component(&conn, "base").unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l.operation_kind == BackupOperationKind::PreUpdate));

    // Uninstall keeps the registration
    orchestrator.run(OperationKind::Uninstall, "base").unwrap();
    assert_eq!(marker(&base), None);
    let record = store.get("base").unwrap().unwrap();
    assert_eq!(record.installed_version, None);
    assert_eq!(record.status, ComponentStatus::Inactive);

    registry::unregister(&store, "base").unwrap();
    assert!(store.get("base").unwrap().is_none());
}

#[test]
fn broken_manifest_fails_apply_without_touching_registry() {
    let (_temp, db_path) = setup_test_db();
    let conn = open(&db_path);
    let store = SqliteRegistry::new(&conn);

    let work = TempDir::new().unwrap();
    let dir = work.path().join("ledger");
    fs::create_dir(&dir).unwrap();
    write_manifest(&dir, "name = \"ledger\"\nversion = \"0.3.0\"\n");
    register_dir(&store, &dir);

    // Manifest disappears between registration and install
    fs::remove_file(dir.join(MANIFEST_FILE)).unwrap();

    let facility = snapshots(work.path());
    let applier = ManifestApplier::new();
    let orchestrator = Orchestrator::new(&conn, &store, &facility, &applier, &BackupSection::default());

    let err = orchestrator.install("ledger").unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(!store.get("ledger").unwrap().unwrap().is_installed());
    assert_eq!(marker(&dir), None);
}
