// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use plinth::db;
use plinth::db::models::{ComponentRecord, DependencyRequirement, OperationKind};
use plinth::{ComponentApplier, Error, Result, SnapshotError, SnapshotFacility};
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use tempfile::TempDir;

/// Create an initialized database.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_test_db() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("plinth.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();

    (temp_dir, db_path)
}

/// Open a connection to a database created by [`setup_test_db`]
pub fn open(db_path: &str) -> Connection {
    db::open(db_path).unwrap()
}

/// Insert records as-is
pub fn seed(conn: &Connection, records: Vec<ComponentRecord>) {
    for mut record in records {
        record.upsert(conn).unwrap();
    }
}

/// Parse `name>=version` shorthand
pub fn dep(spec: &str) -> DependencyRequirement {
    spec.parse().unwrap()
}

/// `base`, `reporting` (base>=1.0) and `ui` (reporting), nothing installed
pub fn scenario_a() -> Vec<ComponentRecord> {
    vec![
        ComponentRecord::new("base", "1.0.0", "/opt/base"),
        ComponentRecord::new("reporting", "1.0.0", "/opt/reporting").with_dependencies(vec![dep("base>=1.0")]),
        ComponentRecord::new("ui", "1.0.0", "/opt/ui").with_dependencies(vec![dep("reporting")]),
    ]
}

/// Snapshot facility with failure injection
#[derive(Default)]
pub struct FakeSnapshots {
    pub fail_create: bool,
    pub fail_restore: bool,
    pub created: RefCell<Vec<String>>,
    pub restored: RefCell<Vec<String>>,
}

impl FakeSnapshots {
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn failing_restore() -> Self {
        Self {
            fail_restore: true,
            ..Default::default()
        }
    }
}

impl SnapshotFacility for FakeSnapshots {
    fn create_snapshot(&self, label: &str) -> std::result::Result<String, SnapshotError> {
        if self.fail_create {
            return Err(SnapshotError::Unavailable("snapshot service offline".to_string()));
        }
        let id = format!("snap-{}", self.created.borrow().len() + 1);
        self.created.borrow_mut().push(label.to_string());
        Ok(id)
    }

    fn restore_snapshot(&self, snapshot_id: &str) -> std::result::Result<(), SnapshotError> {
        if self.fail_restore {
            return Err(SnapshotError::Failed(format!("{snapshot_id} is corrupt")));
        }
        self.restored.borrow_mut().push(snapshot_id.to_string());
        Ok(())
    }

    fn snapshot_info(&self, snapshot_id: &str) -> std::result::Result<Option<String>, SnapshotError> {
        Ok(Some(format!("fake snapshot {snapshot_id}")))
    }
}

/// Applier keeping component footprints in memory, with failure injection
#[derive(Default)]
pub struct FakeApplier {
    /// Components whose apply step fails
    pub failing: Vec<String>,
    /// Components whose footprint is left stale after apply
    pub stale: Vec<String>,
    pub footprints: RefCell<HashMap<String, String>>,
    pub calls: RefCell<Vec<(OperationKind, String)>>,
}

impl FakeApplier {
    pub fn failing(name: &str) -> Self {
        Self {
            failing: vec![name.to_string()],
            ..Default::default()
        }
    }

    pub fn stale(name: &str) -> Self {
        Self {
            stale: vec![name.to_string()],
            ..Default::default()
        }
    }

    /// Start from components already in place
    pub fn with_installed(self, installed: &[(&str, &str)]) -> Self {
        self.footprints.borrow_mut().extend(
            installed
                .iter()
                .map(|(name, version)| (name.to_string(), version.to_string())),
        );
        self
    }

    pub fn applied(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(_, name)| name.clone()).collect()
    }
}

impl ComponentApplier for FakeApplier {
    fn apply(&self, operation: OperationKind, record: &ComponentRecord, target_version: &str) -> Result<()> {
        self.calls.borrow_mut().push((operation, record.name.clone()));
        if self.failing.contains(&record.name) {
            return Err(Error::ApplyFailed {
                component: record.name.clone(),
                reason: "hook exited with status 1".to_string(),
            });
        }
        if self.stale.contains(&record.name) {
            return Ok(());
        }

        let mut footprints = self.footprints.borrow_mut();
        match operation {
            OperationKind::Uninstall => {
                footprints.remove(&record.name);
            }
            OperationKind::Install | OperationKind::Update => {
                footprints.insert(record.name.clone(), target_version.to_string());
            }
        }
        Ok(())
    }

    fn footprint(&self, record: &ComponentRecord) -> Result<Option<String>> {
        Ok(self.footprints.borrow().get(&record.name).cloned())
    }
}
