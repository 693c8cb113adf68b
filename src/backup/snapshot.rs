// src/backup/snapshot.rs

//! Snapshot facility boundary
//!
//! The engine never looks inside a snapshot. It asks the facility to create
//! one under a label, keeps the returned id, and later asks for a restore by
//! that id.

use crate::config::SnapshotSection;
use crate::exec;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a snapshot facility
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The facility is not configured or cannot be reached
    #[error("snapshot facility unavailable: {0}")]
    Unavailable(String),

    /// The facility ran but reported failure
    #[error("{0}")]
    Failed(String),
}

/// External snapshot/savepoint facility
pub trait SnapshotFacility {
    /// Create a snapshot, returning its opaque id
    fn create_snapshot(&self, label: &str) -> Result<String, SnapshotError>;

    /// Restore a snapshot by id
    fn restore_snapshot(&self, snapshot_id: &str) -> Result<(), SnapshotError>;

    /// Metadata for a snapshot, `None` if it does not exist
    fn snapshot_info(&self, snapshot_id: &str) -> Result<Option<String>, SnapshotError>;
}

/// Facility that refuses every request
///
/// Used when no snapshot command is configured. Planning keeps working;
/// destructive operations are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSnapshots;

impl SnapshotFacility for UnavailableSnapshots {
    fn create_snapshot(&self, _label: &str) -> Result<String, SnapshotError> {
        Err(SnapshotError::Unavailable(
            "no [snapshots] create command configured".to_string(),
        ))
    }

    fn restore_snapshot(&self, _snapshot_id: &str) -> Result<(), SnapshotError> {
        Err(SnapshotError::Unavailable(
            "no [snapshots] restore command configured".to_string(),
        ))
    }

    fn snapshot_info(&self, _snapshot_id: &str) -> Result<Option<String>, SnapshotError> {
        Err(SnapshotError::Unavailable(
            "no [snapshots] info command configured".to_string(),
        ))
    }
}

/// Facility driven by configured argv templates
///
/// - `create` receives `{label}` and prints the snapshot id on stdout
/// - `restore` receives `{id}`
/// - `info` receives `{id}` and prints metadata; empty output means "not found"
#[derive(Debug, Clone)]
pub struct CommandSnapshots {
    create: Vec<String>,
    restore: Option<Vec<String>>,
    info: Option<Vec<String>>,
}

impl CommandSnapshots {
    pub fn new(create: Vec<String>, restore: Option<Vec<String>>, info: Option<Vec<String>>) -> Self {
        Self {
            create,
            restore,
            info,
        }
    }
}

/// Build the facility described by `[snapshots]`
pub fn from_config(section: &SnapshotSection) -> Box<dyn SnapshotFacility> {
    match &section.create {
        Some(create) => Box::new(CommandSnapshots::new(
            create.clone(),
            section.restore.clone(),
            section.info.clone(),
        )),
        None => Box::new(UnavailableSnapshots),
    }
}

impl SnapshotFacility for CommandSnapshots {
    fn create_snapshot(&self, label: &str) -> Result<String, SnapshotError> {
        let argv = exec::render_argv(&self.create, &[("label", label)]);
        let output = exec::run(&argv, None, &[], "snapshot").map_err(|e| SnapshotError::Failed(e.to_string()))?;

        let id = output.stdout.trim();
        if id.is_empty() {
            return Err(SnapshotError::Failed(
                "snapshot command printed no snapshot id".to_string(),
            ));
        }
        debug!("Created snapshot {} ({})", id, label);
        Ok(id.to_string())
    }

    fn restore_snapshot(&self, snapshot_id: &str) -> Result<(), SnapshotError> {
        let template = self.restore.as_ref().ok_or_else(|| {
            SnapshotError::Unavailable("no [snapshots] restore command configured".to_string())
        })?;
        let argv = exec::render_argv(template, &[("id", snapshot_id)]);
        exec::run(&argv, None, &[], "snapshot").map_err(|e| SnapshotError::Failed(e.to_string()))?;
        debug!("Restored snapshot {}", snapshot_id);
        Ok(())
    }

    fn snapshot_info(&self, snapshot_id: &str) -> Result<Option<String>, SnapshotError> {
        let template = self.info.as_ref().ok_or_else(|| {
            SnapshotError::Unavailable("no [snapshots] info command configured".to_string())
        })?;
        let argv = exec::render_argv(template, &[("id", snapshot_id)]);
        let output = exec::run(&argv, None, &[], "snapshot").map_err(|e| SnapshotError::Failed(e.to_string()))?;

        let info = output.stdout.trim();
        Ok((!info.is_empty()).then(|| info.to_string()))
    }
}
