// src/db/models/installation.rs

//! Installation history - one record per orchestrated operation
//!
//! Steps are appended strictly in increasing `step_number` and a record is
//! finalized exactly once. After that it is read-only.

use super::backup_link::parse_timestamp;
use super::component::conversion_error;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The kind of orchestrated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Install,
    Update,
    Uninstall,
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Install => "install",
            OperationKind::Update => "update",
            OperationKind::Uninstall => "uninstall",
        }
    }

    /// Whether the operation modifies an existing installation
    pub fn is_destructive(&self) -> bool {
        matches!(self, OperationKind::Update | OperationKind::Uninstall)
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "install" => Ok(OperationKind::Install),
            "update" => Ok(OperationKind::Update),
            "uninstall" => Ok(OperationKind::Uninstall),
            _ => Err(format!("Invalid operation kind: {s}")),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final (or in-progress) status of an installation record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationStatus {
    InProgress,
    Succeeded,
    Failed,
    RolledBack,
}

impl InstallationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InstallationStatus::InProgress => "in_progress",
            InstallationStatus::Succeeded => "succeeded",
            InstallationStatus::Failed => "failed",
            InstallationStatus::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for InstallationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(InstallationStatus::InProgress),
            "succeeded" => Ok(InstallationStatus::Succeeded),
            "failed" => Ok(InstallationStatus::Failed),
            "rolled_back" => Ok(InstallationStatus::RolledBack),
            _ => Err(format!("Invalid installation status: {s}")),
        }
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Validation,
    DependencyCheck,
    Backup,
    Apply,
    Verify,
    RegistryCommit,
    Rollback,
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            StepType::Validation => "validation",
            StepType::DependencyCheck => "dependency_check",
            StepType::Backup => "backup",
            StepType::Apply => "apply",
            StepType::Verify => "verify",
            StepType::RegistryCommit => "registry_commit",
            StepType::Rollback => "rollback",
        }
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "validation" => Ok(StepType::Validation),
            "dependency_check" => Ok(StepType::DependencyCheck),
            "backup" => Ok(StepType::Backup),
            "apply" => Ok(StepType::Apply),
            "verify" => Ok(StepType::Verify),
            "registry_commit" => Ok(StepType::RegistryCommit),
            "rollback" => Ok(StepType::Rollback),
            _ => Err(format!("Invalid step type: {s}")),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(StepStatus::Succeeded),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of an installation record
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationStep {
    pub step_number: u32,
    pub name: String,
    pub step_type: StepType,
    pub status: StepStatus,
    pub message: Option<String>,
    pub step_data: Option<serde_json::Value>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl InstallationStep {
    /// Create an unnumbered step; the number is assigned on append
    pub fn new(step_type: StepType, name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step_number: 0,
            name: name.into(),
            step_type,
            status,
            message: None,
            step_data: None,
            recorded_at: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.step_data = Some(data);
        self
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let type_str: String = row.get(2)?;
        let step_type = type_str
            .parse::<StepType>()
            .map_err(|e| conversion_error(2, e))?;

        let status_str: String = row.get(3)?;
        let status = status_str
            .parse::<StepStatus>()
            .map_err(|e| conversion_error(3, e))?;

        let data: Option<String> = row.get(5)?;
        let step_data = data
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| conversion_error(5, e.to_string()))?;

        let recorded_at: String = row.get(6)?;

        Ok(Self {
            step_number: row.get(0)?,
            name: row.get(1)?,
            step_type,
            status,
            message: row.get(4)?,
            step_data,
            recorded_at: Some(parse_timestamp(6, &recorded_at)?),
        })
    }
}

/// Audit record of one orchestrated operation
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationRecord {
    pub id: String,
    pub component_name: String,
    pub operation: OperationKind,
    pub from_version: Option<String>,
    /// Target version; for uninstall, the version being removed
    pub to_version: String,
    pub status: InstallationStatus,
    pub backup_link_id: Option<i64>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<InstallationStep>,
}

const SELECT_COLUMNS: &str = "SELECT id, component_name, operation, from_version, to_version, status,
        backup_link_id, warnings, error, started_at, finished_at
 FROM installations";

impl InstallationRecord {
    /// Start a new in-progress record (not yet persisted)
    pub fn begin(
        component_name: impl Into<String>,
        operation: OperationKind,
        from_version: Option<String>,
        to_version: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            component_name: component_name.into(),
            operation,
            from_version,
            to_version: to_version.into(),
            status: InstallationStatus::InProgress,
            backup_link_id: None,
            warnings: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
        }
    }

    /// Whether the record has been finalized
    pub fn is_finished(&self) -> bool {
        self.status != InstallationStatus::InProgress
    }

    /// Insert the record header
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO installations (id, component_name, operation, from_version, to_version,
                                        status, backup_link_id, warnings, error, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.id,
                &self.component_name,
                self.operation.as_str(),
                &self.from_version,
                &self.to_version,
                self.status.as_str(),
                self.backup_link_id,
                serde_json::to_string(&self.warnings)?,
                &self.error,
                self.started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Append a step, assigning the next step number
    pub fn append_step(&mut self, conn: &Connection, mut step: InstallationStep) -> Result<u32> {
        self.ensure_open("append step")?;

        let step_number = self.steps.last().map_or(1, |last| last.step_number + 1);
        let recorded_at = Utc::now();
        let data = step.step_data.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO installation_steps (installation_id, step_number, name, step_type, status,
                                             message, step_data, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.id,
                step_number,
                &step.name,
                step.step_type.as_str(),
                step.status.as_str(),
                &step.message,
                data,
                recorded_at.to_rfc3339(),
            ],
        )?;

        step.step_number = step_number;
        step.recorded_at = Some(recorded_at);
        self.steps.push(step);
        Ok(step_number)
    }

    /// Link the backup taken for this operation
    pub fn attach_backup(&mut self, conn: &Connection, backup_link_id: i64) -> Result<()> {
        self.ensure_open("attach backup")?;
        conn.execute(
            "UPDATE installations SET backup_link_id = ?1 WHERE id = ?2",
            params![backup_link_id, &self.id],
        )?;
        self.backup_link_id = Some(backup_link_id);
        Ok(())
    }

    /// Record dependency warnings carried through a warn-only operation
    pub fn set_warnings(&mut self, conn: &Connection, warnings: Vec<String>) -> Result<()> {
        self.ensure_open("set warnings")?;
        conn.execute(
            "UPDATE installations SET warnings = ?1 WHERE id = ?2",
            params![serde_json::to_string(&warnings)?, &self.id],
        )?;
        self.warnings = warnings;
        Ok(())
    }

    /// Fix the final status; may only happen once
    pub fn finish(
        &mut self,
        conn: &Connection,
        status: InstallationStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.ensure_open("finalize")?;
        if status == InstallationStatus::InProgress {
            return Err(Error::InvalidState {
                operation: "finalize".to_string(),
                component: self.component_name.clone(),
                reason: "final status cannot be in_progress".to_string(),
            });
        }

        let finished_at = Utc::now();
        conn.execute(
            "UPDATE installations SET status = ?1, error = ?2, finished_at = ?3 WHERE id = ?4",
            params![status.as_str(), &error, finished_at.to_rfc3339(), &self.id],
        )?;

        self.status = status;
        self.error = error;
        self.finished_at = Some(finished_at);
        Ok(())
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_finished() {
            return Err(Error::InvalidState {
                operation: operation.to_string(),
                component: self.component_name.clone(),
                reason: format!("installation {} is already {}", self.id, self.status),
            });
        }
        Ok(())
    }

    /// Find a record (with steps) by ID
    pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let record = stmt.query_row([id], Self::from_row).optional()?;

        match record {
            Some(mut record) => {
                record.steps = Self::find_steps(conn, &record.id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Most recent records (with steps), optionally for one component
    pub fn list_recent(
        conn: &Connection,
        component_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Self>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut records = match component_name {
            Some(name) => {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE component_name = ?1
                     ORDER BY started_at DESC, rowid DESC LIMIT ?2"
                ))?;
                stmt.query_map(params![name, limit], Self::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_COLUMNS} ORDER BY started_at DESC, rowid DESC LIMIT ?1"
                ))?;
                stmt.query_map([limit], Self::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        for record in &mut records {
            record.steps = Self::find_steps(conn, &record.id)?;
        }
        Ok(records)
    }

    /// Steps for a record in step order
    pub fn find_steps(conn: &Connection, installation_id: &str) -> Result<Vec<InstallationStep>> {
        let mut stmt = conn.prepare(
            "SELECT step_number, name, step_type, status, message, step_data, recorded_at
             FROM installation_steps WHERE installation_id = ?1 ORDER BY step_number",
        )?;
        let steps = stmt
            .query_map([installation_id], InstallationStep::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let operation_str: String = row.get(2)?;
        let operation = operation_str
            .parse::<OperationKind>()
            .map_err(|e| conversion_error(2, e))?;

        let status_str: String = row.get(5)?;
        let status = status_str
            .parse::<InstallationStatus>()
            .map_err(|e| conversion_error(5, e))?;

        let warnings_json: String = row.get(7)?;
        let warnings: Vec<String> = serde_json::from_str(&warnings_json)
            .map_err(|e| conversion_error(7, e.to_string()))?;

        let started_at: String = row.get(9)?;
        let finished_at: Option<String> = row.get(10)?;

        Ok(Self {
            id: row.get(0)?,
            component_name: row.get(1)?,
            operation,
            from_version: row.get(3)?,
            to_version: row.get(4)?,
            status,
            backup_link_id: row.get(6)?,
            warnings,
            error: row.get(8)?,
            started_at: parse_timestamp(9, &started_at)?,
            finished_at: finished_at.map(|s| parse_timestamp(10, &s)).transpose()?,
            steps: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_steps_are_numbered_in_order() {
        let (_temp, conn) = create_test_db();

        let mut record =
            InstallationRecord::begin("base", OperationKind::Install, None, "1.0.0");
        record.insert(&conn).unwrap();

        let first = record
            .append_step(
                &conn,
                InstallationStep::new(StepType::Validation, "Validate request", StepStatus::Succeeded),
            )
            .unwrap();
        let second = record
            .append_step(
                &conn,
                InstallationStep::new(StepType::Apply, "Apply component", StepStatus::Failed)
                    .with_message("hook exited with 1")
                    .with_data(serde_json::json!({ "exit_code": 1 })),
            )
            .unwrap();
        assert_eq!((first, second), (1, 2));

        record
            .finish(&conn, InstallationStatus::Failed, Some("hook exited with 1".to_string()))
            .unwrap();

        let loaded = InstallationRecord::find_by_id(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.status, InstallationStatus::Failed);
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.steps[1].step_type, StepType::Apply);
        assert_eq!(loaded.steps[1].step_data, Some(serde_json::json!({ "exit_code": 1 })));
        assert!(loaded.finished_at.is_some());
    }

    #[test]
    fn test_record_is_finalized_once() {
        let (_temp, conn) = create_test_db();

        let mut record = InstallationRecord::begin(
            "base",
            OperationKind::Update,
            Some("1.0.0".to_string()),
            "1.1.0",
        );
        record.insert(&conn).unwrap();
        record.finish(&conn, InstallationStatus::Succeeded, None).unwrap();

        assert!(record.finish(&conn, InstallationStatus::Failed, None).is_err());
        assert!(
            record
                .append_step(
                    &conn,
                    InstallationStep::new(StepType::Verify, "late", StepStatus::Succeeded)
                )
                .is_err()
        );

        let loaded = InstallationRecord::find_by_id(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.status, InstallationStatus::Succeeded);
    }

    #[test]
    fn test_cannot_finish_as_in_progress() {
        let (_temp, conn) = create_test_db();
        let mut record = InstallationRecord::begin("base", OperationKind::Install, None, "1.0.0");
        record.insert(&conn).unwrap();
        assert!(record.finish(&conn, InstallationStatus::InProgress, None).is_err());
    }

    #[test]
    fn test_list_recent_filters_by_component() {
        let (_temp, conn) = create_test_db();

        for name in ["base", "reporting", "base"] {
            let mut record = InstallationRecord::begin(name, OperationKind::Install, None, "1.0.0");
            record.insert(&conn).unwrap();
            record.finish(&conn, InstallationStatus::Succeeded, None).unwrap();
        }

        assert_eq!(InstallationRecord::list_recent(&conn, None, 10).unwrap().len(), 3);
        assert_eq!(
            InstallationRecord::list_recent(&conn, Some("base"), 10).unwrap().len(),
            2
        );
        assert_eq!(InstallationRecord::list_recent(&conn, None, 1).unwrap().len(), 1);
    }
}
