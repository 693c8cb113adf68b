// src/db/models/backup_link.rs

//! Backup link model - ties a component version to an external snapshot
//!
//! A link is written immediately before a destructive operation. The
//! `snapshot_id` is opaque and is the only handle needed for rollback.

use super::component::conversion_error;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a backup was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOperationKind {
    PreUpdate,
    PreUninstall,
    Manual,
}

impl BackupOperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            BackupOperationKind::PreUpdate => "pre_update",
            BackupOperationKind::PreUninstall => "pre_uninstall",
            BackupOperationKind::Manual => "manual",
        }
    }
}

impl FromStr for BackupOperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pre_update" => Ok(BackupOperationKind::PreUpdate),
            "pre_uninstall" => Ok(BackupOperationKind::PreUninstall),
            "manual" => Ok(BackupOperationKind::Manual),
            _ => Err(format!("Invalid backup operation kind: {s}")),
        }
    }
}

impl fmt::Display for BackupOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long a backup link is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Kept until an operator removes it
    #[default]
    ManualCleanup,
    /// Removed by the cleanup pass once `expires_at` has passed
    AutoCleanup,
}

impl RetentionPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            RetentionPolicy::ManualCleanup => "manual_cleanup",
            RetentionPolicy::AutoCleanup => "auto_cleanup",
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual_cleanup" => Ok(RetentionPolicy::ManualCleanup),
            "auto_cleanup" => Ok(RetentionPolicy::AutoCleanup),
            _ => Err(format!("Invalid retention policy: {s}")),
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted link between a component version and a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLinkRecord {
    pub id: Option<i64>,
    pub component_name: String,
    pub version: String,
    pub snapshot_id: String,
    pub operation_kind: BackupOperationKind,
    pub reason: String,
    pub retention_policy: RetentionPolicy,
    pub retention_period_days: Option<u32>,
    pub is_important: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = "SELECT id, component_name, version, snapshot_id, operation_kind, reason,
        retention_policy, retention_period_days, is_important, expires_at, created_at
 FROM backup_links";

impl BackupLinkRecord {
    /// Create a new link with manual-cleanup retention
    pub fn new(
        component_name: impl Into<String>,
        version: impl Into<String>,
        snapshot_id: impl Into<String>,
        operation_kind: BackupOperationKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            component_name: component_name.into(),
            version: version.into(),
            snapshot_id: snapshot_id.into(),
            operation_kind,
            reason: reason.into(),
            retention_policy: RetentionPolicy::ManualCleanup,
            retention_period_days: None,
            is_important: false,
            expires_at: None,
            created_at: None,
        }
    }

    /// Whether the cleanup pass may delete this link at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.retention_policy == RetentionPolicy::AutoCleanup
            && !self.is_important
            && self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Insert this link into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        conn.execute(
            "INSERT INTO backup_links (component_name, version, snapshot_id, operation_kind, reason,
                                       retention_policy, retention_period_days, is_important,
                                       expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.component_name,
                &self.version,
                &self.snapshot_id,
                self.operation_kind.as_str(),
                &self.reason,
                self.retention_policy.as_str(),
                self.retention_period_days,
                self.is_important,
                self.expires_at.map(|t| t.to_rfc3339()),
                created_at.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.created_at = Some(created_at);
        Ok(id)
    }

    /// Find a link by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let link = stmt.query_row([id], Self::from_row).optional()?;
        Ok(link)
    }

    /// Find the most recent link for a snapshot
    pub fn find_by_snapshot(conn: &Connection, snapshot_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE snapshot_id = ?1 ORDER BY id DESC LIMIT 1"
        ))?;
        let link = stmt.query_row([snapshot_id], Self::from_row).optional()?;
        Ok(link)
    }

    /// All links for a component, newest first
    pub fn find_by_component(conn: &Connection, component_name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE component_name = ?1 ORDER BY id DESC"
        ))?;
        let links = stmt
            .query_map([component_name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// All links, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;
        let links = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// Links eligible for automatic deletion at `now`
    pub fn find_expired(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE retention_policy = 'auto_cleanup' AND is_important = 0
               AND expires_at IS NOT NULL ORDER BY id"
        ))?;
        let links = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links.into_iter().filter(|link| link.is_expired(now)).collect())
    }

    /// Delete a link by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM backup_links WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind_str: String = row.get(4)?;
        let operation_kind = kind_str
            .parse::<BackupOperationKind>()
            .map_err(|e| conversion_error(4, e))?;

        let policy_str: String = row.get(6)?;
        let retention_policy = policy_str
            .parse::<RetentionPolicy>()
            .map_err(|e| conversion_error(6, e))?;

        let expires_at: Option<String> = row.get(9)?;
        let created_at: String = row.get(10)?;

        Ok(Self {
            id: Some(row.get(0)?),
            component_name: row.get(1)?,
            version: row.get(2)?,
            snapshot_id: row.get(3)?,
            operation_kind,
            reason: row.get(5)?,
            retention_policy,
            retention_period_days: row.get(7)?,
            is_important: row.get(8)?,
            expires_at: expires_at.map(|s| parse_timestamp(9, &s)).transpose()?,
            created_at: Some(parse_timestamp(10, &created_at)?),
        })
    }
}

pub(crate) fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, format!("invalid timestamp '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_backup_link_crud() {
        let (_temp, conn) = create_test_db();

        let mut link = BackupLinkRecord::new(
            "reporting",
            "1.0.0",
            "snap-1",
            BackupOperationKind::PreUpdate,
            "update to 1.1.0",
        );
        let id = link.insert(&conn).unwrap();

        let found = BackupLinkRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.snapshot_id, "snap-1");
        assert_eq!(found.operation_kind, BackupOperationKind::PreUpdate);
        assert_eq!(found.retention_policy, RetentionPolicy::ManualCleanup);
        assert!(!found.is_important);

        let by_snapshot = BackupLinkRecord::find_by_snapshot(&conn, "snap-1").unwrap().unwrap();
        assert_eq!(by_snapshot.id, Some(id));

        assert_eq!(BackupLinkRecord::find_by_component(&conn, "reporting").unwrap().len(), 1);
        BackupLinkRecord::delete(&conn, id).unwrap();
        assert!(BackupLinkRecord::list_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_expiry_respects_policy_and_importance() {
        let now = Utc::now();
        let past = now - Duration::days(1);

        let mut auto = BackupLinkRecord::new("a", "1.0.0", "s1", BackupOperationKind::Manual, "r");
        auto.retention_policy = RetentionPolicy::AutoCleanup;
        auto.expires_at = Some(past);
        assert!(auto.is_expired(now));

        let mut important = auto.clone();
        important.is_important = true;
        assert!(!important.is_expired(now));

        let mut manual = auto.clone();
        manual.retention_policy = RetentionPolicy::ManualCleanup;
        assert!(!manual.is_expired(now));

        let mut future = auto.clone();
        future.expires_at = Some(now + Duration::days(1));
        assert!(!future.is_expired(now));

        let mut no_expiry = auto;
        no_expiry.expires_at = None;
        assert!(!no_expiry.is_expired(now));
    }

    #[test]
    fn test_find_expired() {
        let (_temp, conn) = create_test_db();
        let now = Utc::now();

        let mut expired = BackupLinkRecord::new("a", "1.0.0", "s1", BackupOperationKind::PreUpdate, "r");
        expired.retention_policy = RetentionPolicy::AutoCleanup;
        expired.expires_at = Some(now - Duration::hours(1));
        expired.insert(&conn).unwrap();

        let mut kept = BackupLinkRecord::new("a", "1.0.0", "s2", BackupOperationKind::PreUpdate, "r");
        kept.retention_policy = RetentionPolicy::AutoCleanup;
        kept.expires_at = Some(now - Duration::hours(1));
        kept.is_important = true;
        kept.insert(&conn).unwrap();

        let mut manual = BackupLinkRecord::new("a", "1.0.0", "s3", BackupOperationKind::Manual, "r");
        manual.expires_at = Some(now - Duration::hours(1));
        manual.insert(&conn).unwrap();

        let found = BackupLinkRecord::find_expired(&conn, now).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].snapshot_id, "s1");
    }
}
