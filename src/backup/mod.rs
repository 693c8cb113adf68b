// src/backup/mod.rs

//! Backup/savepoint linking
//!
//! Before an update or uninstall the orchestrator asks [`BackupLinker`] for a
//! snapshot. The linker obtains one from the [`SnapshotFacility`] and records
//! a [`BackupLinkRecord`] for it. If either step fails the destructive
//! operation is blocked: there is no soft-fail path.

mod snapshot;

pub use snapshot::{CommandSnapshots, SnapshotError, SnapshotFacility, UnavailableSnapshots, from_config};

use crate::config::BackupSection;
use crate::db::models::{BackupLinkRecord, BackupOperationKind, RetentionPolicy};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

/// Label passed to the snapshot facility:
/// `<component>-<version>-<operation_kind>-<timestamp>`
pub fn snapshot_label(
    component: &str,
    version: &str,
    kind: BackupOperationKind,
    at: DateTime<Utc>,
) -> String {
    format!("{component}-{version}-{kind}-{}", at.format("%Y%m%dT%H%M%SZ"))
}

/// Creates, restores and prunes backup links
pub struct BackupLinker<'a> {
    conn: &'a Connection,
    facility: &'a dyn SnapshotFacility,
    settings: BackupSection,
}

impl<'a> BackupLinker<'a> {
    pub fn new(conn: &'a Connection, facility: &'a dyn SnapshotFacility, settings: &BackupSection) -> Self {
        Self {
            conn,
            facility,
            settings: settings.clone(),
        }
    }

    /// Snapshot `component` at `version` and record the link
    ///
    /// Retention comes from the `[backup]` settings; `important` forces the
    /// link to be kept regardless of policy.
    pub fn create_backup(
        &self,
        component: &str,
        version: &str,
        kind: BackupOperationKind,
        reason: &str,
        important: bool,
    ) -> Result<BackupLinkRecord> {
        let now = Utc::now();
        let label = snapshot_label(component, version, kind, now);

        let snapshot_id = self
            .facility
            .create_snapshot(&label)
            .map_err(|e| Error::BackupUnavailable {
                component: component.to_string(),
                reason: e.to_string(),
            })?;

        let mut link = BackupLinkRecord::new(component, version, snapshot_id, kind, reason);
        link.retention_policy = self.settings.retention_policy;
        link.retention_period_days = self.settings.retention_period_days;
        link.is_important = important || self.settings.important;
        link.created_at = Some(now);
        if link.retention_policy == RetentionPolicy::AutoCleanup
            && let Some(days) = link.retention_period_days
        {
            link.expires_at = Some(now + Duration::days(i64::from(days)));
        }

        link.insert(self.conn).map_err(|e| Error::BackupUnavailable {
            component: component.to_string(),
            reason: format!("snapshot {} taken but link not recorded: {e}", link.snapshot_id),
        })?;

        info!(
            "Backed up {} {} as snapshot {} ({})",
            component, version, link.snapshot_id, kind
        );
        Ok(link)
    }

    /// Restore the snapshot behind a link
    pub fn restore(&self, link: &BackupLinkRecord) -> Result<()> {
        self.facility
            .restore_snapshot(&link.snapshot_id)
            .map_err(|e| Error::RollbackFailed {
                component: link.component_name.clone(),
                snapshot_id: link.snapshot_id.clone(),
                reason: e.to_string(),
            })?;
        info!(
            "Restored {} from snapshot {}",
            link.component_name, link.snapshot_id
        );
        Ok(())
    }

    /// Restore by snapshot id on operator request
    pub fn restore_snapshot(&self, snapshot_id: &str) -> Result<BackupLinkRecord> {
        let link = BackupLinkRecord::find_by_snapshot(self.conn, snapshot_id)?
            .ok_or_else(|| Error::NotFound(format!("backup link for snapshot {snapshot_id}")))?;
        self.restore(&link)?;
        Ok(link)
    }

    /// Metadata the facility holds for a link's snapshot
    pub fn snapshot_info(&self, link: &BackupLinkRecord) -> Option<String> {
        match self.facility.snapshot_info(&link.snapshot_id) {
            Ok(info) => info,
            Err(e) => {
                warn!("Cannot query snapshot {}: {}", link.snapshot_id, e);
                None
            }
        }
    }

    /// Links for one component, or all links
    pub fn list(&self, component: Option<&str>) -> Result<Vec<BackupLinkRecord>> {
        match component {
            Some(name) => BackupLinkRecord::find_by_component(self.conn, name),
            None => BackupLinkRecord::list_all(self.conn),
        }
    }

    /// Delete links that are `auto_cleanup`, expired and not important
    ///
    /// Returns the deleted links. `manual_cleanup` and important links are
    /// never touched.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<Vec<BackupLinkRecord>> {
        let expired = BackupLinkRecord::find_expired(self.conn, now)?;
        for link in &expired {
            if let Some(id) = link.id {
                BackupLinkRecord::delete(self.conn, id)?;
            }
        }
        if !expired.is_empty() {
            info!("Pruned {} expired backup links", expired.len());
        }
        Ok(expired)
    }
}
