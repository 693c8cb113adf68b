// src/db/models/mod.rs

//! Data models for plinth database entities
//!
//! Each struct maps to one table and carries its own create/read/update/delete
//! helpers. Enumerations are stored as their `as_str()` text.

mod backup_link;
mod component;
mod installation;

pub use backup_link::{BackupLinkRecord, BackupOperationKind, RetentionPolicy};
pub use component::{
    ComponentRecord, ComponentStatus, DependencyRequirement, DependencyStatus, MAX_NAME_LEN,
    validate_name,
};
pub use installation::{
    InstallationRecord, InstallationStatus, InstallationStep, OperationKind, StepStatus, StepType,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use rusqlite::Connection;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_deleting_backup_link_detaches_installation() {
        let (_temp, conn) = create_test_db();

        let mut link = BackupLinkRecord::new(
            "base",
            "1.0.0",
            "snap-1",
            BackupOperationKind::PreUpdate,
            "before update",
        );
        let link_id = link.insert(&conn).unwrap();

        let mut record = InstallationRecord::begin(
            "base",
            OperationKind::Update,
            Some("1.0.0".to_string()),
            "1.1.0",
        );
        record.insert(&conn).unwrap();
        record.attach_backup(&conn, link_id).unwrap();
        record
            .finish(&conn, InstallationStatus::Succeeded, None)
            .unwrap();

        BackupLinkRecord::delete(&conn, link_id).unwrap();

        let loaded = InstallationRecord::find_by_id(&conn, &record.id)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.backup_link_id, None);
        assert_eq!(loaded.status, InstallationStatus::Succeeded);
    }

    #[test]
    fn test_component_round_trip_through_models() {
        let (_temp, conn) = create_test_db();

        let mut record = ComponentRecord::new("reporting", "2.0.0", "/opt/plinth/reporting")
            .with_dependencies(vec![DependencyRequirement::new("base", "1.0.0")])
            .installed_at("1.5.0");
        record.upsert(&conn).unwrap();

        let loaded = ComponentRecord::find_by_name(&conn, "reporting")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, ComponentStatus::Active);
        assert!(loaded.has_update());
        assert!(loaded.depends_on("base"));
    }
}
