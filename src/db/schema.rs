// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Migrations are applied in order and recorded in `schema_version`, so an
//! existing database is brought forward on open.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::Config(format!(
            "unknown schema migration version {version}"
        ))),
    }
}

/// Version 1: component registry and backup links
///
/// - components: one row per tracked component, dependencies as JSON
/// - backup_links: snapshot handles taken before destructive operations
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE components (
            name TEXT PRIMARY KEY CHECK(length(name) BETWEEN 1 AND 100),
            current_version TEXT NOT NULL,
            installed_version TEXT,
            path TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL CHECK(status IN ('active', 'inactive', 'error')),
            dependencies TEXT NOT NULL DEFAULT '[]',
            dependencies_status TEXT NOT NULL DEFAULT 'unknown'
                CHECK(dependencies_status IN ('met', 'unmet', 'unknown')),
            dependencies_warnings TEXT NOT NULL DEFAULT '[]',
            registered_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX idx_components_status ON components(status);

        CREATE TABLE backup_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            component_name TEXT NOT NULL,
            version TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            operation_kind TEXT NOT NULL
                CHECK(operation_kind IN ('pre_update', 'pre_uninstall', 'manual')),
            reason TEXT NOT NULL,
            retention_policy TEXT NOT NULL
                CHECK(retention_policy IN ('manual_cleanup', 'auto_cleanup')),
            retention_period_days INTEGER,
            is_important INTEGER NOT NULL DEFAULT 0,
            expires_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX idx_backup_links_component ON backup_links(component_name);
        CREATE INDEX idx_backup_links_snapshot ON backup_links(snapshot_id);
        ",
    )?;

    Ok(())
}

/// Version 2: installation history
///
/// - installations: one row per orchestrated operation
/// - installation_steps: ordered audit trail within an operation
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE installations (
            id TEXT PRIMARY KEY,
            component_name TEXT NOT NULL,
            operation TEXT NOT NULL CHECK(operation IN ('install', 'update', 'uninstall')),
            from_version TEXT,
            to_version TEXT NOT NULL,
            status TEXT NOT NULL
                CHECK(status IN ('in_progress', 'succeeded', 'failed', 'rolled_back')),
            backup_link_id INTEGER,
            warnings TEXT NOT NULL DEFAULT '[]',
            error TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            FOREIGN KEY (backup_link_id) REFERENCES backup_links(id) ON DELETE SET NULL
        );

        CREATE INDEX idx_installations_component ON installations(component_name);
        CREATE INDEX idx_installations_started_at ON installations(started_at);

        CREATE TABLE installation_steps (
            installation_id TEXT NOT NULL,
            step_number INTEGER NOT NULL,
            name TEXT NOT NULL,
            step_type TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('succeeded', 'failed', 'skipped')),
            message TEXT,
            step_data TEXT,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (installation_id, step_number),
            FOREIGN KEY (installation_id) REFERENCES installations(id) ON DELETE CASCADE
        );
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        for expected in ["backup_links", "components", "installation_steps", "installations"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, i64::from(SCHEMA_VERSION));
    }

    #[test]
    fn test_component_name_length_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let long_name = "a".repeat(101);
        let result = conn.execute(
            "INSERT INTO components (name, current_version, path, status, registered_at, updated_at)
             VALUES (?1, '1.0.0', '/x', 'inactive', 'now', 'now')",
            [&long_name],
        );
        assert!(result.is_err());
    }
}
