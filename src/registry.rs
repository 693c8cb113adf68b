// src/registry.rs

//! Registry store boundary
//!
//! Every other part of the engine reads and writes component records
//! through [`RegistryStore`]. Writes are whole-record upserts, so derived
//! dependency fields are always stored together with the fields they are
//! derived from.

use crate::db::models::{ComponentRecord, ComponentStatus};
use crate::error::{Error, Result};
use crate::resolver::validator;
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::info;

/// Optional restriction for [`RegistryStore::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryFilter {
    pub status: Option<ComponentStatus>,
    pub installed_only: bool,
}

impl RegistryFilter {
    /// Match every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: ComponentStatus) -> Self {
        Self {
            status: Some(status),
            installed_only: false,
        }
    }

    pub fn installed() -> Self {
        Self {
            status: None,
            installed_only: true,
        }
    }

    pub fn matches(&self, record: &ComponentRecord) -> bool {
        self.status.is_none_or(|status| record.status == status)
            && (!self.installed_only || record.is_installed())
    }
}

/// Durable map from component name to component record
pub trait RegistryStore {
    /// Look up one record
    fn get(&self, name: &str) -> Result<Option<ComponentRecord>>;

    /// List records matching `filter`, ordered by name
    fn list(&self, filter: &RegistryFilter) -> Result<Vec<ComponentRecord>>;

    /// Insert or replace a whole record in a single atomic write
    fn upsert(&self, record: &mut ComponentRecord) -> Result<()>;

    /// Remove a record, returning whether it existed
    fn delete(&self, name: &str) -> Result<bool>;

    /// Records that declare a direct dependency on `name`
    fn dependents_of(&self, name: &str) -> Result<Vec<ComponentRecord>> {
        Ok(self
            .list(&RegistryFilter::all())?
            .into_iter()
            .filter(|record| record.depends_on(name))
            .collect())
    }
}

/// Registry backed by the `components` table
pub struct SqliteRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl RegistryStore for SqliteRegistry<'_> {
    fn get(&self, name: &str) -> Result<Option<ComponentRecord>> {
        ComponentRecord::find_by_name(self.conn, name)
    }

    fn list(&self, filter: &RegistryFilter) -> Result<Vec<ComponentRecord>> {
        let records = match filter.status {
            Some(status) => ComponentRecord::list_by_status(self.conn, status)?,
            None => ComponentRecord::list_all(self.conn)?,
        };
        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    fn upsert(&self, record: &mut ComponentRecord) -> Result<()> {
        record.upsert(self.conn)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        ComponentRecord::delete(self.conn, name)
    }
}

/// In-process registry, used for dry planning and tests
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RefCell<BTreeMap<String, ComponentRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = ComponentRecord>) -> Self {
        let registry = Self::new();
        registry.records.borrow_mut().extend(
            records
                .into_iter()
                .map(|record| (record.name.clone(), record)),
        );
        registry
    }
}

impl RegistryStore for MemoryRegistry {
    fn get(&self, name: &str) -> Result<Option<ComponentRecord>> {
        Ok(self.records.borrow().get(name).cloned())
    }

    fn list(&self, filter: &RegistryFilter) -> Result<Vec<ComponentRecord>> {
        Ok(self
            .records
            .borrow()
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn upsert(&self, record: &mut ComponentRecord) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        if record.registered_at.is_none() {
            record.registered_at = Some(now.clone());
        }
        record.updated_at = Some(now);
        self.records
            .borrow_mut()
            .insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.records.borrow_mut().remove(name).is_some())
    }
}

/// Add a component to the registry, or refresh an existing registration
///
/// Re-registering keeps the installation state (`installed_version`,
/// `status`, `registered_at`) and replaces the declared fields. Dependency
/// status is computed before the record is stored; direct dependents are
/// re-validated afterwards.
pub fn register(store: &dyn RegistryStore, declared: ComponentRecord) -> Result<ComponentRecord> {
    declared.validate()?;

    let mut record = match store.get(&declared.name)? {
        Some(existing) => ComponentRecord {
            installed_version: existing.installed_version,
            status: existing.status,
            registered_at: existing.registered_at,
            ..declared
        },
        None => declared,
    };

    // Declared and derived dependency fields go out in one write
    let report = validator::check(store, &record)?;
    report.apply_to(&mut record);
    store.upsert(&mut record)?;
    validator::revalidate_dependents(store, &record.name)?;

    info!("Registered {} {}", record.name, record.current_version);
    Ok(record)
}

/// Remove a component that is not installed
pub fn unregister(store: &dyn RegistryStore, name: &str) -> Result<()> {
    let record = store
        .get(name)?
        .ok_or_else(|| Error::UnknownComponent(name.to_string()))?;

    if let Some(installed) = &record.installed_version {
        return Err(Error::InvalidState {
            operation: "unregister".to_string(),
            component: name.to_string(),
            reason: format!("installed at version {installed}; uninstall it first"),
        });
    }

    store.delete(name)?;
    validator::revalidate_dependents(store, name)?;
    info!("Unregistered {}", name);
    Ok(())
}
