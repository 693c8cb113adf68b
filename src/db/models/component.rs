// src/db/models/component.rs

//! Component model - one row per tracked component
//!
//! A component is a self-contained feature module with its own version,
//! on-disk location and declared dependencies. `installed_version` is `None`
//! while a component is registered but not installed; `current_version` is
//! the version its manifest currently declares.
//!
//! `dependencies` and `dependencies_warnings` are stored as JSON text and
//! decoded here, so callers only ever see typed values.

use crate::error::{Error, Result};
use crate::version::{ComponentVersion, VersionRequirement};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a component name
pub const MAX_NAME_LEN: usize = 100;

/// Check that a component name is 1-100 characters of `a-z`, `0-9`, `_`
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Lifecycle status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Active,
    Inactive,
    Error,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ComponentStatus::Active => "active",
            ComponentStatus::Inactive => "inactive",
            ComponentStatus::Error => "error",
        }
    }
}

impl FromStr for ComponentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(ComponentStatus::Active),
            "inactive" => Ok(ComponentStatus::Inactive),
            "error" => Ok(ComponentStatus::Error),
            _ => Err(format!("Invalid component status: {s}")),
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a component's dependency check, derived by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    Met,
    Unmet,
    Unknown,
}

impl DependencyStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DependencyStatus::Met => "met",
            DependencyStatus::Unmet => "unmet",
            DependencyStatus::Unknown => "unknown",
        }
    }
}

impl FromStr for DependencyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "met" => Ok(DependencyStatus::Met),
            "unmet" => Ok(DependencyStatus::Unmet),
            "unknown" => Ok(DependencyStatus::Unknown),
            _ => Err(format!("Invalid dependency status: {s}")),
        }
    }
}

impl fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared dependency: a component name plus an optional minimum version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DependencyRequirement {
    /// Dependency with a minimum version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Dependency satisfied by any installed version
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

impl FromStr for DependencyRequirement {
    type Err = Error;

    /// Parse the `name>=version` / `name` shorthand used in manifests
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (name, version) = match trimmed.split_once(">=") {
            Some((name, version)) => (name.trim(), Some(version.trim())),
            None => (trimmed, None),
        };

        validate_name(name)?;
        if let Some(version) = version {
            VersionRequirement::parse(version)?;
        }

        Ok(Self {
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }
}

impl fmt::Display for DependencyRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}>={}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// A tracked component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    pub name: String,
    pub current_version: String,
    pub installed_version: Option<String>,
    pub path: String,
    pub description: Option<String>,
    pub status: ComponentStatus,
    pub dependencies: Vec<DependencyRequirement>,
    pub dependencies_status: DependencyStatus,
    pub dependencies_warnings: Vec<String>,
    pub registered_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ComponentRecord {
    /// Create a registered-but-not-installed component
    pub fn new(name: impl Into<String>, current_version: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_version: current_version.into(),
            installed_version: None,
            path: path.into(),
            description: None,
            status: ComponentStatus::Inactive,
            dependencies: Vec::new(),
            dependencies_status: DependencyStatus::Unknown,
            dependencies_warnings: Vec::new(),
            registered_at: None,
            updated_at: None,
        }
    }

    /// Builder-style setter for declared dependencies
    pub fn with_dependencies(mut self, dependencies: Vec<DependencyRequirement>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Mark this record as installed and active at `version`
    pub fn installed_at(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self.status = ComponentStatus::Active;
        self
    }

    /// Whether the component is currently installed
    pub fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }

    /// Whether this component declares a dependency on `name`
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|dep| dep.name == name)
    }

    /// Whether the declared version is newer than the installed one
    pub fn has_update(&self) -> bool {
        self.installed_version
            .as_deref()
            .is_some_and(|installed| crate::version::is_newer(&self.current_version, installed))
    }

    /// Check record invariants: name format, parseable versions, no
    /// self-dependency, no duplicate or malformed dependency entries
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        ComponentVersion::parse(&self.current_version)?;
        if let Some(installed) = &self.installed_version {
            ComponentVersion::parse(installed)?;
        }

        let mut seen = Vec::with_capacity(self.dependencies.len());
        for dep in &self.dependencies {
            if dep.name == self.name {
                return Err(Error::InvalidManifest {
                    component: self.name.clone(),
                    reason: "component cannot depend on itself".to_string(),
                });
            }
            validate_name(&dep.name)?;
            if let Some(version) = &dep.version {
                VersionRequirement::parse(version)?;
            }
            if seen.contains(&dep.name.as_str()) {
                return Err(Error::InvalidManifest {
                    component: self.name.clone(),
                    reason: format!("dependency '{}' declared more than once", dep.name),
                });
            }
            seen.push(dep.name.as_str());
        }

        Ok(())
    }

    /// Insert or fully replace this record (single-row atomic write)
    pub fn upsert(&mut self, conn: &Connection) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let registered_at = self.registered_at.clone().unwrap_or_else(|| now.clone());
        let dependencies = serde_json::to_string(&self.dependencies)?;
        let warnings = serde_json::to_string(&self.dependencies_warnings)?;

        conn.execute(
            "INSERT INTO components (name, current_version, installed_version, path, description,
                                     status, dependencies, dependencies_status, dependencies_warnings,
                                     registered_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(name) DO UPDATE SET
                current_version = excluded.current_version,
                installed_version = excluded.installed_version,
                path = excluded.path,
                description = excluded.description,
                status = excluded.status,
                dependencies = excluded.dependencies,
                dependencies_status = excluded.dependencies_status,
                dependencies_warnings = excluded.dependencies_warnings,
                updated_at = excluded.updated_at",
            params![
                &self.name,
                &self.current_version,
                &self.installed_version,
                &self.path,
                &self.description,
                self.status.as_str(),
                dependencies,
                self.dependencies_status.as_str(),
                warnings,
                registered_at,
                now,
            ],
        )?;

        self.registered_at = Some(registered_at);
        self.updated_at = Some(now);
        Ok(())
    }

    /// Find a component by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, current_version, installed_version, path, description, status,
                    dependencies, dependencies_status, dependencies_warnings, registered_at, updated_at
             FROM components WHERE name = ?1",
        )?;

        let record = stmt.query_row([name], Self::from_row).optional()?;
        Ok(record)
    }

    /// List all components ordered by name
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, current_version, installed_version, path, description, status,
                    dependencies, dependencies_status, dependencies_warnings, registered_at, updated_at
             FROM components ORDER BY name",
        )?;

        let records = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// List components with the given status, ordered by name
    pub fn list_by_status(conn: &Connection, status: ComponentStatus) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, current_version, installed_version, path, description, status,
                    dependencies, dependencies_status, dependencies_warnings, registered_at, updated_at
             FROM components WHERE status = ?1 ORDER BY name",
        )?;

        let records = stmt
            .query_map([status.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Delete a component by name, returning whether a row was removed
    pub fn delete(conn: &Connection, name: &str) -> Result<bool> {
        let removed = conn.execute("DELETE FROM components WHERE name = ?1", [name])?;
        Ok(removed > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(5)?;
        let status = status_str
            .parse::<ComponentStatus>()
            .map_err(|e| conversion_error(5, e))?;

        let dependencies_json: String = row.get(6)?;
        let dependencies: Vec<DependencyRequirement> = serde_json::from_str(&dependencies_json)
            .map_err(|e| conversion_error(6, e.to_string()))?;

        let dep_status_str: String = row.get(7)?;
        let dependencies_status = dep_status_str
            .parse::<DependencyStatus>()
            .map_err(|e| conversion_error(7, e))?;

        let warnings_json: String = row.get(8)?;
        let dependencies_warnings: Vec<String> = serde_json::from_str(&warnings_json)
            .map_err(|e| conversion_error(8, e.to_string()))?;

        Ok(Self {
            name: row.get(0)?,
            current_version: row.get(1)?,
            installed_version: row.get(2)?,
            path: row.get(3)?,
            description: row.get(4)?,
            status,
            dependencies,
            dependencies_status,
            dependencies_warnings,
            registered_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

pub(crate) fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
