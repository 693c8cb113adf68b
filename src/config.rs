// src/config.rs

//! Engine configuration
//!
//! Read from a TOML file (default `/etc/plinth/plinth.toml`). Every section
//! is optional:
//!
//! ```toml
//! [database]
//! path = "/var/lib/plinth/plinth.db"
//!
//! [backup]
//! retention_policy = "auto_cleanup"
//! retention_period_days = 30
//! important = false
//!
//! [snapshots]
//! create = ["snapctl", "create", "{label}"]
//! restore = ["snapctl", "restore", "{id}"]
//! info = ["snapctl", "info", "{id}"]
//!
//! [install]
//! allow_unmet_deps = false
//! ```

use crate::db::models::RetentionPolicy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/plinth/plinth.toml";

/// Default database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/plinth/plinth.db";

/// Environment variable overriding the configuration file
pub const CONFIG_ENV: &str = "PLINTH_CONFIG";

/// Environment variable overriding the database path
pub const DB_ENV: &str = "PLINTH_DB";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlinthConfig {
    pub database: DatabaseSection,
    pub backup: BackupSection,
    pub snapshots: SnapshotSection,
    pub install: InstallSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub path: Option<String>,
}

/// Retention applied to backup links created before destructive operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSection {
    pub retention_policy: RetentionPolicy,
    /// Days until an `auto_cleanup` link expires
    pub retention_period_days: Option<u32>,
    /// Flag new links as important (never auto-deleted)
    pub important: bool,
}

/// Argv templates for the command-driven snapshot facility
///
/// `{label}` and `{id}` are substituted per call. Without `create` the
/// facility is unavailable and destructive operations are refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotSection {
    pub create: Option<Vec<String>>,
    pub restore: Option<Vec<String>>,
    pub info: Option<Vec<String>>,
}

impl SnapshotSection {
    pub fn is_configured(&self) -> bool {
        self.create.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallSection {
    /// Default for `--allow-unmet-deps`
    pub allow_unmet_deps: bool,
}

impl PlinthConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: PlinthConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: PlinthConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, `PLINTH_CONFIG`, or the default location
    ///
    /// A missing file is only tolerated at the default location.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    debug!("Loading configuration from {}", default.display());
                    Self::load(default)
                } else {
                    debug!("No configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.backup.retention_period_days == Some(0) {
            return Err(Error::Config(
                "backup.retention_period_days must be at least 1".to_string(),
            ));
        }
        if self.backup.retention_policy == RetentionPolicy::AutoCleanup
            && self.backup.retention_period_days.is_none()
        {
            return Err(Error::Config(
                "backup.retention_policy = \"auto_cleanup\" requires retention_period_days"
                    .to_string(),
            ));
        }

        for (key, argv) in [
            ("create", &self.snapshots.create),
            ("restore", &self.snapshots.restore),
            ("info", &self.snapshots.info),
        ] {
            if argv.as_ref().is_some_and(Vec::is_empty) {
                return Err(Error::Config(format!("snapshots.{key} must not be empty")));
            }
        }

        Ok(())
    }

    /// Database path: flag, then `PLINTH_DB`, then `[database].path`, then
    /// the built-in default
    pub fn db_path(&self, flag: Option<&str>) -> String {
        let from_env = std::env::var(DB_ENV).ok();
        pick_db_path(flag, from_env.as_deref(), self.database.path.as_deref())
    }
}

fn pick_db_path(flag: Option<&str>, env: Option<&str>, configured: Option<&str>) -> String {
    flag.or(env)
        .filter(|p| !p.is_empty())
        .or(configured)
        .unwrap_or(DEFAULT_DB_PATH)
        .to_string()
}
