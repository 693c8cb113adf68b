// src/commands/mod.rs
//! Command handlers for the plinth CLI

mod backup;
mod component;
mod history;
mod install;
mod plan;
mod progress;
mod system;

pub use backup::{cmd_backup_create, cmd_backup_list, cmd_backup_prune, cmd_backup_restore};
pub use component::{cmd_list, cmd_register, cmd_unregister, cmd_whatbreaks};
pub use history::cmd_history;
pub use install::cmd_run;
pub use plan::{cmd_check_deps, cmd_plan};
pub use system::{cmd_completions, cmd_init};

use anyhow::{Context as _, Result};
use plinth::PlinthConfig;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Settings shared by every command: loaded configuration and the
/// database path it resolves to
pub struct Context {
    pub config: PlinthConfig,
    pub db_path: String,
}

impl Context {
    /// Load configuration and pick the database path
    ///
    /// `--db-path` wins over `PLINTH_DB`, which wins over `[database].path`.
    pub fn load(db_path: Option<&str>, config_path: Option<&str>) -> Result<Self> {
        let config = PlinthConfig::discover(config_path.map(Path::new))
            .context("Failed to load configuration")?;
        let db_path = config.db_path(db_path);
        debug!("Using database {}", db_path);
        Ok(Self { config, db_path })
    }

    /// Open the database (it must already be initialized)
    pub fn open(&self) -> Result<Connection> {
        Ok(plinth::db::open(&self.db_path)?)
    }
}
