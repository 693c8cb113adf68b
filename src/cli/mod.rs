// src/cli/mod.rs
//! CLI definitions for plinth
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Primary commands sit at root level:
//! - `register` / `unregister` - Manage registry entries from component directories
//! - `install` / `update` / `uninstall` - Orchestrated, backup-gated operations
//! - `list`, `whatbreaks`, `history` - Inspection
//!
//! Grouped contexts:
//! - `plan` - Dry execution orders
//! - `check` - Dependency validation
//! - `backup` - Snapshot links

use clap::{Parser, Subcommand};
use clap_complete::Shell;

mod backup;
mod plan;

pub use backup::BackupCommands;
pub use plan::{CheckCommands, PlanCommands};

#[derive(Parser)]
#[command(name = "plinth")]
#[command(author = "Plinth Contributors")]
#[command(version)]
#[command(about = "Component registry with dependency ordering, backups and rollback", long_about = None)]
pub struct Cli {
    /// Path to the database file (default: $PLINTH_DB, then config, then /var/lib/plinth/plinth.db)
    #[arg(short, long, global = true)]
    pub db_path: Option<String>,

    /// Path to the configuration file (default: $PLINTH_CONFIG or /etc/plinth/plinth.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Status filter accepted by `list --status`
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusArg {
    Active,
    Inactive,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new plinth database
    Init,

    /// Register (or refresh) a component from its directory
    Register {
        /// Component directory containing component.toml
        path: String,
    },

    /// Remove a component that is not installed from the registry
    Unregister {
        /// Component name
        name: String,
    },

    /// List registered components
    List {
        /// Only show components with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Only show installed components with a newer version available
        #[arg(long)]
        updates: bool,
    },

    /// Show execution orders without changing anything
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Validate dependencies
    #[command(subcommand)]
    Check(CheckCommands),

    /// Install component(s) and any registered dependencies they need
    Install {
        /// Component names
        #[arg(required = true)]
        components: Vec<String>,

        /// Proceed with unmet dependencies, recording them as warnings
        #[arg(long)]
        allow_unmet_deps: bool,
    },

    /// Update installed component(s) to their registered version
    Update {
        /// Component names
        #[arg(required = true)]
        components: Vec<String>,

        /// Proceed with unmet dependencies, recording them as warnings
        #[arg(long)]
        allow_unmet_deps: bool,
    },

    /// Uninstall component(s), dependents first
    Uninstall {
        /// Component names
        #[arg(required = true)]
        components: Vec<String>,

        /// Proceed even if installed components still depend on these
        #[arg(long)]
        allow_unmet_deps: bool,
    },

    /// Show every registered component that depends on a component
    Whatbreaks {
        /// Component name
        component: String,
    },

    /// Manage backup links
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Show installation history
    History {
        /// Only show this component
        component: Option<String>,

        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
