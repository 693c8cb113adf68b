// src/cli/backup.rs
//! Backup link commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Snapshot an installed component on demand
    Create {
        /// Component name
        component: String,

        /// Why the backup was taken
        #[arg(short, long)]
        reason: Option<String>,

        /// Keep this backup regardless of retention policy
        #[arg(long)]
        important: bool,
    },

    /// List backup links
    List {
        /// Only show this component
        component: Option<String>,
    },

    /// Delete expired auto-cleanup links
    Prune,

    /// Restore a snapshot
    Restore {
        /// Snapshot id as shown by `backup list`
        snapshot_id: String,
    },
}
