// src/commands/system.rs
//! System commands (init, completions)

use super::Context;
use crate::cli::Cli;
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io;
use tracing::info;

/// Create the database and apply the schema
pub fn cmd_init(ctx: &Context) -> Result<()> {
    info!("Initializing plinth database at: {}", ctx.db_path);
    plinth::db::init(&ctx.db_path)?;
    println!("Database initialized successfully at: {}", ctx.db_path);

    if !ctx.config.snapshots.is_configured() {
        println!("Note: no [snapshots] create command configured; update and uninstall will be refused");
    }
    Ok(())
}

/// Print shell completions to stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "plinth", &mut io::stdout());
    Ok(())
}
