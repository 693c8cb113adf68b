// src/commands/component.rs
//! Registry commands: register, unregister, list, whatbreaks

use super::Context;
use crate::cli::StatusArg;
use anyhow::{Context as _, Result};
use plinth::db::models::ComponentStatus;
use plinth::manifest::ComponentManifest;
use plinth::registry::{self, RegistryFilter, RegistryStore, SqliteRegistry};
use plinth::resolver::Planner;
use std::fs;
use std::path::Path;
use tracing::info;

/// Register the component in `path`
pub fn cmd_register(ctx: &Context, path: &str) -> Result<()> {
    let dir = fs::canonicalize(Path::new(path))
        .with_context(|| format!("Component directory not found: {}", path))?;
    let manifest = ComponentManifest::load(&dir)?;
    let dir = dir.to_string_lossy().into_owned();
    info!("Registering {} from {}", manifest.name, dir);

    let conn = ctx.open()?;
    let store = SqliteRegistry::new(&conn);
    let record = registry::register(&store, manifest.to_record(&dir)?)?;

    println!("Registered {} {} ({})", record.name, record.current_version, record.path);
    if let Some(installed) = &record.installed_version {
        println!("  Installed: {}", installed);
    }
    for warning in &record.dependencies_warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

pub fn cmd_unregister(ctx: &Context, name: &str) -> Result<()> {
    let conn = ctx.open()?;
    registry::unregister(&SqliteRegistry::new(&conn), name)?;
    println!("Unregistered {}", name);
    Ok(())
}

/// List registry records
pub fn cmd_list(ctx: &Context, status: Option<StatusArg>, updates: bool) -> Result<()> {
    let conn = ctx.open()?;
    let filter = RegistryFilter {
        status: status.map(|s| match s {
            StatusArg::Active => ComponentStatus::Active,
            StatusArg::Inactive => ComponentStatus::Inactive,
            StatusArg::Error => ComponentStatus::Error,
        }),
        installed_only: updates,
    };

    let records: Vec<_> = SqliteRegistry::new(&conn)
        .list(&filter)?
        .into_iter()
        .filter(|record| !updates || record.has_update())
        .collect();

    if records.is_empty() {
        println!("No components found.");
        return Ok(());
    }

    for record in &records {
        let installed = record.installed_version.as_deref().unwrap_or("-");
        print!(
            "{} {} (installed: {}) [{}, deps {}]",
            record.name, record.current_version, installed, record.status, record.dependencies_status
        );
        if record.has_update() {
            print!(" update available");
        }
        println!();
        for warning in &record.dependencies_warnings {
            println!("  warning: {}", warning);
        }
    }
    println!("\nTotal: {} component(s)", records.len());
    Ok(())
}

/// Show the transitive reverse dependencies of a component
pub fn cmd_whatbreaks(ctx: &Context, name: &str) -> Result<()> {
    let conn = ctx.open()?;
    let store = SqliteRegistry::new(&conn);
    let breaking = Planner::new(&store).what_breaks(name)?;

    if breaking.is_empty() {
        println!("Nothing depends on {}", name);
    } else {
        println!("Components depending on {}:", name);
        for dependent in &breaking {
            println!("  {}", dependent);
        }
        println!("\nTotal: {} component(s)", breaking.len());
    }
    Ok(())
}
