// src/commands/backup.rs
//! Backup link commands

use super::Context;
use anyhow::Result;
use chrono::Utc;
use plinth::backup::{self, BackupLinker};
use plinth::db::models::{BackupOperationKind, RetentionPolicy};
use plinth::registry::{RegistryStore, SqliteRegistry};
use plinth::Error;

/// Take a manual backup of an installed component
pub fn cmd_backup_create(ctx: &Context, component: &str, reason: Option<&str>, important: bool) -> Result<()> {
    let conn = ctx.open()?;
    let record = SqliteRegistry::new(&conn)
        .get(component)?
        .ok_or_else(|| Error::UnknownComponent(component.to_string()))?;
    let Some(installed) = record.installed_version.as_deref() else {
        return Err(Error::InvalidState {
            operation: "back up".to_string(),
            component: component.to_string(),
            reason: "not installed".to_string(),
        }
        .into());
    };

    let snapshots = backup::from_config(&ctx.config.snapshots);
    let linker = BackupLinker::new(&conn, snapshots.as_ref(), &ctx.config.backup);
    let link = linker.create_backup(
        component,
        installed,
        BackupOperationKind::Manual,
        reason.unwrap_or("manual backup"),
        important,
    )?;

    println!("Created snapshot {} for {} {}", link.snapshot_id, component, installed);
    if let Some(expires) = link.expires_at {
        println!("  Expires: {}", expires.to_rfc3339());
    }
    Ok(())
}

/// List backup links, newest first
pub fn cmd_backup_list(ctx: &Context, component: Option<&str>) -> Result<()> {
    let conn = ctx.open()?;
    let snapshots = backup::from_config(&ctx.config.snapshots);
    let linker = BackupLinker::new(&conn, snapshots.as_ref(), &ctx.config.backup);
    let links = linker.list(component)?;

    if links.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    for link in &links {
        let created = link
            .created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "?".to_string());
        print!(
            "  {} {} {} [{}] {} - {}",
            link.snapshot_id, link.component_name, link.version, link.operation_kind, created, link.reason
        );
        if link.is_important {
            print!(" (important)");
        } else if link.retention_policy == RetentionPolicy::AutoCleanup
            && let Some(expires) = link.expires_at
        {
            print!(" (expires {})", expires.to_rfc3339());
        }
        println!();
        if let Some(info) = linker.snapshot_info(link) {
            println!("      {}", info);
        }
    }
    println!("\nTotal: {} backup(s)", links.len());
    Ok(())
}

/// Delete expired auto-cleanup links
pub fn cmd_backup_prune(ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let snapshots = backup::from_config(&ctx.config.snapshots);
    let linker = BackupLinker::new(&conn, snapshots.as_ref(), &ctx.config.backup);
    let pruned = linker.cleanup_expired(Utc::now())?;

    if pruned.is_empty() {
        println!("No expired backups.");
    } else {
        for link in &pruned {
            println!("  Pruned {} ({} {})", link.snapshot_id, link.component_name, link.version);
        }
        println!("\nPruned {} backup(s)", pruned.len());
    }
    Ok(())
}

/// Restore a snapshot on operator request
///
/// The registry is not changed; the operator reconciles it afterwards.
pub fn cmd_backup_restore(ctx: &Context, snapshot_id: &str) -> Result<()> {
    let conn = ctx.open()?;
    let snapshots = backup::from_config(&ctx.config.snapshots);
    let linker = BackupLinker::new(&conn, snapshots.as_ref(), &ctx.config.backup);
    let link = linker.restore_snapshot(snapshot_id)?;

    println!(
        "Restored snapshot {} ({} {})",
        link.snapshot_id, link.component_name, link.version
    );
    Ok(())
}
