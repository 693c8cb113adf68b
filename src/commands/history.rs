// src/commands/history.rs
//! Installation history

use super::Context;
use anyhow::Result;
use plinth::db::models::InstallationRecord;

/// Show installation records with their steps, newest first
pub fn cmd_history(ctx: &Context, component: Option<&str>, limit: usize) -> Result<()> {
    let conn = ctx.open()?;
    let records = InstallationRecord::list_recent(&conn, component, limit)?;

    if records.is_empty() {
        println!("No installation history.");
        return Ok(());
    }

    for record in &records {
        let from = record.from_version.as_deref().unwrap_or("-");
        println!(
            "[{}] {} {} {} {} -> {} ({})",
            record.id,
            record.started_at.to_rfc3339(),
            record.operation,
            record.component_name,
            from,
            record.to_version,
            record.status
        );
        for step in &record.steps {
            match &step.message {
                Some(message) => println!("    {}. [{}] {}: {}", step.step_number, step.status, step.name, message),
                None => println!("    {}. [{}] {}", step.step_number, step.status, step.name),
            }
        }
        for warning in &record.warnings {
            println!("    warning: {}", warning);
        }
        if let Some(error) = &record.error {
            println!("    error: {}", error);
        }
    }
    println!("\nTotal: {} record(s)", records.len());
    Ok(())
}
