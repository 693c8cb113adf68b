// src/commands/plan.rs
//! Planning and dependency-check commands

use super::Context;
use anyhow::Result;
use plinth::db::models::OperationKind;
use plinth::registry::SqliteRegistry;
use plinth::resolver::{Planner, validator};

/// Print the execution order for `components` without running anything
pub fn cmd_plan(ctx: &Context, operation: OperationKind, components: &[String]) -> Result<()> {
    let conn = ctx.open()?;
    let store = SqliteRegistry::new(&conn);
    let plan = Planner::new(&store).plan(operation, components)?;

    if plan.is_empty() {
        println!("Nothing to do.");
    } else {
        println!("{}", plan);
    }
    Ok(())
}

/// Validate one component's dependencies and persist the result
pub fn cmd_check_deps(ctx: &Context, component: &str) -> Result<()> {
    let conn = ctx.open()?;
    let store = SqliteRegistry::new(&conn);
    let report = validator::validate(&store, component)?;

    print!("{}", report);
    if !report.is_met() {
        return Err(report.to_error().into());
    }
    Ok(())
}
