// src/commands/install.rs
//! Install, update and uninstall through the orchestrator

use super::Context;
use super::progress::InstallProgress;
use anyhow::Result;
use plinth::db::models::OperationKind;
use plinth::registry::SqliteRegistry;
use plinth::{BatchReport, ManifestApplier, Orchestrator, OrchestratorOptions, backup};
use std::sync::Arc;

/// Run `operation` over `components` in planned order
///
/// Stops at the first failure. The error returned carries the exit code.
pub fn cmd_run(
    ctx: &Context,
    operation: OperationKind,
    components: &[String],
    allow_unmet_deps: bool,
) -> Result<()> {
    let conn = ctx.open()?;
    let store = SqliteRegistry::new(&conn);
    let snapshots = backup::from_config(&ctx.config.snapshots);
    let applier = ManifestApplier::new();

    let options = OrchestratorOptions {
        allow_unmet_deps: allow_unmet_deps || ctx.config.install.allow_unmet_deps,
        important_backups: false,
    };
    let orchestrator = Orchestrator::new(&conn, &store, snapshots.as_ref(), &applier, &ctx.config.backup)
        .with_options(options)
        .with_progress(Arc::new(InstallProgress::new()));

    let report = orchestrator.run_batch(operation, components)?;

    for line in summary(&report) {
        println!("{}", line);
    }

    report.into_result()?;
    Ok(())
}

/// Final status of every component the batch reached
fn summary(report: &BatchReport) -> Vec<String> {
    let mut lines: Vec<String> = report.completed.iter().map(ToString::to_string).collect();
    if let Some(failure) = &report.failure {
        lines.push(format!("{} {}: failed: {}", report.operation, failure.component, failure.error));
    }
    if !report.not_attempted.is_empty() {
        lines.push(format!("Not attempted: {}", report.not_attempted.join(", ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth::{BatchFailure, Error, OperationReport, OperationState};

    fn committed(component: &str, warnings: Vec<String>) -> OperationReport {
        OperationReport {
            component: component.to_string(),
            operation: OperationKind::Install,
            from_version: None,
            to_version: "1.0.0".to_string(),
            state: OperationState::Committed,
            installation_id: format!("id-{component}"),
            snapshot_id: None,
            warnings,
        }
    }

    #[test]
    fn test_summary_lists_every_completed_component() {
        let report = BatchReport {
            operation: OperationKind::Install,
            order: vec!["base".to_string(), "reporting".to_string()],
            completed: vec![committed("base", vec![]), committed("reporting", vec![])],
            failure: None,
            not_attempted: vec![],
        };
        assert_eq!(
            summary(&report),
            vec![
                "install base: - -> 1.0.0 (committed)".to_string(),
                "install reporting: - -> 1.0.0 (committed)".to_string(),
            ]
        );
    }

    #[test]
    fn test_summary_names_failure_and_skipped() {
        let report = BatchReport {
            operation: OperationKind::Install,
            order: vec!["base".to_string(), "reporting".to_string(), "ui".to_string()],
            completed: vec![committed("base", vec![])],
            failure: Some(BatchFailure {
                component: "reporting".to_string(),
                error: Error::UnknownComponent("mailer".to_string()),
            }),
            not_attempted: vec!["ui".to_string()],
        };
        let lines = summary(&report);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("install reporting: failed: "));
        assert_eq!(lines[2], "Not attempted: ui");
    }
}
