// src/orchestrator/mod.rs

//! Install/update/uninstall orchestration
//!
//! Drives one component at a time through
//! `validating -> backing_up -> applying -> verifying -> committed`,
//! writing an [`InstallationRecord`] step for every stage. Collaborators are
//! injected: the registry, the snapshot facility (through [`BackupLinker`])
//! and the component applier.
//!
//! Guarantees:
//! - update and uninstall never reach `applying` without a recorded backup
//! - the component record is written once, in the final commit upsert; a
//!   failed operation leaves it untouched
//! - failures after `applying` has started and before the commit upsert
//!   restore the snapshot and end in `rolled_back`; a failed restore surfaces
//!   as [`Error::RollbackFailed`]
//! - a successful commit upsert is final; nothing after it rolls back

mod batch;
mod state;

pub use batch::{BatchFailure, BatchReport};
pub use state::OperationState;

use crate::apply::ComponentApplier;
use crate::backup::{BackupLinker, SnapshotFacility};
use crate::config::BackupSection;
use crate::db::models::{
    BackupLinkRecord, BackupOperationKind, ComponentRecord, ComponentStatus, InstallationRecord,
    InstallationStatus, InstallationStep, OperationKind, StepStatus, StepType,
};
use crate::error::{Error, Result};
use crate::progress::{ProgressEvent, ProgressTracker, SilentProgress};
use crate::registry::RegistryStore;
use crate::resolver::validator;
use crate::version;
use rusqlite::Connection;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Caller-selected behavior for an orchestrated operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Proceed despite unmet dependencies (or installed dependents on
    /// uninstall), carrying the warnings into the installation record
    pub allow_unmet_deps: bool,
    /// Flag backups taken by this run as important
    pub important_backups: bool,
}

/// Result of one successfully committed component operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub component: String,
    pub operation: OperationKind,
    pub from_version: Option<String>,
    pub to_version: String,
    pub state: OperationState,
    pub installation_id: String,
    pub snapshot_id: Option<String>,
    pub warnings: Vec<String>,
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from_version.as_deref().unwrap_or("-");
        write!(
            f,
            "{} {}: {} -> {} ({})",
            self.operation, self.component, from, self.to_version, self.state
        )?;
        if let Some(snapshot) = &self.snapshot_id {
            write!(f, " [snapshot {snapshot}]")?;
        }
        for warning in &self.warnings {
            write!(f, "\n  warning: {warning}")?;
        }
        Ok(())
    }
}

/// In-flight state of one component operation
struct Operation {
    kind: OperationKind,
    component: ComponentRecord,
    target_version: String,
    history: InstallationRecord,
    state: OperationState,
    backup: Option<BackupLinkRecord>,
}

/// Runs install/update/uninstall operations
pub struct Orchestrator<'a> {
    conn: &'a Connection,
    registry: &'a dyn RegistryStore,
    linker: BackupLinker<'a>,
    applier: &'a dyn ComponentApplier,
    progress: Arc<dyn ProgressTracker>,
    options: OrchestratorOptions,
}

impl<'a> Orchestrator<'a> {
    /// `conn` holds installation history and backup links
    pub fn new(
        conn: &'a Connection,
        registry: &'a dyn RegistryStore,
        snapshots: &'a dyn SnapshotFacility,
        applier: &'a dyn ComponentApplier,
        backup_settings: &BackupSection,
    ) -> Self {
        Self {
            conn,
            registry,
            linker: BackupLinker::new(conn, snapshots, backup_settings),
            applier,
            progress: Arc::new(SilentProgress),
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn install(&self, name: &str) -> Result<OperationReport> {
        self.run(OperationKind::Install, name)
    }

    pub fn update(&self, name: &str) -> Result<OperationReport> {
        self.run(OperationKind::Update, name)
    }

    pub fn uninstall(&self, name: &str) -> Result<OperationReport> {
        self.run(OperationKind::Uninstall, name)
    }

    /// Run one operation on one component
    ///
    /// An unknown name fails before any history is written. Every other
    /// failure is recorded on the installation record first.
    pub fn run(&self, kind: OperationKind, name: &str) -> Result<OperationReport> {
        let component = self
            .registry
            .get(name)?
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))?;

        let target_version = match kind {
            OperationKind::Uninstall => component
                .installed_version
                .clone()
                .unwrap_or_else(|| component.current_version.clone()),
            OperationKind::Install | OperationKind::Update => component.current_version.clone(),
        };

        let history = InstallationRecord::begin(
            name,
            kind,
            component.installed_version.clone(),
            target_version.clone(),
        );
        history.insert(self.conn)?;
        debug!("Started {} of {} ({})", kind, name, history.id);

        let mut op = Operation {
            kind,
            component,
            target_version,
            history,
            state: OperationState::Planning,
            backup: None,
        };

        if let Err(e) = self.execute(&mut op) {
            if op.history.is_finished() || op.state == OperationState::Committed {
                return Err(e);
            }
            // History write failed mid-stage; close the record the same way
            let step_type = match op.state {
                OperationState::BackingUp => StepType::Backup,
                OperationState::Applying => StepType::Apply,
                OperationState::Verifying => StepType::Verify,
                OperationState::Committed => StepType::RegistryCommit,
                _ => StepType::Validation,
            };
            return Err(self.abort(&mut op, step_type, "Record progress", e));
        }

        Ok(OperationReport {
            component: op.component.name.clone(),
            operation: op.kind,
            from_version: op.history.from_version.clone(),
            to_version: op.target_version.clone(),
            state: op.state,
            installation_id: op.history.id.clone(),
            snapshot_id: op.backup.as_ref().map(|link| link.snapshot_id.clone()),
            warnings: op.history.warnings.clone(),
        })
    }

    fn execute(&self, op: &mut Operation) -> Result<()> {
        self.enter(op, OperationState::Validating)?;

        if let Err(e) = self.validate_request(op) {
            return Err(self.abort(op, StepType::Validation, "Validate request", e));
        }
        let summary = match &op.component.installed_version {
            Some(installed) => format!("{} {} -> {}", op.kind, installed, op.target_version),
            None => format!("{} {}", op.kind, op.target_version),
        };
        self.record_step(
            op,
            InstallationStep::new(StepType::Validation, "Validate request", StepStatus::Succeeded)
                .with_message(summary),
        )?;

        match op.kind {
            OperationKind::Install | OperationKind::Update => self.check_dependencies(op)?,
            OperationKind::Uninstall => self.check_dependents(op)?,
        }

        if op.kind.is_destructive() {
            self.enter(op, OperationState::BackingUp)?;
            self.back_up(op)?;
        } else {
            self.record_step(
                op,
                InstallationStep::new(StepType::Backup, "Create backup", StepStatus::Skipped)
                    .with_message("install does not modify an existing installation"),
            )?;
        }

        self.enter(op, OperationState::Applying)?;
        if let Err(e) = self
            .applier
            .apply(op.kind, &op.component, &op.target_version)
        {
            let e = match e {
                Error::ApplyFailed { .. } => e,
                other => Error::ApplyFailed {
                    component: op.component.name.clone(),
                    reason: other.to_string(),
                },
            };
            return Err(self.abort(op, StepType::Apply, "Apply component", e));
        }
        self.record_step(
            op,
            InstallationStep::new(StepType::Apply, "Apply component", StepStatus::Succeeded),
        )?;

        self.enter(op, OperationState::Verifying)?;
        if let Err(e) = self.verify(op) {
            return Err(self.abort(op, StepType::Verify, "Verify footprint", e));
        }
        self.record_step(
            op,
            InstallationStep::new(StepType::Verify, "Verify footprint", StepStatus::Succeeded),
        )?;

        self.commit(op)
    }

    /// Kind-specific preconditions on the component record
    fn validate_request(&self, op: &Operation) -> Result<()> {
        let component = &op.component;
        component.validate()?;

        let invalid = |reason: String| Error::InvalidState {
            operation: op.kind.to_string(),
            component: component.name.clone(),
            reason,
        };

        match (op.kind, &component.installed_version) {
            (OperationKind::Install, Some(installed)) => {
                Err(invalid(format!("already installed at version {installed}")))
            }
            (OperationKind::Install, None) => Ok(()),
            (OperationKind::Update | OperationKind::Uninstall, None) => {
                Err(invalid("not installed".to_string()))
            }
            (OperationKind::Update, Some(installed)) => {
                if version::is_newer(&component.current_version, installed) {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "no newer version available (installed {installed}, available {})",
                        component.current_version
                    )))
                }
            }
            (OperationKind::Uninstall, Some(_)) => Ok(()),
        }
    }

    /// Declared dependencies must be met unless warn-only mode is on
    fn check_dependencies(&self, op: &mut Operation) -> Result<()> {
        let report = match validator::check(self.registry, &op.component) {
            Ok(report) => report,
            Err(e) => return Err(self.abort(op, StepType::DependencyCheck, "Check dependencies", e)),
        };

        if report.is_met() {
            let message = format!("{} dependencies met", report.checks.len());
            return self.record_step(
                op,
                InstallationStep::new(StepType::DependencyCheck, "Check dependencies", StepStatus::Succeeded)
                    .with_message(message),
            );
        }

        if !self.options.allow_unmet_deps {
            return Err(self.abort(
                op,
                StepType::DependencyCheck,
                "Check dependencies",
                report.to_error(),
            ));
        }

        self.continue_with_warnings(op, "Check dependencies", report.warnings())
    }

    /// Installed components outside the batch must not depend on the one
    /// being removed
    ///
    /// Batch members are removed dependents-first, so by the time a
    /// component is reached its in-batch dependents are already gone.
    fn check_dependents(&self, op: &mut Operation) -> Result<()> {
        let dependents = match self.registry.dependents_of(&op.component.name) {
            Ok(dependents) => dependents,
            Err(e) => return Err(self.abort(op, StepType::DependencyCheck, "Check dependents", e)),
        };
        let blocking: Vec<String> = dependents
            .into_iter()
            .filter(ComponentRecord::is_installed)
            .map(|record| record.name)
            .collect();

        if blocking.is_empty() {
            return self.record_step(
                op,
                InstallationStep::new(StepType::DependencyCheck, "Check dependents", StepStatus::Succeeded)
                    .with_message("no installed dependents"),
            );
        }

        if !self.options.allow_unmet_deps {
            let e = Error::RequiredByDependents {
                component: op.component.name.clone(),
                dependents: blocking,
            };
            return Err(self.abort(op, StepType::DependencyCheck, "Check dependents", e));
        }

        let warnings = blocking
            .iter()
            .map(|dependent| format!("{dependent} depends on {}", op.component.name))
            .collect();
        self.continue_with_warnings(op, "Check dependents", warnings)
    }

    fn continue_with_warnings(&self, op: &mut Operation, step_name: &str, warnings: Vec<String>) -> Result<()> {
        for warning in &warnings {
            warn!("{}: {}", op.component.name, warning);
        }
        op.history.set_warnings(self.conn, warnings.clone())?;
        self.record_step(
            op,
            InstallationStep::new(StepType::DependencyCheck, step_name, StepStatus::Succeeded)
                .with_message(format!("proceeding with {} warnings", warnings.len()))
                .with_data(serde_json::json!({ "warnings": warnings })),
        )
    }

    /// Snapshot the installed version; failure blocks the operation
    fn back_up(&self, op: &mut Operation) -> Result<()> {
        let (kind, reason) = match op.kind {
            OperationKind::Update => (
                BackupOperationKind::PreUpdate,
                format!("before update to {}", op.target_version),
            ),
            _ => (BackupOperationKind::PreUninstall, "before uninstall".to_string()),
        };
        let installed = op
            .component
            .installed_version
            .clone()
            .unwrap_or_else(|| op.target_version.clone());

        let link = match self.linker.create_backup(
            &op.component.name,
            &installed,
            kind,
            &reason,
            self.options.important_backups,
        ) {
            Ok(link) => link,
            Err(e) => return Err(self.abort(op, StepType::Backup, "Create backup", e)),
        };

        let snapshot_id = link.snapshot_id.clone();
        let link_id = link.id;
        op.backup = Some(link);

        if let Some(id) = link_id
            && let Err(e) = op.history.attach_backup(self.conn, id)
        {
            return Err(self.abort(op, StepType::Backup, "Create backup", e));
        }

        self.record_step(
            op,
            InstallationStep::new(StepType::Backup, "Create backup", StepStatus::Succeeded)
                .with_message(format!("snapshot {snapshot_id}"))
                .with_data(serde_json::json!({ "snapshot_id": snapshot_id, "backup_link_id": link_id })),
        )
    }

    /// Compare the applied footprint with the target
    fn verify(&self, op: &Operation) -> Result<()> {
        let expected = match op.kind {
            OperationKind::Uninstall => None,
            OperationKind::Install | OperationKind::Update => Some(op.target_version.as_str()),
        };
        let describe = |v: Option<&str>| v.map_or_else(|| "<absent>".to_string(), str::to_string);

        let actual = self.applier.footprint(&op.component).map_err(|e| Error::VerificationFailed {
            component: op.component.name.clone(),
            expected: describe(expected),
            actual: format!("<unreadable: {e}>"),
        })?;

        let matches = match (expected, actual.as_deref()) {
            (None, None) => true,
            (Some(expected), Some(actual)) => {
                version::compare(expected, actual).is_ok_and(|ord| ord.is_eq())
            }
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            Err(Error::VerificationFailed {
                component: op.component.name.clone(),
                expected: describe(expected),
                actual: describe(actual.as_deref()),
            })
        }
    }

    /// Single registry write: installed version, status and derived
    /// dependency fields together
    fn commit(&self, op: &mut Operation) -> Result<()> {
        let mut updated = op.component.clone();
        match op.kind {
            OperationKind::Install | OperationKind::Update => {
                updated.installed_version = Some(op.target_version.clone());
                updated.status = ComponentStatus::Active;
            }
            OperationKind::Uninstall => {
                updated.installed_version = None;
                updated.status = ComponentStatus::Inactive;
            }
        }

        let written = validator::check(self.registry, &updated).and_then(|report| {
            report.apply_to(&mut updated);
            self.registry.upsert(&mut updated)
        });
        if let Err(e) = written {
            let e = Error::ApplyFailed {
                component: op.component.name.clone(),
                reason: format!("registry commit failed: {e}"),
            };
            return Err(self.abort(op, StepType::RegistryCommit, "Commit registry", e));
        }

        // The registry now reflects the new footprint; from here on nothing
        // may roll back, so history failures are only logged
        op.component = updated;
        if let Err(e) = self.enter(op, OperationState::Committed) {
            error!("{}", e);
        }

        let step = InstallationStep::new(StepType::RegistryCommit, "Commit registry", StepStatus::Succeeded)
            .with_message(format!("status {}", op.component.status));
        if let Err(e) = self.record_step(op, step) {
            error!("Failed to record commit for {}: {}", op.component.name, e);
        }
        if let Err(e) = op.history.finish(self.conn, InstallationStatus::Succeeded, None) {
            error!("Failed to finalize history for {}: {}", op.component.name, e);
        }

        info!(
            "{} of {} {} committed",
            op.kind, op.component.name, op.target_version
        );
        self.finished(op);

        match validator::revalidate_dependents(self.registry, &op.component.name) {
            Ok(refreshed) if !refreshed.is_empty() => {
                debug!("Re-validated dependents: {}", refreshed.join(", "));
            }
            Ok(_) => {}
            Err(e) => warn!(
                "Could not re-validate dependents of {}: {}",
                op.component.name, e
            ),
        }

        Ok(())
    }

    /// Record the failed step, roll back if anything may have been applied,
    /// finalize the history and return the error to surface
    fn abort(&self, op: &mut Operation, step_type: StepType, step_name: &str, cause: Error) -> Error {
        let step = InstallationStep::new(step_type, step_name, StepStatus::Failed)
            .with_message(cause.to_string());
        if let Err(e) = self.record_step(op, step) {
            error!("Failed to record step for {}: {}", op.component.name, e);
        }

        let mutated = matches!(op.state, OperationState::Applying | OperationState::Verifying);
        let link = if mutated { op.backup.clone() } else { None };

        let (state, status, message, surfaced) = match link {
            Some(link) => match self.linker.restore(&link) {
                Ok(()) => {
                    let step = InstallationStep::new(StepType::Rollback, "Restore snapshot", StepStatus::Succeeded)
                        .with_message(format!("restored snapshot {}", link.snapshot_id));
                    if let Err(e) = self.record_step(op, step) {
                        error!("Failed to record rollback for {}: {}", op.component.name, e);
                    }
                    warn!("{} rolled back: {}", op.component.name, cause);
                    let message = cause.to_string();
                    (OperationState::RolledBack, InstallationStatus::RolledBack, message, cause)
                }
                Err(rollback_error) => {
                    let step = InstallationStep::new(StepType::Rollback, "Restore snapshot", StepStatus::Failed)
                        .with_message(rollback_error.to_string());
                    if let Err(e) = self.record_step(op, step) {
                        error!("Failed to record rollback for {}: {}", op.component.name, e);
                    }
                    error!("{}", rollback_error);
                    let message = format!("{cause}; {rollback_error}");
                    (OperationState::Failed, InstallationStatus::Failed, message, rollback_error)
                }
            },
            None => {
                warn!("{} of {} failed: {}", op.kind, op.component.name, cause);
                let message = cause.to_string();
                (OperationState::Failed, InstallationStatus::Failed, message, cause)
            }
        };

        if let Err(e) = self.enter(op, state) {
            error!("{}", e);
        }
        if let Err(e) = op.history.finish(self.conn, status, Some(message)) {
            error!("Failed to finalize history for {}: {}", op.component.name, e);
        }
        self.finished(op);

        surfaced
    }

    fn enter(&self, op: &mut Operation, next: OperationState) -> Result<()> {
        if !op.state.can_transition_to(next) {
            return Err(Error::InvalidState {
                operation: op.kind.to_string(),
                component: op.component.name.clone(),
                reason: format!("illegal transition {} -> {}", op.state, next),
            });
        }
        debug!("{}: {} -> {}", op.component.name, op.state, next);
        op.state = next;
        self.progress.report(&ProgressEvent::StateChanged {
            component: op.component.name.clone(),
            state: next,
        });
        Ok(())
    }

    fn record_step(&self, op: &mut Operation, step: InstallationStep) -> Result<()> {
        let event = ProgressEvent::StepRecorded {
            component: op.component.name.clone(),
            step_type: step.step_type,
            status: step.status,
            name: step.name.clone(),
            message: step.message.clone(),
        };
        op.history.append_step(self.conn, step)?;
        self.progress.report(&event);
        Ok(())
    }

    fn finished(&self, op: &Operation) {
        self.progress.report(&ProgressEvent::ComponentFinished {
            component: op.component.name.clone(),
            state: op.state,
        });
    }
}
