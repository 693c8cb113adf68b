// src/orchestrator/batch.rs

//! Multi-component runs
//!
//! A batch is planned once, then executed component by component in plan
//! order. The first failure stops the batch; components already committed
//! stay committed and the rest are reported as not attempted.

use super::{OperationReport, Orchestrator};
use crate::db::models::OperationKind;
use crate::error::{Error, Result};
use crate::progress::ProgressEvent;
use crate::resolver::Planner;
use tracing::info;

/// The component that stopped a batch
#[derive(Debug)]
pub struct BatchFailure {
    pub component: String,
    pub error: Error,
}

/// Outcome of a batch run
#[derive(Debug)]
pub struct BatchReport {
    pub operation: OperationKind,
    /// Execution order as planned
    pub order: Vec<String>,
    pub completed: Vec<OperationReport>,
    pub failure: Option<BatchFailure>,
    pub not_attempted: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Exit code of the failure, 0 when everything committed
    pub fn exit_code(&self) -> u8 {
        self.failure.as_ref().map_or(0, |f| f.error.exit_code())
    }

    /// Completed reports, or the error that stopped the batch
    pub fn into_result(self) -> Result<Vec<OperationReport>> {
        match self.failure {
            Some(failure) => Err(failure.error),
            None => Ok(self.completed),
        }
    }
}

impl Orchestrator<'_> {
    /// Plan and run `operation` over `names`
    ///
    /// Planning errors (unknown names, cycles) are returned before anything
    /// runs. Execution failures end up in [`BatchReport::failure`].
    pub fn run_batch(&self, operation: OperationKind, names: &[String]) -> Result<BatchReport> {
        let plan = Planner::new(self.registry).plan(operation, names)?;
        info!("Running {} of {} components", operation, plan.order.len());

        self.progress.report(&ProgressEvent::BatchStarted {
            operation,
            components: plan.order.clone(),
        });

        let total = plan.order.len();
        let mut report = BatchReport {
            operation,
            order: plan.order.clone(),
            completed: Vec::with_capacity(total),
            failure: None,
            not_attempted: Vec::new(),
        };

        for (index, name) in plan.order.iter().enumerate() {
            self.progress.report(&ProgressEvent::ComponentStarted {
                component: name.clone(),
                operation,
                position: index + 1,
                total,
            });

            match self.run(operation, name) {
                Ok(done) => report.completed.push(done),
                Err(error) => {
                    report.failure = Some(BatchFailure {
                        component: name.clone(),
                        error,
                    });
                    report.not_attempted = plan.order[index + 1..].to_vec();
                    break;
                }
            }
        }

        self.progress.report(&ProgressEvent::BatchFinished {
            completed: report.completed.len(),
            failed: report.failure.as_ref().map(|f| f.component.clone()),
            not_attempted: report.not_attempted.len(),
        });

        Ok(report)
    }
}
