// src/progress.rs

//! Shared progress tracking trait and implementations
//!
//! The orchestrator reports every batch, state transition and recorded
//! step as a [`ProgressEvent`]. Implementations decide where the events go:
//! - `SilentProgress`: drops everything (library default)
//! - `LogProgress`: forwards to tracing
//!
//! The CLI draws its own terminal bars on top of `LogProgress`.

use crate::db::models::{OperationKind, StepStatus, StepType};
use crate::orchestrator::OperationState;
use std::fmt;
use tracing::{debug, info, warn};

/// Events emitted while an operation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A batch is about to run in this order
    BatchStarted {
        operation: OperationKind,
        components: Vec<String>,
    },
    /// One component of the batch is starting (1-based position)
    ComponentStarted {
        component: String,
        operation: OperationKind,
        position: usize,
        total: usize,
    },
    /// The component's operation moved to a new state
    StateChanged {
        component: String,
        state: OperationState,
    },
    /// A step was appended to the installation record
    StepRecorded {
        component: String,
        step_type: StepType,
        status: StepStatus,
        name: String,
        message: Option<String>,
    },
    /// The component's operation reached a terminal state
    ComponentFinished {
        component: String,
        state: OperationState,
    },
    /// The batch stopped, either complete or at the first failure
    BatchFinished {
        completed: usize,
        failed: Option<String>,
        not_attempted: usize,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::BatchStarted { operation, components } => {
                write!(f, "Planned {operation} of {}: {}", components.len(), components.join(", "))
            }
            ProgressEvent::ComponentStarted {
                component,
                operation,
                position,
                total,
            } => write!(f, "[{position}/{total}] {operation} {component}"),
            ProgressEvent::StateChanged { component, state } => {
                write!(f, "  {component}: {state}")
            }
            ProgressEvent::StepRecorded {
                status,
                name,
                message,
                ..
            } => match message {
                Some(message) => write!(f, "    [{status}] {name}: {message}"),
                None => write!(f, "    [{status}] {name}"),
            },
            ProgressEvent::ComponentFinished { component, state } => {
                write!(f, "  {component}: finished ({state})")
            }
            ProgressEvent::BatchFinished {
                completed,
                failed,
                not_attempted,
            } => match failed {
                Some(failed) => write!(
                    f,
                    "Stopped: {completed} completed, {failed} failed, {not_attempted} not attempted"
                ),
                None => write!(f, "Done: {completed} completed"),
            },
        }
    }
}

/// Core trait for progress tracking
///
/// Implementations must be thread-safe (Send + Sync) so a tracker can be
/// shared behind an `Arc`.
pub trait ProgressTracker: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Silent progress tracker (no-op)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressTracker for SilentProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Logging progress tracker
///
/// Batch and terminal events go to `info` (failures to `warn`), state
/// changes and steps to `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressTracker for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StateChanged { .. } | ProgressEvent::StepRecorded { .. } => {
                debug!("{}", event)
            }
            ProgressEvent::ComponentFinished { state, .. } if state.is_failure() => {
                warn!("{}", event)
            }
            ProgressEvent::BatchFinished {
                failed: Some(_), ..
            } => warn!("{}", event),
            _ => info!("{}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = ProgressEvent::ComponentStarted {
            component: "reporting".to_string(),
            operation: OperationKind::Update,
            position: 2,
            total: 3,
        };
        assert_eq!(event.to_string(), "[2/3] update reporting");

        let event = ProgressEvent::StepRecorded {
            component: "reporting".to_string(),
            step_type: StepType::Backup,
            status: StepStatus::Failed,
            name: "Create backup".to_string(),
            message: Some("facility unavailable".to_string()),
        };
        assert_eq!(event.to_string(), "    [failed] Create backup: facility unavailable");

        let event = ProgressEvent::BatchFinished {
            completed: 1,
            failed: Some("ui".to_string()),
            not_attempted: 2,
        };
        assert_eq!(
            event.to_string(),
            "Stopped: 1 completed, ui failed, 2 not attempted"
        );
    }

    #[test]
    fn test_silent_and_log_accept_everything() {
        let event = ProgressEvent::BatchFinished {
            completed: 0,
            failed: None,
            not_attempted: 0,
        };
        SilentProgress.report(&event);
        LogProgress.report(&event);
    }
}
