// src/commands/progress.rs
//! Terminal progress for batch operations
//!
//! An overall bar counts finished components and a spinner below it shows
//! the current component and state. Step lines are printed above the bars.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use plinth::db::models::OperationKind;
use plinth::progress::{LogProgress, ProgressEvent, ProgressTracker};
use std::sync::Mutex;
use std::time::Duration;

struct Bars {
    overall: ProgressBar,
    status: ProgressBar,
}

/// Progress tracker drawing an overall bar plus a status spinner
///
/// Every event is also forwarded to [`LogProgress`] so `-v` runs keep a
/// tracing record of each step.
pub struct InstallProgress {
    multi: MultiProgress,
    bars: Mutex<Option<Bars>>,
}

impl InstallProgress {
    /// Draw to stderr (hidden automatically when it is not a terminal)
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(None),
        }
    }

    fn start(&self, operation: OperationKind, total: usize) -> Bars {
        let overall = ProgressBar::new(total as u64);
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        overall.set_message(verb(operation).to_string());

        let status = ProgressBar::new_spinner();
        status.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status.enable_steady_tick(Duration::from_millis(100));

        Bars {
            overall: self.multi.add(overall),
            status: self.multi.add(status),
        }
    }

    /// Print a line above the bars, or plainly when nothing is drawn
    fn line(&self, message: &str) {
        if self.multi.is_hidden() {
            println!("{}", message);
        } else if let Err(e) = self.multi.println(message) {
            tracing::debug!("Could not print progress line: {}", e);
        }
    }
}

impl Default for InstallProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker for InstallProgress {
    fn report(&self, event: &ProgressEvent) {
        LogProgress.report(event);

        let mut bars = match self.bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match event {
            ProgressEvent::BatchStarted { operation, components } => {
                *bars = Some(self.start(*operation, components.len()));
                self.line(&event.to_string());
            }
            ProgressEvent::ComponentStarted { component, .. } => {
                if let Some(bars) = bars.as_ref() {
                    bars.status.set_message(component.clone());
                }
                self.line(&event.to_string());
            }
            ProgressEvent::StateChanged { component, state } => {
                if let Some(bars) = bars.as_ref() {
                    bars.status.set_message(format!("{component}: {state}"));
                }
            }
            ProgressEvent::StepRecorded { .. } => self.line(&event.to_string()),
            ProgressEvent::ComponentFinished { state, .. } => {
                if let Some(bars) = bars.as_ref()
                    && !state.is_failure()
                {
                    bars.overall.inc(1);
                }
                self.line(&event.to_string());
            }
            ProgressEvent::BatchFinished { failed, .. } => {
                if let Some(bars) = bars.take() {
                    bars.status.finish_and_clear();
                    match failed {
                        Some(_) => bars.overall.abandon_with_message(event.to_string()),
                        None => bars.overall.finish_with_message(event.to_string()),
                    }
                }
                if self.multi.is_hidden() {
                    println!("{}", event);
                }
            }
        }
    }
}

fn verb(operation: OperationKind) -> &'static str {
    match operation {
        OperationKind::Install => "Installing",
        OperationKind::Update => "Updating",
        OperationKind::Uninstall => "Uninstalling",
    }
}
