// src/orchestrator/state.rs

//! Operation state machine
//!
//! ```text
//! PLANNING -> VALIDATING -> BACKING_UP -> APPLYING -> VERIFYING -> COMMITTED
//!                 |              |            |            |
//!                 +---> FAILED <-+            +------------+--> ROLLED_BACK / FAILED
//! ```
//!
//! Install skips `BACKING_UP`. Once a backup exists, failures end in
//! `ROLLED_BACK` (or `FAILED` if the restore itself fails).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Planning,
    Validating,
    BackingUp,
    Applying,
    Verifying,
    Committed,
    Failed,
    RolledBack,
}

impl OperationState {
    pub fn as_str(&self) -> &str {
        match self {
            OperationState::Planning => "planning",
            OperationState::Validating => "validating",
            OperationState::BackingUp => "backing_up",
            OperationState::Applying => "applying",
            OperationState::Verifying => "verifying",
            OperationState::Committed => "committed",
            OperationState::Failed => "failed",
            OperationState::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Committed | OperationState::Failed | OperationState::RolledBack
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperationState::Failed | OperationState::RolledBack)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Planning, Validating | Failed)
                | (Validating, BackingUp | Applying | Failed)
                | (BackingUp, Applying | Failed)
                | (Applying, Verifying | Failed | RolledBack)
                | (Verifying, Committed | Failed | RolledBack)
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
