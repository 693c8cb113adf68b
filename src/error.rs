// src/error.rs

//! Error types for the component engine
//!
//! Planning errors (`CycleDetected`, `UnknownComponent`, strict-mode
//! `UnmetDependency`) never touch persisted state. Execution errors are
//! recorded as a failed installation step before they reach the caller.

use thiserror::Error;

/// Errors produced by the registry, planner and orchestrator
#[derive(Error, Debug)]
pub enum Error {
    /// A circular dependency chain, closed (first name repeated at the end)
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    /// A requested component is not registered
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// One or more dependencies are missing or too old
    #[error("Unmet dependencies for '{component}': {}", .problems.join("; "))]
    UnmetDependency {
        component: String,
        problems: Vec<String>,
    },

    /// No snapshot could be obtained; destructive operation refused
    #[error("Backup unavailable for '{component}': {reason}")]
    BackupUnavailable { component: String, reason: String },

    /// The external apply step reported failure
    #[error("Apply failed for '{component}': {reason}")]
    ApplyFailed { component: String, reason: String },

    /// The component footprint does not match the target after apply
    #[error("Verification failed for '{component}': expected {expected}, found {actual}")]
    VerificationFailed {
        component: String,
        expected: String,
        actual: String,
    },

    /// Restoring the pre-operation snapshot failed
    #[error(
        "Rollback failed for '{component}' (snapshot {snapshot_id}): {reason}; manual intervention required"
    )]
    RollbackFailed {
        component: String,
        snapshot_id: String,
        reason: String,
    },

    /// Installed components still depend on a component being removed
    #[error("Component '{component}' is required by: {}", .dependents.join(", "))]
    RequiredByDependents {
        component: String,
        dependents: Vec<String>,
    },

    /// Component name outside `[a-z0-9_]{1,100}`
    #[error("Invalid component name '{0}': expected 1-100 characters of a-z, 0-9 or '_'")]
    InvalidName(String),

    /// Malformed semantic version or requirement
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    /// Manifest or record contents are inconsistent
    #[error("Invalid component definition for '{component}': {reason}")]
    InvalidManifest { component: String, reason: String },

    /// Operation not allowed in the component's current state
    #[error("Cannot {operation} '{component}': {reason}")]
    InvalidState {
        operation: String,
        component: String,
        reason: String,
    },

    /// A record looked up by id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for this error
    ///
    /// - 1: planning or validation failure
    /// - 2: backup failure
    /// - 3: apply or verification failure (possibly rolled back)
    /// - 4: rollback failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::BackupUnavailable { .. } => 2,
            Error::ApplyFailed { .. } | Error::VerificationFailed { .. } => 3,
            Error::RollbackFailed { .. } => 4,
            _ => 1,
        }
    }
}

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;
