// src/lib.rs

//! Plinth component engine
//!
//! Keeps a registry of installable components, orders them by their
//! declared dependencies and drives install/update/uninstall through a
//! backup-first state machine with rollback.
//!
//! # Architecture
//!
//! - Database-first: registry, backup links and installation history live
//!   in one SQLite file
//! - Planning before execution: unknown names and dependency cycles are
//!   rejected before anything is written
//! - Backup-gated: update and uninstall never proceed without a snapshot
//! - Pluggable edges: snapshots (`SnapshotFacility`) and the apply step
//!   (`ComponentApplier`) are traits

pub mod apply;
pub mod backup;
pub mod config;
pub mod db;
mod error;
pub mod exec;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod version;

pub use apply::{ComponentApplier, ManifestApplier};
pub use backup::{BackupLinker, CommandSnapshots, SnapshotError, SnapshotFacility, UnavailableSnapshots};
pub use config::PlinthConfig;
pub use error::{Error, Result};
pub use manifest::ComponentManifest;
pub use orchestrator::{
    BatchFailure, BatchReport, OperationReport, OperationState, Orchestrator, OrchestratorOptions,
};
pub use progress::{LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use registry::{MemoryRegistry, RegistryFilter, RegistryStore, SqliteRegistry};
pub use resolver::{DependencyGraph, Plan, Planner};
