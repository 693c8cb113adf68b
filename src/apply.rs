// src/apply.rs

//! Component apply boundary
//!
//! The engine does not know how a component's schema or files are put in
//! place. It calls a [`ComponentApplier`] and afterwards asks it what
//! version is actually in place (the footprint) to verify the result.

use crate::db::models::{ComponentRecord, OperationKind};
use crate::error::{Error, Result};
use crate::exec;
use crate::manifest::ComponentManifest;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Marker file recording the version applied to a component directory
pub const MARKER_FILE: &str = ".plinth-installed";

/// Component-specific apply logic
pub trait ComponentApplier {
    /// Bring `record` to `target_version` (install/update) or remove it
    fn apply(&self, operation: OperationKind, record: &ComponentRecord, target_version: &str) -> Result<()>;

    /// The version currently in place, `None` when nothing is installed
    fn footprint(&self, record: &ComponentRecord) -> Result<Option<String>>;
}

/// Applier driven by `component.toml` hooks and a marker file
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestApplier;

impl ManifestApplier {
    pub fn new() -> Self {
        Self
    }

    fn failed(record: &ComponentRecord, reason: impl Into<String>) -> Error {
        Error::ApplyFailed {
            component: record.name.clone(),
            reason: reason.into(),
        }
    }
}

impl ComponentApplier for ManifestApplier {
    fn apply(&self, operation: OperationKind, record: &ComponentRecord, target_version: &str) -> Result<()> {
        let dir = Path::new(&record.path);
        let manifest = ComponentManifest::load(dir).map_err(|e| Self::failed(record, e.to_string()))?;

        if let Some(hook) = manifest.hook(operation) {
            let from_version = record.installed_version.as_deref().unwrap_or("");
            exec::run(
                hook,
                Some(dir),
                &[
                    ("PLINTH_COMPONENT", record.name.as_str()),
                    ("PLINTH_OPERATION", operation.as_str()),
                    ("PLINTH_FROM_VERSION", from_version),
                    ("PLINTH_TO_VERSION", target_version),
                ],
                &record.name,
            )
            .map_err(|e| Self::failed(record, format!("{operation} hook: {e}")))?;
        } else {
            debug!("No {} hook for {}", operation, record.name);
        }

        let marker = dir.join(MARKER_FILE);
        match operation {
            OperationKind::Install | OperationKind::Update => {
                fs::write(&marker, format!("{target_version}\n")).map_err(|e| {
                    Self::failed(record, format!("cannot write {}: {e}", marker.display()))
                })?;
            }
            OperationKind::Uninstall => match fs::remove_file(&marker) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Self::failed(
                        record,
                        format!("cannot remove {}: {e}", marker.display()),
                    ));
                }
            },
        }

        Ok(())
    }

    fn footprint(&self, record: &ComponentRecord) -> Result<Option<String>> {
        let marker = Path::new(&record.path).join(MARKER_FILE);
        match fs::read_to_string(&marker) {
            Ok(content) => {
                let version = content.trim();
                Ok((!version.is_empty()).then(|| version.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
