// src/resolver/validator.rs

//! Dependency validation
//!
//! Checks a component's declared dependencies against the whole registry
//! and derives `dependencies_status` / `dependencies_warnings`. These two
//! fields are only ever written from a [`DependencyReport`].

use crate::db::models::{ComponentRecord, ComponentStatus, DependencyRequirement, DependencyStatus};
use crate::error::{Error, Result};
use crate::registry::RegistryStore;
use crate::version::{ComponentVersion, VersionRequirement};
use std::fmt;
use tracing::debug;

/// Why a single dependency is not met
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyProblem {
    /// No record with that name
    NotRegistered,
    /// Registered but never installed
    NotInstalled,
    /// Installed but not active
    NotActive(ComponentStatus),
    /// Installed version below the requirement
    VersionTooOld { required: String, installed: String },
    /// The requirement itself cannot be parsed
    InvalidRequirement(String),
    /// The installed version cannot be parsed
    InvalidInstalledVersion(String),
}

/// Outcome for one declared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    pub requirement: DependencyRequirement,
    pub installed_version: Option<String>,
    pub problem: Option<DependencyProblem>,
}

impl DependencyCheck {
    pub fn is_met(&self) -> bool {
        self.problem.is_none()
    }

    /// Human-readable warning line, `None` when met
    pub fn warning(&self) -> Option<String> {
        let name = &self.requirement.name;
        self.problem.as_ref().map(|problem| match problem {
            DependencyProblem::NotRegistered => format!("{name} is not registered"),
            DependencyProblem::NotInstalled => format!("{name} is not installed"),
            DependencyProblem::NotActive(status) => {
                format!("{name} is installed but not active (status: {status})")
            }
            DependencyProblem::VersionTooOld { required, installed } => {
                format!("{name} requires version >= {required}, installed {installed}")
            }
            DependencyProblem::InvalidRequirement(requirement) => {
                format!("{name} has an invalid version requirement '{requirement}'")
            }
            DependencyProblem::InvalidInstalledVersion(version) => {
                format!("{name} has an unparseable installed version '{version}'")
            }
        })
    }
}

/// Dependency check results for one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub component: String,
    pub checks: Vec<DependencyCheck>,
}

impl DependencyReport {
    /// `met` iff no dependency is unmet
    pub fn status(&self) -> DependencyStatus {
        if self.checks.iter().all(DependencyCheck::is_met) {
            DependencyStatus::Met
        } else {
            DependencyStatus::Unmet
        }
    }

    pub fn is_met(&self) -> bool {
        self.status() == DependencyStatus::Met
    }

    /// One line per unmet dependency, in declaration order
    pub fn warnings(&self) -> Vec<String> {
        self.checks.iter().filter_map(DependencyCheck::warning).collect()
    }

    pub fn unmet(&self) -> impl Iterator<Item = &DependencyCheck> {
        self.checks.iter().filter(|check| !check.is_met())
    }

    /// Copy the derived fields onto a record (does not persist)
    pub fn apply_to(&self, record: &mut ComponentRecord) {
        record.dependencies_status = self.status();
        record.dependencies_warnings = self.warnings();
    }

    /// The error to raise when unmet dependencies block an operation
    pub fn to_error(&self) -> Error {
        Error::UnmetDependency {
            component: self.component.clone(),
            problems: self.warnings(),
        }
    }
}

impl fmt::Display for DependencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependencies of {}: {}", self.component, self.status())?;
        for check in &self.checks {
            let installed = check.installed_version.as_deref().unwrap_or("-");
            match check.warning() {
                None => writeln!(f, "  [met]   {} (installed {})", check.requirement, installed)?,
                Some(warning) => writeln!(f, "  [unmet] {warning}")?,
            }
        }
        Ok(())
    }
}

/// Check one dependency against its target record
fn check_one(requirement: &DependencyRequirement, target: Option<&ComponentRecord>) -> DependencyCheck {
    let installed_version = target.and_then(|t| t.installed_version.clone());

    let problem = match target {
        None => Some(DependencyProblem::NotRegistered),
        Some(target) => match &target.installed_version {
            None => Some(DependencyProblem::NotInstalled),
            Some(_) if target.status != ComponentStatus::Active => {
                Some(DependencyProblem::NotActive(target.status))
            }
            Some(installed) => check_version(requirement, installed),
        },
    };

    DependencyCheck {
        requirement: requirement.clone(),
        installed_version,
        problem,
    }
}

fn check_version(requirement: &DependencyRequirement, installed: &str) -> Option<DependencyProblem> {
    let raw = requirement.version.as_deref()?;

    let Ok(required) = VersionRequirement::parse(raw) else {
        return Some(DependencyProblem::InvalidRequirement(raw.to_string()));
    };
    let Ok(version) = ComponentVersion::parse(installed) else {
        return Some(DependencyProblem::InvalidInstalledVersion(installed.to_string()));
    };

    if required.is_satisfied_by(&version) {
        None
    } else {
        Some(DependencyProblem::VersionTooOld {
            required: required.minimum.to_string(),
            installed: installed.to_string(),
        })
    }
}

/// Classify every declared dependency of `record` (no writes)
pub fn check(registry: &dyn RegistryStore, record: &ComponentRecord) -> Result<DependencyReport> {
    let mut checks = Vec::with_capacity(record.dependencies.len());
    for requirement in &record.dependencies {
        let target = registry.get(&requirement.name)?;
        checks.push(check_one(requirement, target.as_ref()));
    }

    Ok(DependencyReport {
        component: record.name.clone(),
        checks,
    })
}

/// Check a registered component and persist the derived fields
pub fn validate(registry: &dyn RegistryStore, name: &str) -> Result<DependencyReport> {
    let mut record = registry
        .get(name)?
        .ok_or_else(|| Error::UnknownComponent(name.to_string()))?;

    let report = check(registry, &record)?;
    report.apply_to(&mut record);
    registry.upsert(&mut record)?;

    debug!(
        "Validated dependencies of {}: {} ({} warnings)",
        name,
        record.dependencies_status,
        record.dependencies_warnings.len()
    );
    Ok(report)
}

/// Re-validate every component that directly depends on `name`
///
/// Returns the names that were refreshed.
pub fn revalidate_dependents(registry: &dyn RegistryStore, name: &str) -> Result<Vec<String>> {
    let mut refreshed = Vec::new();
    for dependent in registry.dependents_of(name)? {
        validate(registry, &dependent.name)?;
        refreshed.push(dependent.name);
    }
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    fn registry_for_scenario_b() -> MemoryRegistry {
        MemoryRegistry::with_records(vec![
            ComponentRecord::new("base", "1.5.0", "/opt/base").installed_at("1.5.0"),
            ComponentRecord::new("reporting", "1.0.0", "/opt/reporting")
                .with_dependencies(vec![DependencyRequirement::new("base", "2.0")]),
        ])
    }

    #[test]
    fn test_version_mismatch_reported() {
        let registry = registry_for_scenario_b();
        let report = validate(&registry, "reporting").unwrap();

        assert_eq!(report.status(), DependencyStatus::Unmet);
        let unmet: Vec<_> = report.unmet().collect();
        assert_eq!(unmet.len(), 1);
        assert_eq!(
            unmet[0].problem,
            Some(DependencyProblem::VersionTooOld {
                required: "2.0.0".to_string(),
                installed: "1.5.0".to_string(),
            })
        );
        assert_eq!(
            report.warnings(),
            vec!["base requires version >= 2.0.0, installed 1.5.0".to_string()]
        );

        let stored = registry.get("reporting").unwrap().unwrap();
        assert_eq!(stored.dependencies_status, DependencyStatus::Unmet);
        assert_eq!(stored.dependencies_warnings, report.warnings());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let registry = registry_for_scenario_b();

        validate(&registry, "reporting").unwrap();
        let first = registry.get("reporting").unwrap().unwrap();
        validate(&registry, "reporting").unwrap();
        let second = registry.get("reporting").unwrap().unwrap();

        assert_eq!(first.dependencies_status, second.dependencies_status);
        assert_eq!(first.dependencies_warnings, second.dependencies_warnings);
    }

    #[test]
    fn test_each_unmet_kind_has_a_warning() {
        let registry = MemoryRegistry::with_records(vec![
            ComponentRecord::new("idle", "1.0.0", "/opt/idle"),
            {
                let mut broken = ComponentRecord::new("broken", "1.0.0", "/opt/broken")
                    .installed_at("1.0.0");
                broken.status = ComponentStatus::Error;
                broken
            },
            ComponentRecord::new("app", "1.0.0", "/opt/app").with_dependencies(vec![
                DependencyRequirement::any("ghost"),
                DependencyRequirement::any("idle"),
                DependencyRequirement::any("broken"),
            ]),
        ]);

        let record = registry.get("app").unwrap().unwrap();
        let report = check(&registry, &record).unwrap();
        assert_eq!(
            report.warnings(),
            vec![
                "ghost is not registered".to_string(),
                "idle is not installed".to_string(),
                "broken is installed but not active (status: error)".to_string(),
            ]
        );

        // check() is read-only
        let stored = registry.get("app").unwrap().unwrap();
        assert_eq!(stored.dependencies_status, DependencyStatus::Unknown);
    }

    #[test]
    fn test_met_without_requirement() {
        let registry = MemoryRegistry::with_records(vec![
            ComponentRecord::new("base", "0.1.0", "/opt/base").installed_at("0.1.0"),
            ComponentRecord::new("ui", "1.0.0", "/opt/ui")
                .with_dependencies(vec![DependencyRequirement::any("base")]),
        ]);

        let report = validate(&registry, "ui").unwrap();
        assert!(report.is_met());
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_unknown_component() {
        let registry = MemoryRegistry::new();
        assert!(matches!(
            validate(&registry, "ghost"),
            Err(Error::UnknownComponent(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_revalidate_dependents_after_upgrade() {
        let registry = registry_for_scenario_b();
        validate(&registry, "reporting").unwrap();

        let mut base = registry.get("base").unwrap().unwrap();
        base.installed_version = Some("2.1.0".to_string());
        registry.upsert(&mut base).unwrap();

        let refreshed = revalidate_dependents(&registry, "base").unwrap();
        assert_eq!(refreshed, vec!["reporting".to_string()]);
        let stored = registry.get("reporting").unwrap().unwrap();
        assert_eq!(stored.dependencies_status, DependencyStatus::Met);
        assert!(stored.dependencies_warnings.is_empty());
    }

    #[test]
    fn test_error_lists_problems() {
        let registry = registry_for_scenario_b();
        let record = registry.get("reporting").unwrap().unwrap();
        let err = check(&registry, &record).unwrap().to_error();
        let message = err.to_string();
        assert!(message.contains("reporting"));
        assert!(message.contains("base requires version >= 2.0.0, installed 1.5.0"));
    }
}
