// src/manifest.rs

//! Component manifest format
//!
//! Each component directory carries a `component.toml`:
//!
//! ```toml
//! name = "reporting"
//! version = "1.2.0"
//! description = "Sales reports"
//! dependencies = ["base>=1.0", "mailer"]
//!
//! [hooks]
//! install = ["./hooks/install.sh"]
//! update = ["./hooks/migrate.sh", "--to", "1.2.0"]
//! uninstall = ["./hooks/uninstall.sh"]
//! ```
//!
//! Hooks are argv vectors run from the component directory.

use crate::db::models::{ComponentRecord, DependencyRequirement, OperationKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest file name inside a component directory
pub const MANIFEST_FILE: &str = "component.toml";

/// A parsed `component.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentManifest {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Dependency shorthand: `name` or `name>=version`
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub hooks: HookSection,
}

/// Per-operation hook commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookSection {
    #[serde(default)]
    pub install: Option<Vec<String>>,
    #[serde(default)]
    pub update: Option<Vec<String>>,
    #[serde(default)]
    pub uninstall: Option<Vec<String>>,
}

impl ComponentManifest {
    /// Parse manifest text
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: ComponentManifest = toml::from_str(content).map_err(|e| Error::InvalidManifest {
            component: "<unknown>".to_string(),
            reason: e.to_string(),
        })?;
        manifest.to_record(".")?;
        Ok(manifest)
    }

    /// Load `component.toml` from a component directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| Error::InvalidManifest {
            component: dir.display().to_string(),
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    /// Typed dependency list
    pub fn requirements(&self) -> Result<Vec<DependencyRequirement>> {
        self.dependencies
            .iter()
            .map(|dep| {
                dep.parse::<DependencyRequirement>()
                    .map_err(|e| Error::InvalidManifest {
                        component: self.name.clone(),
                        reason: format!("bad dependency '{dep}': {e}"),
                    })
            })
            .collect()
    }

    /// Hook argv for an operation, if declared
    pub fn hook(&self, operation: OperationKind) -> Option<&[String]> {
        match operation {
            OperationKind::Install => self.hooks.install.as_deref(),
            OperationKind::Update => self.hooks.update.as_deref(),
            OperationKind::Uninstall => self.hooks.uninstall.as_deref(),
        }
    }

    /// A fresh, not-installed registry record located at `path`
    pub fn to_record(&self, path: &str) -> Result<ComponentRecord> {
        let mut record = ComponentRecord::new(&self.name, &self.version, path)
            .with_dependencies(self.requirements()?);
        record.description = self.description.clone();
        record.validate()?;

        for (operation, hook) in [
            (OperationKind::Install, &self.hooks.install),
            (OperationKind::Update, &self.hooks.update),
            (OperationKind::Uninstall, &self.hooks.uninstall),
        ] {
            if hook.as_ref().is_some_and(Vec::is_empty) {
                return Err(Error::InvalidManifest {
                    component: self.name.clone(),
                    reason: format!("{operation} hook must not be empty"),
                });
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPORTING: &str = r#"
name = "reporting"
version = "1.2"
description = "Sales reports"
dependencies = ["base>=1.0", "mailer"]

[hooks]
update = ["./migrate.sh", "--to", "1.2.0"]
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ComponentManifest::parse(REPORTING).unwrap();
        assert_eq!(manifest.name, "reporting");
        assert_eq!(
            manifest.requirements().unwrap(),
            vec![
                DependencyRequirement::new("base", "1.0"),
                DependencyRequirement::any("mailer"),
            ]
        );
        assert!(manifest.hook(OperationKind::Install).is_none());
        assert_eq!(manifest.hook(OperationKind::Update).unwrap()[0], "./migrate.sh");

        let record = manifest.to_record("/opt/reporting").unwrap();
        assert_eq!(record.current_version, "1.2");
        assert_eq!(record.description.as_deref(), Some("Sales reports"));
        assert!(!record.is_installed());
    }

    #[test]
    fn test_invalid_manifests() {
        // bad name
        assert!(ComponentManifest::parse("name = \"Bad-Name\"\nversion = \"1.0\"").is_err());
        // bad version
        assert!(ComponentManifest::parse("name = \"a\"\nversion = \"one\"").is_err());
        // self dependency
        assert!(
            ComponentManifest::parse("name = \"a\"\nversion = \"1.0\"\ndependencies = [\"a\"]")
                .is_err()
        );
        // range operator
        assert!(
            ComponentManifest::parse("name = \"a\"\nversion = \"1.0\"\ndependencies = [\"b^1.0\"]")
                .is_err()
        );
        // empty hook
        assert!(
            ComponentManifest::parse("name = \"a\"\nversion = \"1.0\"\n[hooks]\ninstall = []")
                .is_err()
        );
        // unknown key
        assert!(ComponentManifest::parse("name = \"a\"\nversion = \"1.0\"\nfoo = 1").is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), REPORTING).unwrap();
        let manifest = ComponentManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.version, "1.2");

        let empty = TempDir::new().unwrap();
        assert!(matches!(
            ComponentManifest::load(empty.path()),
            Err(Error::InvalidManifest { .. })
        ));
    }
}
