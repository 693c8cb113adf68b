// src/version/mod.rs

//! Version handling and requirement satisfaction for component dependencies
//!
//! Component versions are semantic versions, parsed leniently so that the
//! short forms found in hand-written manifests ("1.0", "v2") are accepted.
//! Requirements only support "at least": a bare version or `>=VERSION`.

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed component version
///
/// Equality and ordering follow semver precedence, so build metadata is
/// ignored: `1.0.0+a == 1.0.0+b`.
#[derive(Debug, Clone)]
pub struct ComponentVersion(Version);

impl ComponentVersion {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" → 1.2.3
    /// - "1.0" → 1.0.0
    /// - "v2" → 2.0.0
    /// - "2.0.0-rc.1+build.5" → 2.0.0-rc.1+build.5
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let unprefixed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let suffix_start = unprefixed.find(['-', '+']).unwrap_or(unprefixed.len());
        let (core, suffix) = unprefixed.split_at(suffix_start);

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidVersion(s.to_string()));
            }
            *slot = part
                .parse::<u64>()
                .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        }

        let normalized = format!("{}.{}.{}{}", numbers[0], numbers[1], numbers[2], suffix);
        Version::parse(&normalized)
            .map(Self)
            .map_err(|_| Error::InvalidVersion(s.to_string()))
    }

    /// Compare by semver precedence (major, minor, patch, pre-release)
    pub fn compare(&self, other: &ComponentVersion) -> Ordering {
        (self.0.major, self.0.minor, self.0.patch)
            .cmp(&(other.0.major, other.0.minor, other.0.patch))
            .then_with(|| self.0.pre.cmp(&other.0.pre))
    }
}

impl FromStr for ComponentVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for ComponentVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for ComponentVersion {}

impl Ord for ComponentVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for ComponentVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A minimum-version requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    pub minimum: ComponentVersion,
}

impl VersionRequirement {
    /// Parse a requirement string
    ///
    /// Accepted forms: "2.0", "2.0.0", ">=2.0", ">= 2.0.0". Range operators
    /// (`^`, `~`, `<`, `=`, ...) are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let rest = trimmed.strip_prefix(">=").unwrap_or(trimmed).trim();

        if rest.is_empty() || rest.starts_with(['<', '>', '=', '^', '~', '!', '*']) {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        Ok(Self {
            minimum: ComponentVersion::parse(rest)?,
        })
    }

    /// Check whether an installed version meets this requirement
    pub fn is_satisfied_by(&self, installed: &ComponentVersion) -> bool {
        installed >= &self.minimum
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">= {}", self.minimum)
    }
}

/// Compare two version strings by semver precedence
pub fn compare(v1: &str, v2: &str) -> Result<Ordering> {
    let left = ComponentVersion::parse(v1)?;
    let right = ComponentVersion::parse(v2)?;
    Ok(left.compare(&right))
}

/// Compare two version strings, returning -1, 0 or 1
pub fn compare_str(v1: &str, v2: &str) -> Result<i8> {
    Ok(match compare(v1, v2)? {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Check whether `installed` satisfies an optional minimum requirement
///
/// An absent requirement is always satisfied. Malformed input on either
/// side yields `false` rather than an error.
pub fn satisfies(installed: &str, requirement: Option<&str>) -> bool {
    let Some(requirement) = requirement else {
        return true;
    };

    match (
        ComponentVersion::parse(installed),
        VersionRequirement::parse(requirement),
    ) {
        (Ok(version), Ok(req)) => req.is_satisfied_by(&version),
        _ => false,
    }
}

/// Check whether `candidate` is strictly newer than `installed`
///
/// Returns `false` when either version is malformed.
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    matches!(compare(candidate, installed), Ok(Ordering::Greater))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let v = ComponentVersion::parse("1.2.3").unwrap();
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(ComponentVersion::parse("1.0").unwrap().to_string(), "1.0.0");
        assert_eq!(ComponentVersion::parse("2").unwrap().to_string(), "2.0.0");
        assert_eq!(ComponentVersion::parse("v3.1").unwrap().to_string(), "3.1.0");
        assert_eq!(
            ComponentVersion::parse("1.4-beta.2").unwrap().to_string(),
            "1.4.0-beta.2"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ComponentVersion::parse("").is_err());
        assert!(ComponentVersion::parse("abc").is_err());
        assert!(ComponentVersion::parse("1.2.3.4").is_err());
        assert!(ComponentVersion::parse("1..2").is_err());
        assert!(ComponentVersion::parse("1.x").is_err());
    }

    #[test]
    fn test_compare_numeric_parts() {
        assert_eq!(compare_str("1.2.3", "1.2.4").unwrap(), -1);
        assert_eq!(compare_str("1.10.0", "1.9.0").unwrap(), 1);
        assert_eq!(compare_str("2.0", "2.0.0").unwrap(), 0);
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        assert_eq!(compare("1.0.0-alpha", "1.0.0").unwrap(), Ordering::Less);
        assert_eq!(compare("1.0.0-alpha", "1.0.0-alpha.1").unwrap(), Ordering::Less);
        assert_eq!(compare("1.0.0-alpha.2", "1.0.0-alpha.10").unwrap(), Ordering::Less);
        assert_eq!(compare("1.0.0-alpha.beta", "1.0.0-beta").unwrap(), Ordering::Less);
        assert_eq!(compare("1.0.0-rc.1", "1.0.0").unwrap(), Ordering::Less);
    }

    #[test]
    fn test_build_metadata_ignored() {
        assert_eq!(compare("1.0.0+build.1", "1.0.0+build.9").unwrap(), Ordering::Equal);
        assert_eq!(
            ComponentVersion::parse("1.0.0+a").unwrap(),
            ComponentVersion::parse("1.0.0+b").unwrap()
        );
    }

    #[test]
    fn test_compare_malformed_is_error() {
        assert!(compare("1.0.0", "not-a-version").is_err());
    }

    #[test]
    fn test_satisfies() {
        assert!(satisfies("2.1.0", Some("2.0.0")));
        assert!(!satisfies("1.9.0", Some("2.0.0")));
        assert!(satisfies("2.0.0", None));
        assert!(satisfies("2.0.0", Some(">=2.0")));
        assert!(satisfies("2.0.0", Some(">= 2.0.0")));
    }

    #[test]
    fn test_satisfies_fails_closed() {
        assert!(!satisfies("garbage", Some("1.0.0")));
        assert!(!satisfies("1.0.0", Some("garbage")));
        assert!(!satisfies("1.0.0", Some("^1.0")));
        assert!(!satisfies("1.0.0", Some("<2.0")));
        // Absent requirement never inspects the installed version
        assert!(satisfies("garbage", None));
    }

    #[test]
    fn test_requirement_display() {
        let req = VersionRequirement::parse(">=2.0").unwrap();
        assert_eq!(req.to_string(), ">= 2.0.0");
        assert_eq!(req.minimum.to_string(), "2.0.0");
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer("1.1.0", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("0.9.0", "1.0.0"));
        assert!(!is_newer("bad", "1.0.0"));
    }
}
