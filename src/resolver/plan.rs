// src/resolver/plan.rs

//! Resolution plan data structures
//!
//! Contains the result types for install/update/uninstall planning.

use super::graph::{DependencyEdge, GraphStats};
use crate::db::models::OperationKind;
use std::fmt;

/// An ordered, cycle-free plan for one batch operation
#[derive(Debug, Clone)]
pub struct Plan {
    pub operation: OperationKind,
    /// Names as requested by the caller
    pub requested: Vec<String>,
    /// Components to process, in execution order
    pub order: Vec<String>,
    /// Not-yet-installed dependencies pulled into an install plan
    pub added: Vec<String>,
    /// Dependencies on components outside the plan
    pub external: Vec<DependencyEdge>,
    pub stats: GraphStats,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = match self.operation {
            OperationKind::Uninstall => "Removal order",
            _ => "Install order",
        };
        writeln!(f, "{heading} ({} components):", self.order.len())?;
        for (i, name) in self.order.iter().enumerate() {
            if self.added.contains(name) {
                writeln!(f, "  {}. {name} (dependency)", i + 1)?;
            } else {
                writeln!(f, "  {}. {name}", i + 1)?;
            }
        }

        if !self.external.is_empty() {
            writeln!(f, "External dependencies:")?;
            for edge in &self.external {
                match &edge.version_requirement {
                    Some(req) => writeln!(f, "  {} -> {} >= {req}", edge.from, edge.to)?,
                    None => writeln!(f, "  {} -> {}", edge.from, edge.to)?,
                }
            }
        }

        write!(
            f,
            "Graph: {} components, {} edges, {} external",
            self.stats.total_components,
            self.stats.total_dependencies,
            self.stats.external_dependencies
        )
    }
}
