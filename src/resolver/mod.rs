// src/resolver/mod.rs

//! Dependency resolution and planning
//!
//! This module provides dependency graph construction, cycle detection,
//! topological ordering and dependency validation, and ties them together
//! in [`Planner`], which turns a list of requested component names into an
//! ordered [`Plan`].

pub mod graph;
mod plan;
pub mod validator;

pub use graph::{ComponentNode, DependencyEdge, DependencyGraph, GraphStats, TopologicalOrder};
pub use plan::Plan;
pub use validator::{DependencyCheck, DependencyProblem, DependencyReport};

use crate::db::models::{ComponentRecord, OperationKind};
use crate::error::{Error, Result};
use crate::registry::{RegistryFilter, RegistryStore};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Computes execution orders from the registry
///
/// Planning is read-only: it never writes to the registry.
pub struct Planner<'a> {
    registry: &'a dyn RegistryStore,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a dyn RegistryStore) -> Self {
        Self { registry }
    }

    /// Plan any operation kind
    pub fn plan(&self, operation: OperationKind, names: &[String]) -> Result<Plan> {
        match operation {
            OperationKind::Install => self.plan_install(names),
            OperationKind::Update => self.plan_update(names),
            OperationKind::Uninstall => self.plan_uninstall(names),
        }
    }

    /// Install order for `names` plus any registered dependencies that are
    /// not installed yet, dependencies first
    pub fn plan_install(&self, names: &[String]) -> Result<Plan> {
        let requested = self.requested_or_all(names)?;
        let mut records = self.load_all(&requested)?;

        let mut in_plan: HashSet<String> = records.iter().map(|r| r.name.clone()).collect();
        let mut added = Vec::new();
        let mut queue: VecDeque<ComponentRecord> = records.iter().cloned().collect();

        while let Some(record) = queue.pop_front() {
            for dep in &record.dependencies {
                if in_plan.contains(&dep.name) {
                    continue;
                }
                if let Some(target) = self.registry.get(&dep.name)?
                    && !target.is_installed()
                {
                    in_plan.insert(target.name.clone());
                    added.push(target.name.clone());
                    records.push(target.clone());
                    queue.push_back(target);
                }
            }
        }

        if !added.is_empty() {
            debug!("Install plan pulls in dependencies: {}", added.join(", "));
        }

        let graph = DependencyGraph::from_records(&records);
        let order = graph.install_order()?;

        Ok(Plan {
            operation: OperationKind::Install,
            requested,
            order,
            added,
            external: graph.external().to_vec(),
            stats: graph.stats(),
        })
    }

    /// Update order for exactly `names`, dependencies first
    pub fn plan_update(&self, names: &[String]) -> Result<Plan> {
        let (requested, graph) = self.build_graph(names)?;
        let order = graph.install_order()?;
        Ok(Self::finish(OperationKind::Update, requested, order, &graph))
    }

    /// Removal order for exactly `names`, dependents first
    pub fn plan_uninstall(&self, names: &[String]) -> Result<Plan> {
        let (requested, graph) = self.build_graph(names)?;
        let order = graph.uninstall_order()?;
        Ok(Self::finish(OperationKind::Uninstall, requested, order, &graph))
    }

    /// Every registered component that transitively depends on `name`
    pub fn what_breaks(&self, name: &str) -> Result<Vec<String>> {
        if self.registry.get(name)?.is_none() {
            return Err(Error::UnknownComponent(name.to_string()));
        }
        let graph = DependencyGraph::build(self.registry, &[])?;
        Ok(graph.find_breaking(name))
    }

    fn build_graph(&self, names: &[String]) -> Result<(Vec<String>, DependencyGraph)> {
        let requested = self.requested_or_all(names)?;
        let graph = DependencyGraph::build(self.registry, &requested)?;
        if let Some(unknown) = graph.unknown().first() {
            return Err(Error::UnknownComponent(unknown.clone()));
        }
        Ok((requested, graph))
    }

    fn finish(
        operation: OperationKind,
        requested: Vec<String>,
        order: Vec<String>,
        graph: &DependencyGraph,
    ) -> Plan {
        Plan {
            operation,
            requested,
            order,
            added: Vec::new(),
            external: graph.external().to_vec(),
            stats: graph.stats(),
        }
    }

    fn requested_or_all(&self, names: &[String]) -> Result<Vec<String>> {
        if !names.is_empty() {
            return Ok(names.to_vec());
        }
        Ok(self
            .registry
            .list(&RegistryFilter::all())?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    fn load_all(&self, names: &[String]) -> Result<Vec<ComponentRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let record = self
                .registry
                .get(name)?
                .ok_or_else(|| Error::UnknownComponent(name.clone()))?;
            records.push(record);
        }
        Ok(records)
    }
}
