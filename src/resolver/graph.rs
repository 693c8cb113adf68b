// src/resolver/graph.rs

//! Dependency graph data structures and algorithms
//!
//! A graph is built fresh for each planning pass over a requested set of
//! components. Edges point from a component to the components it depends
//! on and only connect requested components; dependencies on anything
//! outside the set are kept aside as external dependencies for the
//! validator.
//!
//! Ordering is deterministic: nodes keep the order they were requested in,
//! edges keep declaration order, and the sorter uses a FIFO queue.

use crate::db::models::ComponentRecord;
use crate::error::{Error, Result};
use crate::registry::{RegistryFilter, RegistryStore};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// A node in the dependency graph representing a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentNode {
    pub name: String,
    pub current_version: String,
    pub installed_version: Option<String>,
}

impl ComponentNode {
    pub fn from_record(record: &ComponentRecord) -> Self {
        Self {
            name: record.name.clone(),
            current_version: record.current_version.clone(),
            installed_version: record.installed_version.clone(),
        }
    }
}

/// A "depends-on" edge with an optional minimum version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub version_requirement: Option<String>,
}

/// Result of a topological sort
///
/// `complete` is false when a cycle kept some nodes from being placed;
/// `order` then holds only the nodes that could be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologicalOrder {
    pub order: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Dependency graph for ordering and cycle detection
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Node names in insertion order
    order: Vec<String>,
    nodes: HashMap<String, ComponentNode>,
    /// Outgoing in-scope dependencies per component, in declaration order
    edges: HashMap<String, Vec<DependencyEdge>>,
    /// Components that depend on each component (reverse edges)
    reverse_edges: HashMap<String, Vec<String>>,
    /// Dependencies on components outside the graph
    external: Vec<DependencyEdge>,
    /// Requested names that are not registered
    unknown: Vec<String>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph over `names`, or over every registered component when
    /// `names` is empty
    ///
    /// Unregistered names are skipped and reported through [`unknown`].
    ///
    /// [`unknown`]: DependencyGraph::unknown
    pub fn build(registry: &dyn RegistryStore, names: &[String]) -> Result<Self> {
        let mut records = Vec::new();
        let mut unknown = Vec::new();

        if names.is_empty() {
            records = registry.list(&RegistryFilter::all())?;
        } else {
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name.as_str()) {
                    continue;
                }
                match registry.get(name)? {
                    Some(record) => records.push(record),
                    None => unknown.push(name.clone()),
                }
            }
        }

        let mut graph = Self::from_records(&records);
        graph.unknown = unknown;
        debug!(
            "Built dependency graph: {} nodes, {} unknown",
            graph.order.len(),
            graph.unknown.len()
        );
        Ok(graph)
    }

    /// Build a graph over exactly `records`, in the given order
    pub fn from_records(records: &[ComponentRecord]) -> Self {
        let mut graph = Self::new();

        for record in records {
            graph.add_node(ComponentNode::from_record(record));
        }

        for record in records {
            for dep in &record.dependencies {
                let edge = DependencyEdge {
                    from: record.name.clone(),
                    to: dep.name.clone(),
                    version_requirement: dep.version.clone(),
                };
                if graph.nodes.contains_key(&dep.name) {
                    graph.add_edge(edge);
                } else {
                    graph.external.push(edge);
                }
            }
        }

        graph
    }

    /// Add a component node; re-adding a name replaces the node in place
    pub fn add_node(&mut self, node: ComponentNode) {
        if !self.nodes.contains_key(&node.name) {
            self.order.push(node.name.clone());
        }
        self.nodes.insert(node.name.clone(), node);
    }

    /// Add a dependency edge between two nodes
    pub fn add_edge(&mut self, edge: DependencyEdge) {
        self.reverse_edges
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());

        self.edges.entry(edge.from.clone()).or_default().push(edge);
    }

    /// Node names in insertion order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Requested names that were not registered
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    /// Dependencies that point outside the graph
    pub fn external(&self) -> &[DependencyEdge] {
        &self.external
    }

    /// In-scope dependencies of a component
    pub fn get_dependencies(&self, name: &str) -> &[DependencyEdge] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// In-scope components that depend directly on this one
    pub fn get_dependents(&self, name: &str) -> &[String] {
        self.reverse_edges
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Find the first dependency cycle
    ///
    /// Iterative depth-first search from each node in insertion order.
    /// Returns the closed chain (`[a, b, a]`), or an empty list when the
    /// graph is acyclic.
    pub fn detect_cycle(&self) -> Vec<String> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();

        for root in &self.order {
            if marks.contains_key(root.as_str()) {
                continue;
            }

            marks.insert(root, Mark::Visiting);
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];

            while let Some(&(node, next_edge)) = stack.last() {
                let next = self
                    .get_dependencies(node)
                    .get(next_edge)
                    .map(|edge| edge.to.as_str());

                let Some(next) = next else {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                };

                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                match marks.get(next) {
                    Some(Mark::Visiting) => {
                        let start = stack
                            .iter()
                            .position(|(name, _)| *name == next)
                            .unwrap_or(0);
                        let mut chain: Vec<String> = stack[start..]
                            .iter()
                            .map(|(name, _)| (*name).to_string())
                            .collect();
                        chain.push(next.to_string());
                        return chain;
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(next, Mark::Visiting);
                        stack.push((next, 0));
                    }
                }
            }
        }

        Vec::new()
    }

    /// Perform topological sort using Kahn's algorithm
    ///
    /// A node becomes eligible once all of its in-scope dependencies are
    /// placed. Eligible nodes are taken FIFO, seeded in insertion order, so
    /// the result is the install order (dependencies before dependents).
    pub fn topological_sort(&self) -> TopologicalOrder {
        let mut in_degree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|name| (name.as_str(), self.get_dependencies(name).len()))
            .collect();

        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|name| in_degree.get(name) == Some(&0))
            .collect();

        let mut order = Vec::with_capacity(self.order.len());

        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());

            for dependent in self.get_dependents(name) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        let complete = order.len() == self.order.len();
        if !complete {
            debug!(
                "Topological sort incomplete: placed {} of {} components",
                order.len(),
                self.order.len()
            );
        }

        TopologicalOrder { order, complete }
    }

    /// Install order, failing on a cycle
    pub fn install_order(&self) -> Result<Vec<String>> {
        let cycle = self.detect_cycle();
        if !cycle.is_empty() {
            return Err(Error::CycleDetected(cycle));
        }

        let sorted = self.topological_sort();
        if !sorted.complete {
            let unplaced = self
                .order
                .iter()
                .filter(|name| !sorted.order.contains(name))
                .cloned()
                .collect();
            return Err(Error::CycleDetected(unplaced));
        }

        Ok(sorted.order)
    }

    /// Uninstall order (dependents first), failing on a cycle
    pub fn uninstall_order(&self) -> Result<Vec<String>> {
        let mut order = self.install_order()?;
        order.reverse();
        Ok(order)
    }

    /// Find every component that would break if this one were removed
    ///
    /// Transitive closure of reverse dependencies, in breadth-first order.
    pub fn find_breaking(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut breaking = Vec::new();
        let mut queue = VecDeque::new();

        seen.insert(name);
        queue.push_back(name);

        while let Some(current) = queue.pop_front() {
            for dependent in self.get_dependents(current) {
                if seen.insert(dependent.as_str()) {
                    breaking.push(dependent.clone());
                    queue.push_back(dependent.as_str());
                }
            }
        }

        breaking
    }

    /// Get statistics about the dependency graph
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            total_components: self.order.len(),
            total_dependencies: self.edges.values().map(Vec::len).sum(),
            external_dependencies: self.external.len(),
            unknown_components: self.unknown.len(),
            max_dependencies: self.edges.values().map(Vec::len).max().unwrap_or(0),
            max_dependents: self.reverse_edges.values().map(Vec::len).max().unwrap_or(0),
        }
    }
}

/// Statistics about the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub total_components: usize,
    pub total_dependencies: usize,
    pub external_dependencies: usize,
    pub unknown_components: usize,
    pub max_dependencies: usize,
    pub max_dependents: usize,
}
