//! Module dependency graph diagnostics
//!
//! The runtime tolerates forward references, so emission never needs a
//! topological order. Synchronous cycles, however, hand partially populated
//! exports to one side; the graph exists to find and report them.

use log::debug;
use petgraph::{
    algo::{is_cyclic_directed, tarjan_scc},
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::{module_id::is_builtin, module_registry::ModuleRegistry};

/// Directed graph over analyzed modules; an edge points from a module to
/// one of its dependencies
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_indices: FxHashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph over every cached record, loader built-ins excluded
    pub fn from_registry(registry: &ModuleRegistry) -> Self {
        let mut graph = Self::new();
        for record in registry.records() {
            graph.add_module(&record.id);
            for dep in record.dependencies.iter().filter(|dep| !is_builtin(dep)) {
                graph.add_dependency(&record.id, dep);
            }
        }
        debug!(
            "Dependency graph has {} modules and {} edges",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        graph
    }

    pub fn add_module(&mut self, id: &str) -> NodeIndex {
        if let Some(&index) = self.node_indices.get(id) {
            return index;
        }
        let index = self.graph.add_node(id.to_owned());
        self.node_indices.insert(id.to_owned(), index);
        index
    }

    /// Record that `from` depends on `to`
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from = self.add_module(from);
        let to = self.add_module(to);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Modules that depend on `id`
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        let Some(&index) = self.node_indices.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .map(|node| self.graph[node].as_str())
            .collect()
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Strongly connected components with more than one module, plus
    /// modules depending on themselves. Members are sorted by id.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                _ => true,
            })
            .map(|component| {
                let mut ids: Vec<String> = component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect();
                ids.sort();
                ids
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
