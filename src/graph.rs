//! Stack dependency graph.
//!
//! Edges point from a producer stack to the stacks that consume it, so a
//! topological sort yields a valid deployment order. Only declared
//! dependencies are edges; nothing is inferred from transitivity.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::{Error, Result};

/// Dependency graph over stack names.
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl StackGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack. Adding a known stack is a no-op.
    pub fn add_stack(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.node_indices.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        self.node_indices.insert(name, idx);
        idx
    }

    /// True if the stack is known.
    pub fn contains(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    fn index(&self, name: &str) -> Result<NodeIndex> {
        self.node_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::StackNotFound(name.to_string()))
    }

    /// Declare that `consumer` deploys after `producer`.
    pub fn add_dependency(&mut self, consumer: &str, producer: &str) -> Result<()> {
        let from = self.index(producer)?;
        let to = self.index(consumer)?;
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
        Ok(())
    }

    /// True if any dependency cycle exists.
    pub fn has_cycles(&self) -> bool {
        !self.cycles().is_empty()
    }

    /// Stacks on each cycle.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&idx| self.graph.contains_edge(idx, idx))
            })
            .map(|scc| {
                scc.into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect()
            })
            .collect()
    }

    /// Stacks in an order that deploys every producer before its consumers.
    pub fn deployment_order(&self) -> Result<Vec<String>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                let members = self
                    .cycles()
                    .into_iter()
                    .find(|c| c.contains(&name))
                    .unwrap_or_else(|| vec![name]);
                Err(Error::DependencyCycle(members.join(" -> ")))
            }
        }
    }

    /// Producers `name` declares directly, in declaration order.
    pub fn direct_dependencies(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.index(name)?;
        let mut deps: Vec<(usize, String)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|edge| {
                self.graph
                    .node_weight(edge.source())
                    .map(|n| (edge.id().index(), n.clone()))
            })
            .collect();
        deps.sort_by_key(|(edge, _)| *edge);
        Ok(deps.into_iter().map(|(_, n)| n).collect())
    }

    /// Every stack `name` depends on, directly or transitively, sorted.
    pub fn dependencies_of(&self, name: &str) -> Result<Vec<String>> {
        self.reachable(name, Direction::Incoming)
    }

    /// Every stack that depends on `name`, directly or transitively, sorted.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>> {
        self.reachable(name, Direction::Outgoing)
    }

    fn reachable(&self, name: &str, direction: Direction) -> Result<Vec<String>> {
        let start = self.index(name)?;
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.graph.neighbors_directed(current, direction) {
                if let Some(node) = self.graph.node_weight(neighbor) {
                    if seen.insert(node.clone()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Number of stacks.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of declared dependencies.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Graphviz rendering, producers pointing at consumers.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph stacks {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box];\n\n");

        for idx in self.graph.node_indices() {
            if let Some(name) = self.graph.node_weight(idx) {
                output.push_str(&format!("  \"{}\";\n", name));
            }
        }

        output.push('\n');

        for edge in self.graph.edge_references() {
            let source = self
                .graph
                .node_weight(edge.source())
                .map(String::as_str)
                .unwrap_or("?");
            let target = self
                .graph
                .node_weight(edge.target())
                .map(String::as_str)
                .unwrap_or("?");
            output.push_str(&format!("  \"{}\" -> \"{}\";\n", source, target));
        }

        output.push_str("}\n");
        output
    }
}
