//! Evaluation-order graph.
//!
//! An edge `required -> dependent` means `required` must finish its
//! configuration phase before `dependent` starts. Edges are checked for
//! cycles on insertion, so the graph is a DAG at every point in time.

use std::collections::HashMap;

use petgraph::algo::{astar, has_path_connecting};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::{debug, instrument};

use crate::domain::error::DomainError;

/// A recorded ordering constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EvaluationEdge {
    /// Module that waits
    pub dependent: String,
    /// Module that must be configured first
    pub required: String,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl EvaluationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) -> Result<(), DomainError> {
        if self.nodes.contains_key(name) {
            return Err(DomainError::DuplicateNode(name.to_string()));
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        Ok(())
    }

    fn index(&self, name: &str) -> Result<NodeIndex, DomainError> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| DomainError::UnknownNode(name.to_string()))
    }

    /// Record that `dependent` must be configured after `required`.
    ///
    /// Returns `Ok(false)` when the edge already exists. The graph is left
    /// untouched when an error is returned.
    #[instrument(level = "debug", skip(self))]
    pub fn add_edge(&mut self, dependent: &str, required: &str) -> Result<bool, DomainError> {
        let dep_idx = self.index(dependent)?;
        let req_idx = self.index(required)?;

        if let Some(cycle) = self.cycle_closed_by(dep_idx, req_idx) {
            return Err(DomainError::CyclicDependency {
                dependent: dependent.to_string(),
                required: required.to_string(),
                cycle,
            });
        }

        if self.graph.find_edge(req_idx, dep_idx).is_some() {
            debug!("edge already present");
            return Ok(false);
        }
        self.graph.add_edge(req_idx, dep_idx, ());
        Ok(true)
    }

    /// Path that adding `required -> dependent` would turn into a cycle.
    ///
    /// The new edge closes a cycle iff `dependent` already reaches `required`.
    fn cycle_closed_by(&self, dependent: NodeIndex, required: NodeIndex) -> Option<Vec<String>> {
        let (_, path) = astar(&self.graph, dependent, |n| n == required, |_| 1u32, |_| 0)?;
        let mut cycle: Vec<String> = path.iter().map(|&idx| self.graph[idx].clone()).collect();
        cycle.push(self.graph[dependent].clone());
        Some(cycle)
    }

    /// True if `dependent` transitively waits for `required`.
    pub fn depends_on(&self, dependent: &str, required: &str) -> Result<bool, DomainError> {
        let dep_idx = self.index(dependent)?;
        let req_idx = self.index(required)?;
        if dep_idx == req_idx {
            return Ok(false);
        }
        Ok(has_path_connecting(&self.graph, req_idx, dep_idx, None))
    }

    /// Two modules may be configured in parallel iff neither reaches the other.
    pub fn may_configure_concurrently(&self, a: &str, b: &str) -> Result<bool, DomainError> {
        if a == b {
            self.index(a)?;
            return Ok(false);
        }
        Ok(!self.depends_on(a, b)? && !self.depends_on(b, a)?)
    }

    /// All edges, sorted by dependent then required.
    pub fn edges(&self) -> Vec<EvaluationEdge> {
        let mut edges: Vec<EvaluationEdge> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(req, dep)| EvaluationEdge {
                dependent: self.graph[dep].clone(),
                required: self.graph[req].clone(),
            })
            .collect();
        edges.sort();
        edges
    }

    /// Layered topological sort (Kahn).
    ///
    /// Every module in wave `n` depends only on modules in waves `< n`.
    /// Within a wave, modules keep their insertion order.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut current: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();

        let mut waves = Vec::new();
        while !current.is_empty() {
            let mut next = Vec::new();
            for &n in &current {
                for m in self.graph.neighbors_directed(n, Direction::Outgoing) {
                    in_degree[m.index()] -= 1;
                    if in_degree[m.index()] == 0 {
                        next.push(m);
                    }
                }
            }
            next.sort();
            next.dedup();
            waves.push(current.iter().map(|&i| self.graph[i].clone()).collect());
            current = next;
        }
        waves
    }

    /// A topological configuration order.
    pub fn order(&self) -> Vec<String> {
        self.waves().into_iter().flatten().collect()
    }
}
