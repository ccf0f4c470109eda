// src/solver/graph.rs

//! Dependency graph over selected packages
//!
//! Used to order a solution's operations: a topological sort places
//! dependencies before dependents for installs, and its reverse places
//! dependents before dependencies for removes. Ties are broken by name
//! ascending so identical inputs always order identically.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Directed graph of `package -> depends-on package` edges
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    /// Package name to the names it depends on
    edges: BTreeMap<String, BTreeSet<String>>,
    /// Package name to the names that depend on it
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str) {
        self.nodes.insert(name.to_string());
    }

    /// Record that `from` depends on `to`
    ///
    /// Both endpoints become nodes. Self-edges are ignored; a package
    /// cannot order against itself.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.add_node(from);
        self.add_node(to);
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    /// Names that depend on `name`, directly
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.reverse
            .get(name)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Topological order with dependencies before dependents
    ///
    /// Kahn's algorithm over the dependency edges. The ready set is kept
    /// sorted, so among unordered packages the lexicographically smallest
    /// name is emitted first. A cycle fails with the names left unplaced.
    pub fn install_order(&self) -> Result<Vec<String>> {
        let mut unresolved: BTreeMap<&str, usize> = BTreeMap::new();
        for name in &self.nodes {
            let count = self
                .edges
                .get(name)
                .map(|deps| deps.iter().filter(|d| self.nodes.contains(*d)).count())
                .unwrap_or(0);
            unresolved.insert(name, count);
        }

        let mut ready: BTreeSet<&str> = unresolved
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(name) = ready.pop_first() {
            unresolved.remove(name);
            order.push(name.to_string());

            if let Some(dependents) = self.reverse.get(name) {
                for dependent in dependents {
                    if let Some(count) = unresolved.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            ready.insert(dependent);
                        }
                    }
                }
            }
        }

        if !unresolved.is_empty() {
            let cycle: Vec<&str> = unresolved.keys().copied().collect();
            return Err(Error::CyclicConflict(cycle.join(" -> ")));
        }

        Ok(order)
    }

    /// Reverse topological order: dependents before dependencies
    pub fn remove_order(&self) -> Result<Vec<String>> {
        let mut order = self.install_order()?;
        order.reverse();
        Ok(order)
    }
}
