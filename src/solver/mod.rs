// src/solver/mod.rs

//! Dependency solver
//!
//! Turns a request (install and remove intents) into an ordered solution
//! against a candidate pool under a preference policy. The solution's
//! operation order is the order the transaction engine must apply:
//! dependencies installed before dependents, dependents removed before
//! dependencies, and a version change emitted as a contiguous
//! `(remove old, install new)` pair.

mod engine;
mod graph;
mod policy;

pub use engine::Solver;
pub use graph::DependencyGraph;
pub use policy::Policy;

use crate::action::Requirement;
use crate::pkg::Package;
use std::fmt;

/// A set of install/remove intents
#[derive(Debug, Clone, Default)]
pub struct Request {
    installs: Vec<Requirement>,
    removes: Vec<Requirement>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, req: Requirement) {
        self.installs.push(req);
    }

    pub fn remove(&mut self, req: Requirement) {
        self.removes.push(req);
    }

    pub fn installs(&self) -> &[Requirement] {
        &self.installs
    }

    pub fn removes(&self) -> &[Requirement] {
        &self.removes
    }

    pub fn is_empty(&self) -> bool {
        self.installs.is_empty() && self.removes.is_empty()
    }
}

/// What the transaction should do with one package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Install,
    Remove,
    Noop,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Install => "install",
            OperationKind::Remove => "remove",
            OperationKind::Noop => "noop",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One element of a solution
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub package: Package,
}

impl Operation {
    pub fn new(kind: OperationKind, package: Package) -> Self {
        Self { kind, package }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.package.id())
    }
}

/// Ordered list of operations produced by the solver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    operations: Vec<Operation>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Install operations in application order
    pub fn installs(&self) -> impl Iterator<Item = &Operation> {
        self.operations
            .iter()
            .filter(|op| op.kind == OperationKind::Install)
    }

    /// Remove operations in application order
    pub fn removes(&self) -> impl Iterator<Item = &Operation> {
        self.operations
            .iter()
            .filter(|op| op.kind == OperationKind::Remove)
    }
}
