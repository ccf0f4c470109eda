// src/solver/policy.rs

//! Candidate preference policies
//!
//! A policy is a total ordering over the candidates for one name,
//! consulted after constraint filtering, never before. The solver walks
//! candidates in policy order and backtracks through them.

use crate::error::{Error, Result};
use crate::pkg::Package;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Named tie-break policies over constraint-filtered candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Prefer the highest version; on a version tie, prefer installed
    #[default]
    Updated,
    /// Prefer the installed candidate, otherwise the highest version
    Installed,
}

impl Policy {
    /// Sort candidates into preference order, best first
    ///
    /// Within equal preference, candidates fall back to repo priority and
    /// name so the order is total and runs are reproducible.
    pub fn order<'a>(&self, mut candidates: Vec<&'a Package>) -> Vec<&'a Package> {
        match self {
            Policy::Updated => candidates.sort_by(|a, b| {
                b.version
                    .cmp(&a.version)
                    .then(installed_first(a, b))
                    .then(priority(a).cmp(&priority(b)))
                    .then(a.name.cmp(&b.name))
            }),
            Policy::Installed => candidates.sort_by(|a, b| {
                installed_first(a, b)
                    .then(b.version.cmp(&a.version))
                    .then(priority(a).cmp(&priority(b)))
                    .then(a.name.cmp(&b.name))
            }),
        }
        candidates
    }

    /// The single best candidate under this policy
    pub fn select<'a>(&self, candidates: Vec<&'a Package>) -> Option<&'a Package> {
        self.order(candidates).into_iter().next()
    }
}

fn priority(package: &Package) -> i32 {
    package.location.as_ref().map(|l| l.priority).unwrap_or(0)
}

fn installed_first(a: &Package, b: &Package) -> Ordering {
    b.is_installed().cmp(&a.is_installed())
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Updated => write!(f, "updated"),
            Policy::Installed => write!(f, "installed"),
        }
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "updated" => Ok(Policy::Updated),
            "installed" => Ok(Policy::Installed),
            _ => Err(Error::ParseError(format!("unknown policy: {}", s))),
        }
    }
}
