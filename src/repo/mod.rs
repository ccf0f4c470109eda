// src/repo/mod.rs

//! Package repositories and their serialized metadata
//!
//! A repo is a named, prioritized, enabled/disabled collection of package
//! candidates. The distinguished repo `"installed"` carries priority `-1`
//! and represents the current image, so installed versions sort ahead of
//! any remote candidate of the same version. On a transport, a repo's
//! per-platform candidate list is the `packages.json` metadata file.

use crate::error::Result;
use crate::pkg::{OsArch, Package};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Priority reserved for the installed image
pub const INSTALLED_PRIORITY: i32 = -1;

/// Name of the distinguished installed repo
pub const INSTALLED_NAME: &str = "installed";

/// A collection of package candidates
#[derive(Debug, Clone)]
pub struct Repo {
    pub name: String,
    /// Fetch URI for remotes, `"installed"` for the image
    pub uri: String,
    pub priority: i32,
    pub enabled: bool,
    pub solvables: Vec<Package>,
}

impl Repo {
    pub fn new(name: &str, uri: &str, priority: i32, enabled: bool, solvables: Vec<Package>) -> Self {
        Self {
            name: name.to_string(),
            uri: uri.to_string(),
            priority,
            enabled,
            solvables,
        }
    }

    /// The installed image as a repo
    pub fn installed(solvables: Vec<Package>) -> Self {
        Self::new(
            INSTALLED_NAME,
            INSTALLED_NAME,
            INSTALLED_PRIORITY,
            true,
            solvables,
        )
    }

    /// Add candidates, rejecting any whose id is already present
    ///
    /// Returns the rejected packages. Published artifacts are immutable, so
    /// re-publishing an existing name@version is a refusal, not a replace.
    pub fn add(&mut self, packages: Vec<Package>) -> Vec<Package> {
        let mut rejects = Vec::new();
        for package in packages {
            if self.solvables.iter().any(|p| p.id() == package.id()) {
                rejects.push(package);
            } else {
                self.solvables.push(package);
            }
        }
        self.sort();
        rejects
    }

    /// Keep the newest `count` versions of each name, dropping the rest
    ///
    /// Returns the pruned packages so the publisher can delete their
    /// artifact files. A count of zero disables pruning.
    pub fn prune(&mut self, count: usize) -> Result<Vec<Package>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut by_name: BTreeMap<String, Vec<Package>> = BTreeMap::new();
        for package in self.solvables.drain(..) {
            by_name.entry(package.name.clone()).or_default().push(package);
        }

        let mut pruned = Vec::new();
        for (_, mut versions) in by_name {
            versions.sort_by(|a, b| b.version.cmp(&a.version));
            let keep = versions.len().min(count);
            pruned.extend(versions.split_off(keep));
            self.solvables.extend(versions);
        }

        self.sort();
        Ok(pruned)
    }

    fn sort(&mut self) {
        self.solvables
            .sort_by(|a, b| a.name.cmp(&b.name).then(b.version.cmp(&a.version)));
    }
}

/// Serialized form of a repo's per-platform candidate list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub solvables: Vec<Package>,
}

impl RepoMeta {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Candidates advertised for one platform
    pub fn for_platform(&self, osarch: &OsArch) -> Vec<Package> {
        self.solvables
            .iter()
            .filter(|p| p.os_arch() == *osarch)
            .cloned()
            .collect()
    }
}
