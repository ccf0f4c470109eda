// src/pool/mod.rs

//! Candidate pool
//!
//! The pool is the union view over the installed image and every enabled
//! remote repo, indexed by package name and by advertised virtual name.
//! Candidates for a name are held in `(priority ascending, version
//! descending)` order, so the installed repo's `-1` priority puts installed
//! versions first and the solver's iteration order is deterministic.

use crate::action::Requirement;
use crate::error::{Error, Result};
use crate::pkg::Package;
use crate::repo::Repo;
use std::collections::{BTreeMap, BTreeSet};

/// Union of the installed repo and the enabled remote repos
#[derive(Debug)]
pub struct Pool {
    packages: Vec<Package>,
    /// Package name to candidate slots
    by_name: BTreeMap<String, Vec<usize>>,
    /// Virtual (provides) name to candidate slots
    by_provides: BTreeMap<String, Vec<usize>>,
}

impl Pool {
    /// Build a pool from the installed repo and the remote repos
    ///
    /// Disabled remotes are skipped. Two enabled remotes advertising the
    /// same URI are rejected; the union would double every candidate.
    pub fn new(installed: Repo, remotes: Vec<Repo>) -> Result<Self> {
        let mut seen_uris = BTreeSet::new();
        for repo in remotes.iter().filter(|r| r.enabled) {
            if !seen_uris.insert(repo.uri.clone()) {
                return Err(Error::ConfigError(format!(
                    "repos share the same uri: {}",
                    repo.uri
                )));
            }
        }

        let mut packages = Vec::new();
        for repo in std::iter::once(&installed).chain(remotes.iter().filter(|r| r.enabled)) {
            for solvable in &repo.solvables {
                let mut package = solvable.clone();
                package.location = Some(crate::pkg::Location {
                    priority: repo.priority,
                    uri: repo.uri.clone(),
                });
                packages.push(package);
            }
        }

        let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_provides: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (slot, package) in packages.iter().enumerate() {
            by_name.entry(package.name.clone()).or_default().push(slot);
            for provide in package.provides_names() {
                by_provides.entry(provide.to_string()).or_default().push(slot);
            }
        }

        for slots in by_name.values_mut().chain(by_provides.values_mut()) {
            slots.sort_by(|a, b| {
                let pa = &packages[*a];
                let pb = &packages[*b];
                let prio_a = pa.location.as_ref().map(|l| l.priority).unwrap_or(0);
                let prio_b = pb.location.as_ref().map(|l| l.priority).unwrap_or(0);
                prio_a
                    .cmp(&prio_b)
                    .then(pb.version.cmp(&pa.version))
                    .then(pa.name.cmp(&pb.name))
            });
        }

        Ok(Self {
            packages,
            by_name,
            by_provides,
        })
    }

    /// Ordered candidates matching a requirement, direct or virtual
    pub fn what_provides(&self, req: &Requirement) -> Vec<&Package> {
        let mut seen = BTreeSet::new();
        let mut found = Vec::new();

        let direct = self.by_name.get(&req.name).into_iter().flatten();
        let virtual_ = self.by_provides.get(&req.name).into_iter().flatten();
        for &slot in direct.chain(virtual_) {
            let package = &self.packages[slot];
            if package.matches(req) && seen.insert(slot) {
                found.push(package);
            }
        }

        found
    }

    /// The installed candidate for a name, if any
    pub fn installed(&self, name: &str) -> Option<&Package> {
        self.by_name
            .get(name)?
            .iter()
            .map(|&slot| &self.packages[slot])
            .find(|p| p.is_installed())
    }

    /// Every installed candidate
    pub fn installed_packages(&self) -> Vec<&Package> {
        self.packages.iter().filter(|p| p.is_installed()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn pkg(name: &str, version: Version) -> Package {
        Package {
            name: name.to_string(),
            version,
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            publisher: "tests".to_string(),
            summary: String::new(),
            requirements: Vec::new(),
            location: None,
        }
    }

    fn provider(name: &str, version: Version, provides: &str) -> Package {
        let mut package = pkg(name, version);
        package
            .requirements
            .push(Requirement::provides(provides, Some(Version::new(1, 0, 0))));
        package
    }

    #[test]
    fn test_rejects_duplicate_uris() {
        let installed = Repo::installed(Vec::new());
        let a = Repo::new("a", "file:///repo", 10, true, Vec::new());
        let b = Repo::new("b", "file:///repo", 20, true, Vec::new());
        assert!(matches!(
            Pool::new(installed, vec![a, b]),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_disabled_repo_is_invisible() {
        let installed = Repo::installed(Vec::new());
        let remote = Repo::new(
            "main",
            "file:///repo",
            10,
            false,
            vec![pkg("a", Version::new(1, 0, 0))],
        );
        let pool = Pool::new(installed, vec![remote]).unwrap();
        assert!(pool
            .what_provides(&Requirement::parse("a").unwrap())
            .is_empty());
    }

    #[test]
    fn test_candidate_ordering() {
        let installed = Repo::installed(vec![pkg("a", Version::new(1, 0, 0))]);
        let near = Repo::new(
            "near",
            "file:///near",
            10,
            true,
            vec![pkg("a", Version::new(1, 1, 0)), pkg("a", Version::new(1, 0, 0))],
        );
        let far = Repo::new(
            "far",
            "file:///far",
            20,
            true,
            vec![pkg("a", Version::new(2, 0, 0))],
        );

        let pool = Pool::new(installed, vec![near, far]).unwrap();
        let ids: Vec<String> = pool
            .what_provides(&Requirement::parse("a").unwrap())
            .iter()
            .map(|p| {
                format!(
                    "{}:{}",
                    p.location.as_ref().unwrap().priority,
                    p.version
                )
            })
            .collect();

        // Installed first, then by repo priority, version descending within
        assert_eq!(ids, vec!["-1:1.0.0", "10:1.1.0", "10:1.0.0", "20:2.0.0"]);
    }

    #[test]
    fn test_what_provides_virtual() {
        let installed = Repo::installed(Vec::new());
        let remote = Repo::new(
            "main",
            "file:///repo",
            10,
            true,
            vec![provider("nginx", Version::new(1, 24, 0), "webserver")],
        );
        let pool = Pool::new(installed, vec![remote]).unwrap();

        let found = pool.what_provides(&Requirement::parse("webserver").unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "nginx");
    }

    #[test]
    fn test_installed_lookup() {
        let installed = Repo::installed(vec![pkg("a", Version::new(1, 0, 0))]);
        let remote = Repo::new(
            "main",
            "file:///repo",
            10,
            true,
            vec![pkg("a", Version::new(2, 0, 0))],
        );
        let pool = Pool::new(installed, vec![remote]).unwrap();

        assert_eq!(pool.installed("a").unwrap().version, Version::new(1, 0, 0));
        assert!(pool.installed("b").is_none());
    }
}
