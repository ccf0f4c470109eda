// src/pkg.rs

//! Solvable packages and platform identifiers
//!
//! A [`Package`] is a resolved candidate the solver can place in a
//! solution: the identity fields of a manifest's `zpkg` action, its
//! requirements, and a location descriptor naming the repository that
//! advertises it.

use crate::action::{Manifest, Requirement, RequirementMethod};
use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system + machine architecture pair, rendered `os-arch`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OsArch {
    pub os: String,
    pub arch: String,
}

impl OsArch {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl fmt::Display for OsArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// The platform matrix a repository may carry
pub fn platforms() -> Vec<OsArch> {
    ["linux", "darwin"]
        .iter()
        .flat_map(|os| {
            ["x86_64", "aarch64"]
                .iter()
                .map(|arch| OsArch::new(os, arch))
        })
        .collect()
}

/// Where a candidate lives: the advertising repo's priority and fetch URI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub priority: i32,
    pub uri: String,
}

/// A resolved package candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Version,
    pub os: String,
    pub arch: String,
    pub publisher: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, rename = "requirement", skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
    /// Filled when the pool is assembled, never persisted
    #[serde(skip)]
    pub location: Option<Location>,
}

impl Package {
    /// Derive a package from a manifest's identity and requirement actions
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let zpkg = manifest
            .zpkg()
            .ok_or_else(|| Error::ParseError("manifest has no zpkg action".to_string()))?;

        Ok(Self {
            name: zpkg.name.clone(),
            version: zpkg.version.clone(),
            os: zpkg.os.clone(),
            arch: zpkg.arch.clone(),
            publisher: zpkg.publisher.clone(),
            summary: zpkg.summary.clone(),
            requirements: manifest.requirements().cloned().collect(),
            location: None,
        })
    }

    /// Package id rendered as `name@version`
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn os_arch(&self) -> OsArch {
        OsArch::new(&self.os, &self.arch)
    }

    /// Artifact file name for this candidate
    pub fn file_name(&self) -> String {
        format!("{}@{}-{}-{}.zpkg", self.name, self.version, self.os, self.arch)
    }

    /// True when this candidate comes from the installed image
    pub fn is_installed(&self) -> bool {
        self.location
            .as_ref()
            .is_some_and(|l| l.priority == crate::repo::INSTALLED_PRIORITY)
    }

    /// Requirement match: direct by name, or virtual through a `provides`
    ///
    /// Direct: the requirement names this package and this version
    /// satisfies its constraint. Virtual: this package advertises a
    /// `provides` with the requested name whose version satisfies the
    /// constraint (a versionless provide matches only unconstrained
    /// requirements).
    pub fn matches(&self, req: &Requirement) -> bool {
        if self.name == req.name {
            return req.satisfied_by(&self.version);
        }

        self.requirements.iter().any(|p| {
            p.method == RequirementMethod::Provides
                && p.name == req.name
                && match &p.version {
                    Some(version) => req.satisfied_by(version),
                    None => req.version.is_none(),
                }
        })
    }

    /// Runtime dependencies of this package
    pub fn depends(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(|r| r.method == RequirementMethod::Depends)
    }

    /// Anti-dependencies of this package
    pub fn conflicts(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(|r| r.method == RequirementMethod::Conflicts)
    }

    /// Virtual names this package advertises
    pub fn provides_names(&self) -> impl Iterator<Item = &str> {
        self.requirements
            .iter()
            .filter(|r| r.method == RequirementMethod::Provides)
            .map(|r| r.name.as_str())
    }

    /// One-line listing row
    pub fn columns(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.name,
            self.version,
            self.os_arch(),
            self.summary
        )
    }
}
