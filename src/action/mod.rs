// src/action/mod.rs

//! Typed package actions
//!
//! An action is one declarative unit inside a package manifest: the package
//! identity, a label, a dependency relation, a filesystem object, a
//! template, a service, or a signature. Actions carry a stable lowercase
//! type tag, a semantic key, and a globally unique id of the form
//! `type.key` within their manifest.

mod manifest;

pub use manifest::Manifest;

use crate::error::{Error, Result};
use crate::version::{Version, VersionOp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable action type tags
///
/// Tags are canonical lowercase internally; parsing at boundaries is
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Zpkg,
    Tag,
    Requirement,
    Dir,
    File,
    SymLink,
    Template,
    Service,
    Signature,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Zpkg => "zpkg",
            ActionKind::Tag => "tag",
            ActionKind::Requirement => "requirement",
            ActionKind::Dir => "dir",
            ActionKind::File => "file",
            ActionKind::SymLink => "symlink",
            ActionKind::Template => "template",
            ActionKind::Service => "service",
            ActionKind::Signature => "signature",
        }
    }

    /// True for `dir`, `file`, and `symlink`
    pub fn is_filesystem(&self) -> bool {
        matches!(self, ActionKind::Dir | ActionKind::File | ActionKind::SymLink)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zpkg" => Ok(ActionKind::Zpkg),
            "tag" => Ok(ActionKind::Tag),
            "requirement" => Ok(ActionKind::Requirement),
            "dir" => Ok(ActionKind::Dir),
            "file" => Ok(ActionKind::File),
            "symlink" => Ok(ActionKind::SymLink),
            "template" => Ok(ActionKind::Template),
            "service" => Ok(ActionKind::Service),
            "signature" => Ok(ActionKind::Signature),
            _ => Err(Error::ParseError(format!("unknown action type: {}", s))),
        }
    }
}

/// Package identity action, exactly one per manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zpkg {
    pub name: String,
    pub version: Version,
    pub publisher: String,
    pub arch: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Zpkg {
    /// Package id rendered as `name@version`
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && !self.publisher.is_empty()
            && !self.arch.is_empty()
            && !self.os.is_empty()
    }
}

/// Free-form label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Relation direction of a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementMethod {
    /// Constraint over another package that must be present
    Depends,
    /// Constraint over another package that must be absent
    Conflicts,
    /// Advertises a virtual name satisfied by this package
    Provides,
}

impl fmt::Display for RequirementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementMethod::Depends => write!(f, "depends"),
            RequirementMethod::Conflicts => write!(f, "conflicts"),
            RequirementMethod::Provides => write!(f, "provides"),
        }
    }
}

/// A named version constraint with a relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub method: RequirementMethod,
    #[serde(default)]
    pub op: VersionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl Requirement {
    pub fn depends(name: &str, op: VersionOp, version: Option<Version>) -> Self {
        Self {
            name: name.to_string(),
            method: RequirementMethod::Depends,
            op,
            version,
        }
    }

    pub fn conflicts(name: &str, op: VersionOp, version: Option<Version>) -> Self {
        Self {
            name: name.to_string(),
            method: RequirementMethod::Conflicts,
            op,
            version,
        }
    }

    pub fn provides(name: &str, version: Option<Version>) -> Self {
        Self {
            name: name.to_string(),
            method: RequirementMethod::Provides,
            op: VersionOp::Any,
            version,
        }
    }

    /// Parse a request-line requirement
    ///
    /// Accepts `name`, `name@version` (exact), or `name<op>version` with
    /// one of the six comparison operators. The result is a `depends`
    /// relation, which is what install and remove requests carry.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("empty requirement string".to_string()));
        }

        if let Some((name, version)) = s.split_once('@') {
            let version = Version::parse(version)?;
            return Ok(Self::depends(name, VersionOp::Eq, Some(version)));
        }

        for op_str in ["<=", ">=", "<", ">", "="] {
            if let Some((name, version)) = s.split_once(op_str) {
                let op = op_str.parse::<VersionOp>()?;
                let version = Version::parse(version)?;
                return Ok(Self::depends(name.trim(), op, Some(version)));
            }
        }

        if s.contains(|c: char| c.is_whitespace()) {
            return Err(Error::ParseError(format!("invalid requirement: {}", s)));
        }

        Ok(Self::depends(s, VersionOp::Any, None))
    }

    /// Check a concrete version against this requirement's constraint
    pub fn satisfied_by(&self, version: &Version) -> bool {
        match (&self.op, &self.version) {
            (VersionOp::Any, _) | (_, None) => true,
            (op, Some(bound)) => version.satisfies(*op, bound),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {} {}", self.name, self.op, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Directory claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dir {
    pub path: String,
    pub owner: String,
    pub group: String,
    /// Octal mode string, e.g. `"0755"`
    pub mode: String,
}

/// Regular file with payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    pub owner: String,
    pub group: String,
    pub mode: String,
    /// SHA-256 of the payload, also the payload's name in the archive
    pub digest: String,
    pub size: u64,
}

/// Symbolic link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymLink {
    pub path: String,
    pub target: String,
    pub owner: String,
    pub group: String,
}

/// Template rendered at configure time from a packaged file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Must match the `path` of a `File` in the same manifest
    pub source: String,
    pub output: String,
    pub owner: String,
    pub group: String,
    pub mode: String,
}

/// Opaque service unit reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Detached signature over the manifest's signing form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub algorithm: String,
    pub value: String,
    pub fingerprint: String,
}

/// A declarative unit inside a manifest
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Zpkg(Zpkg),
    Tag(Tag),
    Requirement(Requirement),
    Dir(Dir),
    File(File),
    SymLink(SymLink),
    Template(Template),
    Service(Service),
    Signature(Signature),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Zpkg(_) => ActionKind::Zpkg,
            Action::Tag(_) => ActionKind::Tag,
            Action::Requirement(_) => ActionKind::Requirement,
            Action::Dir(_) => ActionKind::Dir,
            Action::File(_) => ActionKind::File,
            Action::SymLink(_) => ActionKind::SymLink,
            Action::Template(_) => ActionKind::Template,
            Action::Service(_) => ActionKind::Service,
            Action::Signature(_) => ActionKind::Signature,
        }
    }

    /// Semantic identity: path for filesystem actions, name otherwise
    pub fn key(&self) -> &str {
        match self {
            Action::Zpkg(a) => &a.name,
            Action::Tag(a) => &a.name,
            Action::Requirement(a) => &a.name,
            Action::Dir(a) => &a.path,
            Action::File(a) => &a.path,
            Action::SymLink(a) => &a.path,
            Action::Template(a) => &a.output,
            Action::Service(a) => &a.name,
            Action::Signature(a) => &a.fingerprint,
        }
    }

    /// Globally unique id within a manifest: `type.key`
    pub fn id(&self) -> String {
        format!("{}.{}", self.kind(), self.key())
    }

    /// Structural validity, independent of any manifest or image
    pub fn is_valid(&self) -> bool {
        match self {
            Action::Zpkg(a) => a.is_valid(),
            Action::Tag(a) => !a.name.is_empty(),
            Action::Requirement(a) => !a.name.is_empty(),
            Action::Dir(a) => {
                !a.path.is_empty() && !a.owner.is_empty() && !a.group.is_empty() && !a.mode.is_empty()
            }
            Action::File(a) => {
                !a.path.is_empty()
                    && !a.owner.is_empty()
                    && !a.group.is_empty()
                    && !a.mode.is_empty()
                    && !a.digest.is_empty()
            }
            Action::SymLink(a) => !a.path.is_empty() && !a.target.is_empty(),
            Action::Template(a) => !a.source.is_empty() && !a.output.is_empty(),
            Action::Service(a) => !a.name.is_empty(),
            Action::Signature(a) => {
                !a.algorithm.is_empty() && !a.value.is_empty() && !a.fingerprint.is_empty()
            }
        }
    }

    /// Whether a realize failure is downgraded to a warning
    pub fn may_fail(&self) -> bool {
        matches!(self, Action::Service(_))
    }
}

/// Parse an octal mode string such as `"0755"`
pub fn parse_mode(mode: &str) -> Result<u32> {
    u32::from_str_radix(mode.trim_start_matches("0o"), 8)
        .map_err(|e| Error::ParseError(format!("invalid mode '{}': {}", mode, e)))
}
