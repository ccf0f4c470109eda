// src/action/manifest.rs

//! Package manifest container
//!
//! A manifest is the complete declarative content of a package: exactly one
//! `zpkg` identity action plus any number of the other variants. Insertion
//! is append-or-replace by action id. Iteration follows the canonical
//! ordering used for serialization and signing: `zpkg`, tags, requirements,
//! templates, services, signatures, then filesystem actions sorted by path
//! ascending.

use super::{
    Action, ActionKind, Dir, File, Requirement, Service, Signature, SymLink, Tag, Template, Zpkg,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The declarative content of a package
///
/// Each variant is stored in a map keyed by the action's semantic key, so
/// re-adding an action with an existing id replaces the previous entry and
/// iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    zpkg: Option<Zpkg>,
    tags: BTreeMap<String, Tag>,
    requirements: BTreeMap<String, Requirement>,
    dirs: BTreeMap<String, Dir>,
    files: BTreeMap<String, File>,
    symlinks: BTreeMap<String, SymLink>,
    templates: BTreeMap<String, Template>,
    services: BTreeMap<String, Service>,
    signatures: BTreeMap<String, Signature>,
}

/// Manifest wire form
///
/// JSON layout with one top-level key per action type; empty sections are
/// elided. Signatures sign this form with the `signature` key removed.
#[derive(Serialize, Deserialize)]
struct ManifestWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zpkg: Option<Zpkg>,
    #[serde(default, rename = "tag", skip_serializing_if = "Vec::is_empty")]
    tags: Vec<Tag>,
    #[serde(default, rename = "requirement", skip_serializing_if = "Vec::is_empty")]
    requirements: Vec<Requirement>,
    #[serde(default, rename = "dir", skip_serializing_if = "Vec::is_empty")]
    dirs: Vec<Dir>,
    #[serde(default, rename = "file", skip_serializing_if = "Vec::is_empty")]
    files: Vec<File>,
    #[serde(default, rename = "symlink", skip_serializing_if = "Vec::is_empty")]
    symlinks: Vec<SymLink>,
    #[serde(default, rename = "template", skip_serializing_if = "Vec::is_empty")]
    templates: Vec<Template>,
    #[serde(default, rename = "service", skip_serializing_if = "Vec::is_empty")]
    services: Vec<Service>,
    #[serde(default, rename = "signature", skip_serializing_if = "Vec::is_empty")]
    signatures: Vec<Signature>,
}

impl Manifest {
    pub fn new(zpkg: Zpkg) -> Self {
        Self {
            zpkg: Some(zpkg),
            ..Default::default()
        }
    }

    /// The identity action, if one has been set
    pub fn zpkg(&self) -> Option<&Zpkg> {
        self.zpkg.as_ref()
    }

    /// Append an action, replacing any existing action with the same id
    pub fn add(&mut self, action: Action) {
        match action {
            Action::Zpkg(a) => self.zpkg = Some(a),
            Action::Tag(a) => {
                self.tags.insert(a.name.clone(), a);
            }
            Action::Requirement(a) => {
                self.requirements.insert(a.name.clone(), a);
            }
            Action::Dir(a) => {
                self.dirs.insert(a.path.clone(), a);
            }
            Action::File(a) => {
                self.files.insert(a.path.clone(), a);
            }
            Action::SymLink(a) => {
                self.symlinks.insert(a.path.clone(), a);
            }
            Action::Template(a) => {
                self.templates.insert(a.output.clone(), a);
            }
            Action::Service(a) => {
                self.services.insert(a.name.clone(), a);
            }
            Action::Signature(a) => {
                self.signatures.insert(a.fingerprint.clone(), a);
            }
        }
    }

    /// True if an action with this id is present
    pub fn contains(&self, id: &str) -> bool {
        let Some((kind, key)) = id.split_once('.') else {
            return false;
        };
        let Ok(kind) = kind.parse::<ActionKind>() else {
            return false;
        };
        match kind {
            ActionKind::Zpkg => self.zpkg.as_ref().is_some_and(|z| z.name == key),
            ActionKind::Tag => self.tags.contains_key(key),
            ActionKind::Requirement => self.requirements.contains_key(key),
            ActionKind::Dir => self.dirs.contains_key(key),
            ActionKind::File => self.files.contains_key(key),
            ActionKind::SymLink => self.symlinks.contains_key(key),
            ActionKind::Template => self.templates.contains_key(key),
            ActionKind::Service => self.services.contains_key(key),
            ActionKind::Signature => self.signatures.contains_key(key),
        }
    }

    /// Actions of the requested kinds, in the order the kinds are given
    pub fn section(&self, kinds: &[ActionKind]) -> Vec<Action> {
        let mut items = Vec::new();
        for kind in kinds {
            match kind {
                ActionKind::Zpkg => items.extend(self.zpkg.iter().cloned().map(Action::Zpkg)),
                ActionKind::Tag => items.extend(self.tags.values().cloned().map(Action::Tag)),
                ActionKind::Requirement => items.extend(
                    self.requirements
                        .values()
                        .cloned()
                        .map(Action::Requirement),
                ),
                ActionKind::Dir => items.extend(self.dirs.values().cloned().map(Action::Dir)),
                ActionKind::File => items.extend(self.files.values().cloned().map(Action::File)),
                ActionKind::SymLink => {
                    items.extend(self.symlinks.values().cloned().map(Action::SymLink))
                }
                ActionKind::Template => {
                    items.extend(self.templates.values().cloned().map(Action::Template))
                }
                ActionKind::Service => {
                    items.extend(self.services.values().cloned().map(Action::Service))
                }
                ActionKind::Signature => {
                    items.extend(self.signatures.values().cloned().map(Action::Signature))
                }
            }
        }
        items
    }

    /// Filesystem actions merged across variants, sorted by path ascending
    pub fn fs_actions(&self) -> Vec<Action> {
        let mut items = self.section(&[ActionKind::Dir, ActionKind::File, ActionKind::SymLink]);
        items.sort_by(|a, b| a.key().cmp(b.key()).then(a.kind().as_str().cmp(b.kind().as_str())));
        items
    }

    /// Every action in canonical order
    pub fn actions(&self) -> Vec<Action> {
        let mut items = self.section(&[
            ActionKind::Zpkg,
            ActionKind::Tag,
            ActionKind::Requirement,
            ActionKind::Template,
            ActionKind::Service,
            ActionKind::Signature,
        ]);
        items.extend(self.fs_actions());
        items
    }

    /// Dependency relations declared by this package
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values()
    }

    /// Look up a packaged file by path
    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Validate the manifest's internal invariants
    ///
    /// Checks that the identity action is present and well formed, that no
    /// requirement names the enclosing package, that no two filesystem
    /// actions share a path, and that every template sources a packaged
    /// file. Pure; never touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        let zpkg = self
            .zpkg
            .as_ref()
            .ok_or_else(|| Error::ValidationError("manifest has no zpkg action".to_string()))?;
        if !zpkg.is_valid() {
            return Err(Error::ValidationError(format!(
                "zpkg action for '{}' is missing required fields",
                zpkg.name
            )));
        }

        for action in self.actions() {
            if !action.is_valid() {
                return Err(Error::ValidationError(format!(
                    "action {} is missing required fields",
                    action.id()
                )));
            }
        }

        for requirement in self.requirements.values() {
            if requirement.name == zpkg.name {
                return Err(Error::ValidationError(format!(
                    "requirement {} cannot reference the enclosing package",
                    requirement.name
                )));
            }
        }

        let fs = self.fs_actions();
        for pair in fs.windows(2) {
            if pair[0].key() == pair[1].key() {
                return Err(Error::ValidationError(format!(
                    "conflicting actions:\n{} => {}\n{} => {}",
                    pair[0].kind().as_str().to_uppercase(),
                    pair[0].key(),
                    pair[1].kind().as_str().to_uppercase(),
                    pair[1].key()
                )));
            }
        }

        for template in self.templates.values() {
            if !self.files.contains_key(&template.source) {
                return Err(Error::ValidationError(format!(
                    "template {} does not source a packaged file",
                    template.source
                )));
            }
        }

        Ok(())
    }

    fn to_wire(&self, signed: bool) -> ManifestWire {
        ManifestWire {
            zpkg: self.zpkg.clone(),
            tags: self.tags.values().cloned().collect(),
            requirements: self.requirements.values().cloned().collect(),
            dirs: self.dirs.values().cloned().collect(),
            files: self.files.values().cloned().collect(),
            symlinks: self.symlinks.values().cloned().collect(),
            templates: self.templates.values().cloned().collect(),
            services: self.services.values().cloned().collect(),
            signatures: if signed {
                self.signatures.values().cloned().collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_wire(true))?)
    }

    /// Serialize to the signing form: the wire form with signatures elided
    pub fn to_signing_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_wire(false))?)
    }

    /// Parse a manifest from its JSON wire form
    pub fn from_json(input: &str) -> Result<Self> {
        let wire: ManifestWire = serde_json::from_str(input)?;

        let mut manifest = Manifest::default();
        manifest.zpkg = wire.zpkg;
        for tag in wire.tags {
            manifest.add(Action::Tag(tag));
        }
        for requirement in wire.requirements {
            manifest.add(Action::Requirement(requirement));
        }
        for dir in wire.dirs {
            manifest.add(Action::Dir(dir));
        }
        for file in wire.files {
            manifest.add(Action::File(file));
        }
        for symlink in wire.symlinks {
            manifest.add(Action::SymLink(symlink));
        }
        for template in wire.templates {
            manifest.add(Action::Template(template));
        }
        for service in wire.services {
            manifest.add(Action::Service(service));
        }
        for signature in wire.signatures {
            manifest.add(Action::Signature(signature));
        }

        Ok(manifest)
    }
}
