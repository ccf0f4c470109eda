// src/transaction/mod.rs

//! Transaction engine
//!
//! Applies a solver solution to the target image: opens the cached
//! artifacts, validates the combined plan against itself and against the
//! installed image, then walks the operations in solution order, realizing
//! each filesystem action through its provider and keeping the state
//! database current per action. The filesystem is not atomic across a
//! crash; the state database and transaction log are consistent up to the
//! last completed per-action update.
//!
//! One transaction at a time per image is the caller's contract; no
//! cross-process lock is taken here.

use crate::action::{Action, ActionKind};
use crate::cache::Cache;
use crate::db::StateDb;
use crate::error::{Error, Result};
use crate::pkg::Package;
use crate::provider::{self, Context, Phase};
use crate::solver::{OperationKind, Solution};
use crate::template::Scope;
use crate::zpkg;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Applies one solution to one image
pub struct Transaction<'a> {
    target: PathBuf,
    cache: &'a Cache,
    state: &'a StateDb,
    scope: Scope,
    id: String,
    date: DateTime<Utc>,
    cancel: Option<Arc<AtomicBool>>,
    readers: HashMap<String, zpkg::Reader>,
}

impl<'a> Transaction<'a> {
    pub fn new(target: &Path, cache: &'a Cache, state: &'a StateDb, scope: Scope) -> Self {
        Self {
            target: target.to_path_buf(),
            cache,
            state,
            scope,
            id: Uuid::new_v4().to_string(),
            date: Utc::now(),
            cancel: None,
            readers: HashMap::new(),
        }
    }

    /// Attach a cancellation token, checked between operations and actions
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The id every log entry of this transaction carries
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validate and apply a solution
    ///
    /// Conflict checks run before any mutation; a conflicting solution
    /// leaves both the image and the state database untouched.
    pub fn realize(&mut self, solution: &Solution) -> Result<()> {
        self.load_readers(solution)?;
        self.solution_conflicts(solution)?;
        self.image_conflicts(solution)?;

        for operation in solution.operations() {
            self.check_cancelled()?;

            match operation.kind {
                OperationKind::Remove => {
                    info!("- removing {}", operation.package.id());
                    self.remove(&operation.package)?;
                    self.record(&operation.package.id(), "remove")?;
                }
                OperationKind::Install => {
                    // A version of this name left behind by an externally
                    // built solution goes first, as a paired log entry
                    if let Some(manifest) = self.state.packages_get(&operation.package.name)? {
                        let existing = Package::from_manifest(&manifest)?;
                        if existing.version != operation.package.version {
                            info!("- removing {}", existing.id());
                            self.remove(&existing)?;
                            self.record(&existing.id(), "remove")?;
                        }
                    }

                    info!("+ installing {}", operation.package.id());
                    self.install(&operation.package)?;
                    self.record(&operation.package.id(), "install")?;
                }
                OperationKind::Noop => {}
            }
        }

        Ok(())
    }

    /// Open the cached artifact of every install operation
    fn load_readers(&mut self, solution: &Solution) -> Result<()> {
        for operation in solution.installs() {
            let file_name = operation.package.file_name();
            if !self.cache.has_artifact(&file_name) {
                return Err(Error::NotFound(format!("artifact {} in cache", file_name)));
            }

            let reader = zpkg::Reader::open(&self.cache.artifact_path(&file_name))?;
            let package = reader.package()?;
            self.readers.insert(package.name, reader);
        }
        Ok(())
    }

    /// Cross-package path conflicts within the solution itself
    ///
    /// Two install operations may only share a path when both claims are
    /// directories.
    fn solution_conflicts(&self, solution: &Solution) -> Result<()> {
        let mut claims: Vec<(Action, String)> = Vec::new();
        for operation in solution.installs() {
            let reader = &self.readers[&operation.package.name];
            for action in reader.manifest.fs_actions() {
                claims.push((action, operation.package.name.clone()));
            }
        }

        claims.sort_by(|a, b| {
            a.0.key()
                .cmp(b.0.key())
                .then(a.0.kind().as_str().cmp(b.0.kind().as_str()))
                .then(a.1.cmp(&b.1))
        });

        for pair in claims.windows(2) {
            let (prev, prev_pkg) = &pair[0];
            let (next, next_pkg) = &pair[1];
            if prev.key() == next.key()
                && !(prev.kind() == ActionKind::Dir && next.kind() == ActionKind::Dir)
            {
                return Err(Error::PackageConflict(
                    prev_pkg.clone(),
                    prev.kind().as_str().to_uppercase(),
                    prev.key().to_string(),
                    next_pkg.clone(),
                    next.kind().as_str().to_uppercase(),
                ));
            }
        }

        Ok(())
    }

    /// Path conflicts between the solution and the installed image
    ///
    /// A candidate claim fails when another installed package holds the
    /// path and neither claim is a directory.
    fn image_conflicts(&self, solution: &Solution) -> Result<()> {
        for operation in solution.installs() {
            let reader = &self.readers[&operation.package.name];
            for action in reader.manifest.fs_actions() {
                for entry in self.state.objects_get(action.key())? {
                    if entry.pkg != operation.package.name
                        && entry.kind != ActionKind::Dir.as_str()
                        && action.kind() != ActionKind::Dir
                    {
                        return Err(Error::ImageConflict(
                            entry.kind.clone(),
                            entry.path.clone(),
                            entry.pkg.clone(),
                            operation.package.name.clone(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Install one package from its archive
    fn install(&self, package: &Package) -> Result<()> {
        let reader = self
            .readers
            .get(&package.name)
            .ok_or_else(|| Error::NotFound(format!("reader for {}", package.name)))?;
        let manifest = &reader.manifest;
        let payload = reader.payload();
        let ctx = Context {
            target: &self.target,
            payload: Some(&payload),
            scope: &self.scope,
        };

        // Path-ascending order puts parents before children
        for action in manifest.fs_actions() {
            self.check_cancelled()?;
            self.apply(&action, Phase::Install, &ctx)?;
        }

        for action in manifest.section(&[ActionKind::Template]) {
            self.check_cancelled()?;
            self.apply(&action, Phase::Configure, &ctx)?;
        }

        self.state.packages_put(&package.name, manifest)?;
        for action in manifest.fs_actions() {
            self.state
                .objects_put(action.key(), &package.name, action.kind())?;
        }

        Ok(())
    }

    /// Remove one installed package
    fn remove(&self, package: &Package) -> Result<()> {
        let Some(manifest) = self.state.packages_get(&package.name)? else {
            return Ok(());
        };

        let ctx = Context {
            target: &self.target,
            payload: None,
            scope: &self.scope,
        };

        // Deepest paths first
        let actions = manifest.fs_actions();
        for action in actions.iter().rev() {
            self.check_cancelled()?;

            if action.kind() == ActionKind::Dir && self.shared_dir(action.key(), &package.name)? {
                continue;
            }

            self.apply(action, Phase::Remove, &ctx)?;
        }

        self.state.packages_del(&package.name)?;
        for action in &actions {
            self.state.objects_del(action.key(), &package.name)?;
        }

        Ok(())
    }

    /// A directory still claimed by some other installed package
    fn shared_dir(&self, path: &str, pkg: &str) -> Result<bool> {
        Ok(self
            .state
            .objects_get(path)?
            .iter()
            .any(|entry| entry.pkg != pkg))
    }

    /// Realize one action, honoring its may-fail flag
    fn apply(&self, action: &Action, phase: Phase, ctx: &Context) -> Result<()> {
        match provider::realize(action, phase, ctx) {
            Err(e) if action.may_fail() => {
                warn!("{}: {}", action.id(), e);
                Ok(())
            }
            other => other,
        }
    }

    fn record(&self, pkg_id: &str, operation: &str) -> Result<()> {
        self.state
            .transactions_put(&self.id, pkg_id, operation, self.date)
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }
}

/// Rebuild the installed repo's solvables from the state database
pub fn installed_packages(state: &StateDb) -> Result<Vec<Package>> {
    state
        .packages_all()?
        .iter()
        .map(Package::from_manifest)
        .collect()
}
