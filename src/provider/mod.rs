// src/provider/mod.rs

//! Action realization
//!
//! A provider is the behavioral half of one action variant in one phase.
//! Dispatch is a single exhaustive match over `(variant, phase)`; variants
//! with no filesystem behavior in a phase fall through to a no-op. All
//! paths are resolved against the target image root, never the process
//! root.

mod dir;
mod file;
mod symlink;
mod template;

use crate::action::Action;
use crate::error::Result;
use crate::template::Scope;
use crate::zpkg::Payload;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which side of an operation is being realized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Install,
    Remove,
    /// Post-install template rendering
    Configure,
}

/// Everything a provider may need
pub struct Context<'a> {
    /// Image root all action paths are joined under
    pub target: &'a Path,
    /// Payload handle of the archive being installed, if any
    pub payload: Option<&'a Payload>,
    /// Evaluation scope for template rendering
    pub scope: &'a Scope,
}

impl Context<'_> {
    /// Resolve an action path under the image root
    pub fn image_path(&self, path: &str) -> PathBuf {
        self.target.join(path.trim_start_matches('/'))
    }
}

/// Realize one action for one phase
pub fn realize(action: &Action, phase: Phase, ctx: &Context) -> Result<()> {
    match (action, phase) {
        (Action::Dir(a), Phase::Install) => dir::install(a, ctx),
        (Action::Dir(a), Phase::Remove) => dir::remove(a, ctx),
        (Action::File(a), Phase::Install) => file::install(a, ctx),
        (Action::File(a), Phase::Remove) => file::remove(a, ctx),
        (Action::SymLink(a), Phase::Install) => symlink::install(a, ctx),
        (Action::SymLink(a), Phase::Remove) => symlink::remove(a, ctx),
        (Action::Template(a), Phase::Configure) => template::configure(a, ctx),
        _ => {
            debug!("{} has no behavior in {:?} phase", action.id(), phase);
            Ok(())
        }
    }
}

/// Apply declared ownership if the named user and group exist
///
/// Only a super user may chown to another user, and the declared names may
/// not exist on this image at all, so failures are silent.
pub(crate) fn chown_best_effort(path: &Path, owner: &str, group: &str, follow: bool) {
    let uid = nix::unistd::User::from_name(owner)
        .ok()
        .flatten()
        .map(|u| u.uid.as_raw());
    let gid = nix::unistd::Group::from_name(group)
        .ok()
        .flatten()
        .map(|g| g.gid.as_raw());

    if uid.is_none() && gid.is_none() {
        return;
    }

    let _ = if follow {
        std::os::unix::fs::chown(path, uid, gid)
    } else {
        std::os::unix::fs::lchown(path, uid, gid)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Dir, SymLink};
    use std::fs;
    use tempfile::TempDir;

    fn ctx_scope() -> Scope {
        Scope::new()
    }

    #[test]
    fn test_dir_install_and_remove() {
        let image = TempDir::new().unwrap();
        let scope = ctx_scope();
        let ctx = Context {
            target: image.path(),
            payload: None,
            scope: &scope,
        };

        let action = Action::Dir(Dir {
            path: "/etc/demo".to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: "0755".to_string(),
        });

        fs::create_dir_all(image.path().join("etc")).unwrap();
        realize(&action, Phase::Install, &ctx).unwrap();
        assert!(image.path().join("etc/demo").is_dir());

        // Install onto an existing directory is fine
        realize(&action, Phase::Install, &ctx).unwrap();

        realize(&action, Phase::Remove, &ctx).unwrap();
        assert!(!image.path().join("etc/demo").exists());
    }

    #[test]
    fn test_dir_remove_skips_non_empty() {
        let image = TempDir::new().unwrap();
        let scope = ctx_scope();
        let ctx = Context {
            target: image.path(),
            payload: None,
            scope: &scope,
        };

        fs::create_dir_all(image.path().join("etc/demo")).unwrap();
        fs::write(image.path().join("etc/demo/keep"), b"x").unwrap();

        let action = Action::Dir(Dir {
            path: "/etc/demo".to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: "0755".to_string(),
        });

        realize(&action, Phase::Remove, &ctx).unwrap();
        assert!(image.path().join("etc/demo/keep").is_file());
    }

    #[test]
    fn test_symlink_install_and_remove() {
        let image = TempDir::new().unwrap();
        let scope = ctx_scope();
        let ctx = Context {
            target: image.path(),
            payload: None,
            scope: &scope,
        };

        fs::create_dir_all(image.path().join("usr/bin")).unwrap();

        let action = Action::SymLink(SymLink {
            path: "/usr/bin/d".to_string(),
            target: "demo".to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
        });

        realize(&action, Phase::Install, &ctx).unwrap();
        let link = image.path().join("usr/bin/d");
        assert_eq!(fs::read_link(&link).unwrap().to_string_lossy(), "demo");

        // Reinstall replaces the link
        realize(&action, Phase::Install, &ctx).unwrap();

        realize(&action, Phase::Remove, &ctx).unwrap();
        assert!(!link.exists());
    }

    #[test]
    fn test_meta_actions_are_noops() {
        let image = TempDir::new().unwrap();
        let scope = ctx_scope();
        let ctx = Context {
            target: image.path(),
            payload: None,
            scope: &scope,
        };

        let action = Action::Tag(crate::action::Tag {
            name: "channel".to_string(),
            value: None,
        });
        realize(&action, Phase::Install, &ctx).unwrap();
        realize(&action, Phase::Remove, &ctx).unwrap();
    }
}
