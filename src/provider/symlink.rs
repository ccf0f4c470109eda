// src/provider/symlink.rs

//! Symbolic link provider

use super::{chown_best_effort, Context};
use crate::action::SymLink;
use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use tracing::debug;

/// Create the link, replacing a previous one at the same path
pub fn install(action: &SymLink, ctx: &Context) -> Result<()> {
    let path = ctx.image_path(&action.path);

    match fs::symlink_metadata(&path) {
        Ok(_) => fs::remove_file(&path)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    std::os::unix::fs::symlink(&action.target, &path)?;
    chown_best_effort(&path, &action.owner, &action.group, false);

    Ok(())
}

/// Unlink the link; already gone is fine
pub fn remove(action: &SymLink, ctx: &Context) -> Result<()> {
    let path = ctx.image_path(&action.path);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} was already gone", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
