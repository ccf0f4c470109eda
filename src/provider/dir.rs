// src/provider/dir.rs

//! Directory provider

use super::{chown_best_effort, Context};
use crate::action::{parse_mode, Dir};
use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use tracing::debug;

/// Ensure the directory exists with its declared mode and ownership
pub fn install(action: &Dir, ctx: &Context) -> Result<()> {
    let path = ctx.image_path(&action.path);

    match fs::create_dir(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => {}
        Err(e) => return Err(e.into()),
    }

    let mode = parse_mode(&action.mode)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
    chown_best_effort(&path, &action.owner, &action.group, true);

    Ok(())
}

/// Remove the directory if nothing is left inside it
///
/// The transaction engine has already excluded directories still claimed
/// by another installed package; a directory holding unpackaged files is
/// left alone.
pub fn remove(action: &Dir, ctx: &Context) -> Result<()> {
    let path = ctx.image_path(&action.path);

    match fs::read_dir(&path) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                debug!("leaving non-empty directory {}", path.display());
                return Ok(());
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    fs::remove_dir(&path)?;
    Ok(())
}
