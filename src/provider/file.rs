// src/provider/file.rs

//! Regular file provider

use super::{chown_best_effort, Context};
use crate::action::{parse_mode, File};
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use tracing::debug;

/// Hashes bytes as they stream through to the destination
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Stream the payload blob to the declared path, then verify and chmod
pub fn install(action: &File, ctx: &Context) -> Result<()> {
    let payload = ctx
        .payload
        .ok_or_else(|| Error::NotFound(format!("payload for {}", action.path)))?;
    let path = ctx.image_path(&action.path);

    let dest = fs::File::create(&path)?;
    let mut writer = HashingWriter {
        inner: dest,
        hasher: Sha256::new(),
    };
    let copied = payload.extract_to(&action.digest, &mut writer)?;
    writer.flush()?;

    let actual = hex::encode(writer.hasher.finalize());
    if actual != action.digest {
        return Err(Error::ValidationError(format!(
            "digest mismatch for {}: expected {}, got {}",
            action.path, action.digest, actual
        )));
    }
    if copied != action.size {
        return Err(Error::ValidationError(format!(
            "size mismatch for {}: expected {}, got {}",
            action.path, action.size, copied
        )));
    }

    let mode = parse_mode(&action.mode)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
    chown_best_effort(&path, &action.owner, &action.group, true);

    Ok(())
}

/// Unlink the file; already gone is fine
pub fn remove(action: &File, ctx: &Context) -> Result<()> {
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
