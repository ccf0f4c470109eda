// src/zpkg/mod.rs

//! The `.zpkg` archive container
//!
//! A package artifact is a gzip-compressed tar holding the manifest's JSON
//! wire form under `manifest.json` and one digest-addressed payload blob
//! per unique file under `payload/<sha256>`. Reading yields the manifest
//! and a streaming [`Payload`] handle; blobs are extracted on demand so a
//! large package is never held in memory.

use crate::action::{Action, ActionKind, Dir, File, Manifest, SymLink};
use crate::error::{Error, Result};
use crate::pkg::Package;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;
use walkdir::WalkDir;

/// Archive entry holding the manifest wire form
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Prefix for digest-addressed payload blobs
pub const PAYLOAD_PREFIX: &str = "payload/";

/// Write a `.zpkg` archive for a validated manifest
///
/// Payload bytes are read from `staging`, which mirrors the image layout
/// (a file action for `/usr/bin/x` reads `staging/usr/bin/x`). Blobs are
/// deduplicated by digest.
pub fn write(manifest: &Manifest, staging: &Path, output: &Path) -> Result<()> {
    manifest.validate()?;

    let file = fs::File::create(output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    let json = manifest.to_json()?;
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(json.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, MANIFEST_ENTRY, json.as_bytes())?;

    let mut written = BTreeSet::new();
    for action in manifest.section(&[ActionKind::File]) {
        let Action::File(file_action) = action else {
            continue;
        };
        if !written.insert(file_action.digest.clone()) {
            continue;
        }

        let source = staging.join(file_action.path.trim_start_matches('/'));
        let mut blob = fs::File::open(&source)?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(file_action.size);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(
            &mut header,
            format!("{}{}", PAYLOAD_PREFIX, file_action.digest),
            &mut blob,
        )?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    debug!("wrote package archive {}", output.display());
    Ok(())
}

/// Open archive: parsed manifest plus the path for payload streaming
pub struct Reader {
    path: PathBuf,
    pub manifest: Manifest,
}

impl Reader {
    /// Read and validate the manifest of an archive
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let mut archive = Archive::new(GzDecoder::new(file));

        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.path()?.to_string_lossy() == MANIFEST_ENTRY {
                let mut json = String::new();
                entry.read_to_string(&mut json)?;
                let manifest = Manifest::from_json(&json)?;
                manifest.validate()?;
                return Ok(Self {
                    path: path.to_path_buf(),
                    manifest,
                });
            }
        }

        Err(Error::ParseError(format!(
            "{} has no {} entry",
            path.display(),
            MANIFEST_ENTRY
        )))
    }

    /// The solvable this archive carries
    pub fn package(&self) -> Result<Package> {
        Package::from_manifest(&self.manifest)
    }

    /// Streaming handle over the archive's payload blobs
    pub fn payload(&self) -> Payload {
        Payload {
            archive: self.path.clone(),
        }
    }
}

/// Streaming access to an archive's payload blobs
pub struct Payload {
    archive: PathBuf,
}

impl Payload {
    /// Copy the blob named by `digest` into `dest`, returning its length
    pub fn extract_to(&self, digest: &str, dest: &mut dyn Write) -> Result<u64> {
        let wanted = format!("{}{}", PAYLOAD_PREFIX, digest);
        let file = fs::File::open(&self.archive)?;
        let mut archive = Archive::new(GzDecoder::new(file));

        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.path()?.to_string_lossy() == wanted {
                return Ok(io::copy(&mut entry, dest)?);
            }
        }

        Err(Error::NotFound(format!(
            "payload blob {} in {}",
            digest,
            self.archive.display()
        )))
    }
}

/// Fold a staging directory's contents into a manifest
///
/// Walks `staging` and appends a `dir`, `file`, or `symlink` action per
/// entry, computing digests and sizes along the way. Ownership defaults to
/// `root:root`; the staged tree's modes are kept.
pub fn stage(manifest: &mut Manifest, staging: &Path) -> Result<()> {
    for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::IoError(io::Error::other(format!(
                "walking {}: {}",
                staging.display(),
                e
            )))
        })?;

        let relative = entry
            .path()
            .strip_prefix(staging)
            .map_err(|e| Error::ParseError(e.to_string()))?;
        let path = format!("/{}", relative.to_string_lossy());
        let metadata = entry.path().symlink_metadata()?;
        let mode = format!("0{:o}", metadata.permissions().mode() & 0o7777);

        if metadata.file_type().is_symlink() {
            let target = fs::read_link(entry.path())?;
            manifest.add(Action::SymLink(SymLink {
                path,
                target: target.to_string_lossy().to_string(),
                owner: "root".to_string(),
                group: "root".to_string(),
            }));
        } else if metadata.is_dir() {
            manifest.add(Action::Dir(Dir {
                path,
                owner: "root".to_string(),
                group: "root".to_string(),
                mode,
            }));
        } else {
            let (digest, size) = digest_file(entry.path())?;
            manifest.add(Action::File(File {
                path,
                owner: "root".to_string(),
                group: "root".to_string(),
                mode,
                digest,
                size,
            }));
        }
    }

    Ok(())
}

/// SHA-256 and length of a file, streamed
pub fn digest_file(path: &Path) -> Result<(String, u64)> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    Ok((hex::encode(hasher.finalize()), size))
}
