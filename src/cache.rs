// src/cache.rs

//! Artifact and metadata cache
//!
//! One flat directory. Artifact names are content-derived
//! (`name@version-os-arch.zpkg`), so concurrent fetchers of the same
//! package write identical bytes and last-write-wins is safe. Repo
//! metadata is keyed by the SHA-256 of the fetch URI plus the platform.

use crate::error::Result;
use crate::pkg::OsArch;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Handle on the cache directory
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Open the cache, creating the directory if needed
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an artifact with this file name lives
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn has_artifact(&self, file_name: &str) -> bool {
        self.artifact_path(file_name).is_file()
    }

    /// Where the cached `packages.json` for a repo and platform lives
    pub fn meta_path(&self, uri: &str, osarch: &OsArch) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(uri.as_bytes());
        let repo_id = hex::encode(hasher.finalize());
        self.root
            .join(format!("{}.{}.packages.json", repo_id, osarch))
    }

    /// Drop every cached file
    pub fn clean(&self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
