// src/publisher/mod.rs

//! Repository publishers
//!
//! A publisher owns the write side of a repository: initializing its
//! layout, maintaining `config.json`, and adding artifacts per platform
//! under an advisory lock. Contended locks fail fast; the caller may
//! retry. Only the `file://` transport publishes.

use crate::error::{Error, Result};
use crate::fetcher::split_uri;
use crate::pkg::{platforms, OsArch, Package};
use crate::repo::{Repo, RepoMeta};
use crate::zpkg;
use fs2::FileExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The write side of one repository
pub trait Publisher {
    /// Create (or reset) the repository layout
    fn init(&self) -> Result<()>;

    /// Rewrite the repo-level configuration
    fn update(&self) -> Result<()>;

    /// Add package artifacts, grouped per platform
    fn publish(&self, files: &[PathBuf]) -> Result<()>;
}

/// Select a publisher for a repo URI
pub fn get(uri: &str, name: &str, prune: usize) -> Result<Box<dyn Publisher>> {
    let (scheme, rest) = split_uri(uri)?;
    match scheme {
        "file" => Ok(Box::new(FilePublisher {
            root: PathBuf::from(rest),
            uri: uri.to_string(),
            name: name.to_string(),
            prune,
        })),
        _ => Err(Error::ConfigError(format!(
            "unsupported publish scheme: {}",
            scheme
        ))),
    }
}

/// Filesystem-backed repository
struct FilePublisher {
    root: PathBuf,
    uri: String,
    name: String,
    prune: usize,
}

impl Publisher for FilePublisher {
    fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        for osarch in platforms() {
            match fs::remove_dir_all(self.root.join(osarch.to_string())) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.configure()
    }

    fn update(&self) -> Result<()> {
        self.configure()
    }

    fn publish(&self, files: &[PathBuf]) -> Result<()> {
        let mut artifacts: Vec<(PathBuf, Package)> = Vec::new();
        for file in files {
            let reader = zpkg::Reader::open(file)?;
            artifacts.push((file.clone(), reader.package()?));
        }

        for osarch in platforms() {
            let group: Vec<&(PathBuf, Package)> = artifacts
                .iter()
                .filter(|(_, p)| p.os_arch() == osarch)
                .collect();
            if !group.is_empty() {
                self.publish_platform(&osarch, &group)?;
            }
        }

        Ok(())
    }
}

impl FilePublisher {
    /// Publish one platform's artifacts under the platform lock
    fn publish_platform(&self, osarch: &OsArch, group: &[&(PathBuf, Package)]) -> Result<()> {
        let platform_dir = self.root.join(osarch.to_string());
        fs::create_dir_all(&platform_dir)?;

        let lock_file = fs::File::create(platform_dir.join(".lock"))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(Error::LockContended(format!("{} {}", self.uri, osarch)));
        }

        let packages_path = platform_dir.join("packages.json");
        let meta = match fs::read(&packages_path) {
            Ok(bytes) => RepoMeta::load(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => RepoMeta::default(),
            Err(e) => return Err(e.into()),
        };

        let mut repo = Repo::new(&self.name, &self.uri, 0, true, meta.solvables);
        let rejects = repo.add(group.iter().map(|artifact| artifact.1.clone()).collect());
        for reject in &rejects {
            warn!("{} is already published, skipping", reject.id());
        }
        let rejected: BTreeSet<String> = rejects.iter().map(|p| p.id()).collect();

        let pruned = repo.prune(self.prune)?;

        if repo.solvables.is_empty() {
            match fs::remove_file(&packages_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        for artifact in group {
            let (file, package) = (&artifact.0, &artifact.1);
            if rejected.contains(&package.id()) {
                continue;
            }
            upload(file, &platform_dir.join(package.file_name()))?;
            info!("published {} to {} ({})", package.id(), self.uri, osarch);
        }

        for package in &pruned {
            match fs::remove_file(platform_dir.join(package.file_name())) {
                Ok(()) => info!("pruned {} from {} ({})", package.id(), self.uri, osarch),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let meta = RepoMeta {
            name: self.name.clone(),
            solvables: repo.solvables,
        };
        let mut staged = tempfile::NamedTempFile::new_in(&platform_dir)?;
        staged.write_all(&meta.to_json()?)?;
        staged
            .persist(&packages_path)
            .map_err(|e| Error::IoError(e.error))?;

        Ok(())
    }

    fn configure(&self) -> Result<()> {
        let mut config = BTreeMap::new();
        config.insert("name", self.name.as_str());
        fs::write(
            self.root.join("config.json"),
            serde_json::to_vec_pretty(&config)?,
        )?;
        Ok(())
    }
}

/// Copy an artifact into the repository, source opened read-only
fn upload(source: &Path, dest: &Path) -> Result<()> {
    let mut src = fs::File::open(source)?;
    let mut dst = fs::File::create(dest)?;
    io::copy(&mut src, &mut dst)?;
    Ok(())
}
