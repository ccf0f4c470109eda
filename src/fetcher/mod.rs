// src/fetcher/mod.rs

//! Artifact and metadata fetchers
//!
//! A fetcher moves one repo's artifacts and its per-platform
//! `packages.json` into the local cache. The transport is chosen from the
//! repo URI's scheme; `file://` and `http(s)://` are implemented.

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::pkg::{OsArch, Package};
use reqwest::blocking::Client;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One repo's transport
pub trait Fetcher {
    /// Bring a package's artifact into the cache, returning its path
    fn fetch(&self, package: &Package) -> Result<PathBuf>;

    /// Refresh the cached repo metadata for this platform
    fn refresh(&self) -> Result<()>;
}

/// Select a fetcher for a repo URI
pub fn get(uri: &str, osarch: &OsArch, cache: &Cache) -> Result<Box<dyn Fetcher>> {
    let (scheme, rest) = split_uri(uri)?;
    match scheme {
        "file" => Ok(Box::new(FileFetcher {
            root: PathBuf::from(rest),
            uri: uri.to_string(),
            osarch: osarch.clone(),
            cache: cache.clone(),
        })),
        "http" | "https" => {
            let client = Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .map_err(|e| Error::DownloadError(e.to_string()))?;
            Ok(Box::new(HttpFetcher {
                base: uri.trim_end_matches('/').to_string(),
                uri: uri.to_string(),
                osarch: osarch.clone(),
                cache: cache.clone(),
                client,
            }))
        }
        _ => Err(Error::ConfigError(format!(
            "unsupported fetch scheme: {}",
            scheme
        ))),
    }
}

pub(crate) fn split_uri(uri: &str) -> Result<(&str, &str)> {
    uri.split_once("://")
        .ok_or_else(|| Error::ConfigError(format!("invalid uri: {}", uri)))
}

/// Local filesystem repository
struct FileFetcher {
    root: PathBuf,
    uri: String,
    osarch: OsArch,
    cache: Cache,
}

impl Fetcher for FileFetcher {
    fn fetch(&self, package: &Package) -> Result<PathBuf> {
        let file_name = package.file_name();
        let source = self.root.join(self.osarch.to_string()).join(&file_name);
        if !source.is_file() {
            return Err(Error::NotFound(format!("artifact {}", source.display())));
        }

        let dest = self.cache.artifact_path(&file_name);
        fs::copy(&source, &dest)?;
        debug!("fetched {} from {}", file_name, self.uri);
        Ok(dest)
    }

    fn refresh(&self) -> Result<()> {
        let source = self
            .root
            .join(self.osarch.to_string())
            .join("packages.json");
        if !source.is_file() {
            return Err(Error::NotFound(format!(
                "repository metadata {}",
                source.display()
            )));
        }

        let dest = self.cache.meta_path(&self.uri, &self.osarch);
        fs::copy(&source, &dest)?;
        info!("refreshed {} ({})", self.uri, self.osarch);
        Ok(())
    }
}

/// HTTP repository
struct HttpFetcher {
    base: String,
    /// Configured URI, verbatim; the cache keys metadata by it
    uri: String,
    osarch: OsArch,
    cache: Cache,
    client: Client,
}

impl HttpFetcher {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::DownloadError(format!("{}: {}", url, e)))?;

        // Stage next to the destination; the rename keeps readers from
        // ever seeing a partial file
        let mut staged = tempfile::NamedTempFile::new_in(self.cache.root())?;
        io::copy(&mut response, &mut staged)
            .map_err(|e| Error::DownloadError(format!("{}: {}", url, e)))?;
        staged
            .persist(dest)
            .map_err(|e| Error::IoError(e.error))?;
        Ok(())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, package: &Package) -> Result<PathBuf> {
        let file_name = package.file_name();
        let url = format!("{}/{}/{}", self.base, self.osarch, file_name);
        let dest = self.cache.artifact_path(&file_name);
        self.download(&url, &dest)?;
        debug!("fetched {} from {}", file_name, self.base);
        Ok(dest)
    }

    fn refresh(&self) -> Result<()> {
        let url = format!("{}/{}/packages.json", self.base, self.osarch);
        let dest = self.cache.meta_path(&self.uri, &self.osarch);
        self.download(&url, &dest)?;
        info!("refreshed {} ({})", self.base, self.osarch);
        Ok(())
    }
}
