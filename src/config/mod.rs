// src/config/mod.rs

//! Image configuration
//!
//! Loaded from `etc/zpm/config.toml` under the image root when present,
//! with defaults that make a bare image usable. Configuration is threaded
//! through as a value; nothing in the core reads it from a global.

use crate::error::{Error, Result};
use crate::pkg::OsArch;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file location relative to the image root
pub const CONFIG_RELATIVE: &str = "etc/zpm/config.toml";

/// Everything the manager needs to operate one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZpmConfig {
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default, rename = "repo")]
    pub repos: Vec<RepoConfig>,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The image being managed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_path")]
    pub path: PathBuf,
    #[serde(default = "current_os")]
    pub os: String,
    #[serde(default = "current_arch")]
    pub arch: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            path: default_image_path(),
            os: current_os(),
            arch: current_arch(),
        }
    }
}

/// Optional overrides for the state db and cache locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub db: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

/// One configured repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    pub fetch: String,
    #[serde(default)]
    pub publish: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Versions of each name kept on publish; zero keeps everything
    #[serde(default)]
    pub prune: usize,
}

impl Default for ZpmConfig {
    fn default() -> Self {
        Self {
            image: ImageConfig::default(),
            repos: Vec::new(),
            paths: PathsConfig::default(),
        }
    }
}

impl ZpmConfig {
    /// Load the configuration for an image root
    pub fn load(image: &Path) -> Result<Self> {
        let file = image.join(CONFIG_RELATIVE);
        let mut config = if file.is_file() {
            let text = fs::read_to_string(&file)?;
            toml::from_str::<ZpmConfig>(&text).map_err(|e| {
                Error::ConfigError(format!("{}: {}", file.display(), e))
            })?
        } else {
            ZpmConfig::default()
        };

        config.image.path = image.to_path_buf();
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(|| self.image.path.join("var/lib/zpm/state.db"))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.paths
            .cache
            .clone()
            .unwrap_or_else(|| self.image.path.join("var/cache/zpm"))
    }

    /// The platform this image runs
    pub fn os_arch(&self) -> OsArch {
        OsArch::new(&self.image.os, &self.image.arch)
    }

    pub fn repo(&self, name: &str) -> Option<&RepoConfig> {
        self.repos.iter().find(|r| r.name == name)
    }
}

fn default_image_path() -> PathBuf {
    PathBuf::from("/")
}

fn default_enabled() -> bool {
    true
}

fn current_os() -> String {
    match env::consts::OS {
        "macos" => "darwin".to_string(),
        other => other.to_string(),
    }
}

fn current_arch() -> String {
    env::consts::ARCH.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_for_bare_image() {
        let image = TempDir::new().unwrap();
        let config = ZpmConfig::load(image.path()).unwrap();

        assert_eq!(config.image.path, image.path());
        assert!(config.repos.is_empty());
        assert_eq!(
            config.db_path(),
            image.path().join("var/lib/zpm/state.db")
        );
        assert_eq!(config.cache_path(), image.path().join("var/cache/zpm"));
    }

    #[test]
    fn test_load_from_file() {
        let image = TempDir::new().unwrap();
        fs::create_dir_all(image.path().join("etc/zpm")).unwrap();
        fs::write(
            image.path().join(CONFIG_RELATIVE),
            r#"
[image]
os = "linux"
arch = "x86_64"

[[repo]]
name = "main"
fetch = "file:///srv/repo"
publish = "file:///srv/repo"
priority = 10
prune = 3

[[repo]]
name = "extra"
fetch = "https://pkg.example.com/extra"
enabled = false
"#,
        )
        .unwrap();

        let config = ZpmConfig::load(image.path()).unwrap();
        assert_eq!(config.os_arch().to_string(), "linux-x86_64");
        assert_eq!(config.repos.len(), 2);

        let main = config.repo("main").unwrap();
        assert!(main.enabled);
        assert_eq!(main.priority, 10);
        assert_eq!(main.prune, 3);

        assert!(!config.repo("extra").unwrap().enabled);
        assert!(config.repo("ghost").is_none());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let image = TempDir::new().unwrap();
        fs::create_dir_all(image.path().join("etc/zpm")).unwrap();
        fs::write(image.path().join(CONFIG_RELATIVE), "image = nonsense [").unwrap();

        assert!(matches!(
            ZpmConfig::load(image.path()),
            Err(Error::ConfigError(_))
        ));
    }
}
