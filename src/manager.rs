// src/manager.rs

//! Top-level operations over one image
//!
//! The manager wires configuration, state database, cache, pool, solver,
//! fetchers, publishers, and the transaction engine into the operations
//! the CLI exposes. One manager instance works one image; one operation
//! runs at a time.

use crate::cache::Cache;
use crate::cloud;
use crate::config::ZpmConfig;
use crate::db::models::TransactionEntry;
use crate::db::StateDb;
use crate::error::{Error, Result};
use crate::fetcher;
use crate::pkg::Package;
use crate::pool::Pool;
use crate::publisher;
use crate::repo::{Repo, RepoMeta};
use crate::solver::{Policy, Request, Solution, Solver};
use crate::template::Scope;
use crate::transaction::Transaction;
use crate::zpkg;
use crate::action::{Manifest, Requirement};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Facade over every image-level operation
pub struct Manager {
    config: ZpmConfig,
    state: StateDb,
    cache: Cache,
    policy: Policy,
    /// Probe cloud metadata for the template scope
    cloud_metadata: bool,
}

impl Manager {
    /// Open the manager for an image root
    pub fn new(image: &Path) -> Result<Self> {
        let config = ZpmConfig::load(image)?;
        let state = StateDb::open(&config.db_path())?;
        let cache = Cache::open(&config.cache_path())?;
        Ok(Self {
            config,
            state,
            cache,
            policy: Policy::Updated,
            cloud_metadata: false,
        })
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable cloud metadata enrichment of the template scope
    pub fn with_cloud_metadata(mut self, enabled: bool) -> Self {
        self.cloud_metadata = enabled;
        self
    }

    pub fn config(&self) -> &ZpmConfig {
        &self.config
    }

    /// Solve a request without touching the image
    pub fn plan(&self, action: &str, args: &[String]) -> Result<Solution> {
        if action != "install" && action != "remove" {
            return Err(Error::ParseError(
                "plan action must be install or remove".to_string(),
            ));
        }

        let pool = self.pool()?;
        let mut request = Request::new();
        for arg in args {
            let req = Requirement::parse(arg)?;
            match action {
                "install" => request.install(req),
                _ => request.remove(req),
            }
        }

        Solver::new(&pool, self.policy).solve(&request)
    }

    /// Install packages by requirement
    pub fn install(&mut self, args: &[String]) -> Result<Solution> {
        let pool = self.pool()?;
        let mut request = Request::new();
        for arg in args {
            request.install(Requirement::parse(arg)?);
        }

        let solution = Solver::new(&pool, self.policy).solve(&request)?;
        self.fetch_artifacts(&solution)?;
        self.apply(&solution)?;
        Ok(solution)
    }

    /// Remove installed packages by requirement
    pub fn remove(&mut self, args: &[String]) -> Result<Solution> {
        let pool = self.pool()?;
        let mut request = Request::new();
        for arg in args {
            request.remove(Requirement::parse(arg)?);
        }

        let solution = Solver::new(&pool, self.policy).solve(&request)?;
        self.apply(&solution)?;
        Ok(solution)
    }

    /// Listing rows for every installed package, name order
    pub fn list(&self) -> Result<Vec<String>> {
        let packages = crate::transaction::installed_packages(&self.state)?;
        Ok(packages.iter().map(|p| p.columns()).collect())
    }

    /// Refresh every enabled repo's cached metadata
    ///
    /// All repos are attempted; the first failure is reported after the
    /// rest have had their chance.
    pub fn refresh(&self) -> Result<()> {
        let osarch = self.config.os_arch();
        let mut first_error = None;

        for repo in self.config.repos.iter().filter(|r| r.enabled) {
            let result = fetcher::get(&repo.fetch, &osarch, &self.cache)
                .and_then(|f| f.refresh());
            if let Err(e) = result {
                warn!("refresh of {} failed: {}", repo.name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Publish artifacts to a configured repo
    pub fn publish(&self, repo_name: &str, files: &[PathBuf]) -> Result<()> {
        let repo = self.publishable(repo_name)?;
        publisher::get(
            repo.publish.as_deref().unwrap(),
            &repo.name,
            repo.prune,
        )?
        .publish(files)
    }

    /// Initialize a configured repo's layout
    pub fn repo_init(&self, repo_name: &str) -> Result<()> {
        let repo = self.publishable(repo_name)?;
        publisher::get(repo.publish.as_deref().unwrap(), &repo.name, repo.prune)?.init()
    }

    /// `(name, fetch uri)` for every configured repo
    pub fn repo_list(&self) -> Vec<(String, String)> {
        self.config
            .repos
            .iter()
            .map(|r| (r.name.clone(), r.fetch.clone()))
            .collect()
    }

    /// Listing rows for a repo's cached candidates
    pub fn repo_contents(&self, repo_name: &str) -> Result<Vec<String>> {
        let repo = self
            .config
            .repo(repo_name)
            .ok_or_else(|| Error::NotFound(format!("repo {}", repo_name)))?;

        let meta = self.cached_meta(&repo.fetch)?;
        Ok(meta
            .for_platform(&self.config.os_arch())
            .iter()
            .map(|p| p.columns())
            .collect())
    }

    /// The whole transaction log
    pub fn history(&self) -> Result<Vec<TransactionEntry>> {
        self.state.transactions_all()
    }

    /// Drop every cached artifact and metadata file
    pub fn clean(&self) -> Result<()> {
        self.cache.clean()?;
        info!("cleaned {}", self.cache.root().display());
        Ok(())
    }

    /// Build a `.zpkg` from a manifest file plus a staging tree
    ///
    /// The manifest file carries the identity, requirement, tag, template,
    /// and service actions; the filesystem actions are derived from the
    /// staged tree. Returns the written artifact path.
    pub fn build(manifest_path: &Path, staging: &Path, output_dir: &Path) -> Result<PathBuf> {
        let mut manifest = Manifest::from_json(&fs::read_to_string(manifest_path)?)?;
        zpkg::stage(&mut manifest, staging)?;
        manifest.validate()?;

        let package = Package::from_manifest(&manifest)?;
        fs::create_dir_all(output_dir)?;
        let output = output_dir.join(package.file_name());
        zpkg::write(&manifest, staging, &output)?;

        info!("built {}", output.display());
        Ok(output)
    }

    /// Assemble the pool: installed image plus cached remote metadata
    fn pool(&self) -> Result<Pool> {
        let installed = Repo::installed(crate::transaction::installed_packages(&self.state)?);

        let osarch = self.config.os_arch();
        let mut remotes = Vec::new();
        for repo in self.config.repos.iter().filter(|r| r.enabled) {
            let meta = self.cached_meta(&repo.fetch)?;
            remotes.push(Repo::new(
                &repo.name,
                &repo.fetch,
                repo.priority,
                repo.enabled,
                meta.for_platform(&osarch),
            ));
        }

        Pool::new(installed, remotes)
    }

    /// Load a repo's cached `packages.json`; absent means empty
    fn cached_meta(&self, uri: &str) -> Result<RepoMeta> {
        let path = self.cache.meta_path(uri, &self.config.os_arch());
        match fs::read(&path) {
            Ok(bytes) => RepoMeta::load(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RepoMeta::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Bring every install operation's artifact into the cache
    fn fetch_artifacts(&self, solution: &Solution) -> Result<()> {
        let osarch = self.config.os_arch();
        for operation in solution.installs() {
            let package = &operation.package;
            let uri = package
                .location
                .as_ref()
                .map(|l| l.uri.clone())
                .ok_or_else(|| Error::NotFound(format!("location of {}", package.id())))?;

            fetcher::get(&uri, &osarch, &self.cache)?.fetch(package)?;
            info!("fetched {}", package.id());
        }
        Ok(())
    }

    /// Run a solution through the transaction engine
    fn apply(&mut self, solution: &Solution) -> Result<()> {
        if solution.is_empty() {
            info!("nothing to do");
            return Ok(());
        }

        let image = self.config.image.path.clone();
        let mut transaction =
            Transaction::new(&image, &self.cache, &self.state, self.scope());
        transaction.realize(solution)
    }

    /// Template evaluation scope for this image
    fn scope(&self) -> Scope {
        let mut scope = Scope::new();
        scope.set("image.path", &self.config.image.path.to_string_lossy());
        scope.set("image.os", &self.config.image.os);
        scope.set("image.arch", &self.config.image.arch);

        if self.cloud_metadata {
            cloud::fetch().into_scope(&mut scope);
        } else {
            cloud::CloudMeta::unknown().into_scope(&mut scope);
        }

        scope
    }

    fn publishable(&self, repo_name: &str) -> Result<&crate::config::RepoConfig> {
        self.config
            .repo(repo_name)
            .filter(|r| r.publish.is_some())
            .ok_or_else(|| Error::NotFound(format!("publishable repo {}", repo_name)))
    }
}
