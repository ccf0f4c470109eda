// tests/common/mod.rs

//! Shared test utilities for integration tests.

// Each test binary uses its own subset of the builder
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zpm::action::{Action, Dir, File, Manifest, Requirement, Service, SymLink, Template, Zpkg};
use zpm::pkg::Package;
use zpm::version::Version;
use zpm::zpkg;

/// Builds a package manifest plus its staged payload tree.
pub struct PackageBuilder {
    pub manifest: Manifest,
    pub staging: TempDir,
}

impl PackageBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        let manifest = Manifest::new(Zpkg {
            name: name.to_string(),
            version: Version::parse(version).unwrap(),
            publisher: "tests".to_string(),
            arch: "x86_64".to_string(),
            os: "linux".to_string(),
            summary: format!("{} test package", name),
            description: String::new(),
        });
        Self {
            manifest,
            staging: TempDir::new().unwrap(),
        }
    }

    pub fn depends(mut self, req: &str) -> Self {
        self.manifest
            .add(Action::Requirement(Requirement::parse(req).unwrap()));
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        fs::create_dir_all(self.staging.path().join(path.trim_start_matches('/'))).unwrap();
        self.manifest.add(Action::Dir(Dir {
            path: path.to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: "0755".to_string(),
        }));
        self
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        let staged = self.staging.path().join(path.trim_start_matches('/'));
        fs::create_dir_all(staged.parent().unwrap()).unwrap();
        fs::write(&staged, content).unwrap();

        let (digest, size) = zpkg::digest_file(&staged).unwrap();
        self.manifest.add(Action::File(File {
            path: path.to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: "0644".to_string(),
            digest,
            size,
        }));
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.manifest.add(Action::SymLink(SymLink {
            path: path.to_string(),
            target: target.to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
        }));
        self
    }

    pub fn template(mut self, source: &str, output: &str) -> Self {
        self.manifest.add(Action::Template(Template {
            source: source.to_string(),
            output: output.to_string(),
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: "0640".to_string(),
        }));
        self
    }

    pub fn service(mut self, name: &str) -> Self {
        self.manifest.add(Action::Service(Service {
            name: name.to_string(),
            unit: None,
        }));
        self
    }

    pub fn package(&self) -> Package {
        Package::from_manifest(&self.manifest).unwrap()
    }

    /// Write the archive into `dir` under its canonical artifact name.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let output = dir.join(self.package().file_name());
        zpkg::write(&self.manifest, self.staging.path(), &output).unwrap();
        output
    }
}
