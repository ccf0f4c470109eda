// src/commands.rs

//! CLI command implementations
//!
//! Thin wrappers over [`zpm::Manager`]: parse user intent, run the
//! operation, render the outcome. Errors bubble up to `main` for display.

use anyhow::Result;
use std::path::{Path, PathBuf};
use zpm::solver::OperationKind;
use zpm::{Manager, Policy};

pub fn install(image: &Path, packages: &[String], policy: &str, cloud: bool) -> Result<()> {
    let policy: Policy = policy.parse()?;
    let mut manager = Manager::new(image)?
        .with_policy(policy)
        .with_cloud_metadata(cloud);

    let solution = manager.install(packages)?;
    for operation in solution.operations() {
        if operation.kind == OperationKind::Noop {
            println!("{} is already installed", operation.package.id());
        }
    }
    Ok(())
}

pub fn remove(image: &Path, packages: &[String], cloud: bool) -> Result<()> {
    let mut manager = Manager::new(image)?.with_cloud_metadata(cloud);
    manager.remove(packages)?;
    Ok(())
}

pub fn plan(image: &Path, action: &str, packages: &[String]) -> Result<()> {
    let manager = Manager::new(image)?;
    let solution = manager.plan(action, packages)?;

    if solution.is_empty() {
        println!("nothing to do");
        return Ok(());
    }
    for operation in solution.operations() {
        println!("{}", operation);
    }
    Ok(())
}

pub fn list(image: &Path) -> Result<()> {
    let manager = Manager::new(image)?;
    let rows = manager.list()?;

    if rows.is_empty() {
        println!("no packages installed");
        return Ok(());
    }
    for row in rows {
        println!("{}", row);
    }
    Ok(())
}

pub fn refresh(image: &Path) -> Result<()> {
    Manager::new(image)?.refresh()?;
    Ok(())
}

pub fn clean(image: &Path) -> Result<()> {
    Manager::new(image)?.clean()?;
    Ok(())
}

pub fn build(manifest: &Path, staging: &Path, output: &Path) -> Result<()> {
    let artifact = Manager::build(manifest, staging, output)?;
    println!("{}", artifact.display());
    Ok(())
}

pub fn publish(image: &Path, repo: &str, files: &[PathBuf]) -> Result<()> {
    Manager::new(image)?.publish(repo, files)?;
    Ok(())
}

pub fn repo_init(image: &Path, repo: &str) -> Result<()> {
    Manager::new(image)?.repo_init(repo)?;
    Ok(())
}

pub fn repo_list(image: &Path) -> Result<()> {
    let repos = Manager::new(image)?.repo_list();

    if repos.is_empty() {
        println!("no repositories configured");
        return Ok(());
    }
    for (name, uri) in repos {
        println!("{}|{}", name, uri);
    }
    Ok(())
}

pub fn repo_contents(image: &Path, repo: &str) -> Result<()> {
    let rows = Manager::new(image)?.repo_contents(repo)?;

    if rows.is_empty() {
        println!("no cached candidates for {}", repo);
        return Ok(());
    }
    for row in rows {
        println!("{}", row);
    }
    Ok(())
}

pub fn history(image: &Path) -> Result<()> {
    let entries = Manager::new(image)?.history()?;

    if entries.is_empty() {
        println!("no transactions recorded");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}|{}|{}|{}",
            entry.tx_id,
            entry.operation,
            entry.pkg_id,
            entry.at.to_rfc3339()
        );
    }
    Ok(())
}
