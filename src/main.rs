// src/main.rs
//! zpm - CLI entry point

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "zpm")]
#[command(author = "zpm contributors")]
#[command(version)]
#[command(about = "Transactional binary package manager for zpkg images", long_about = None)]
struct Cli {
    /// Image root to operate on
    #[arg(short, long, global = true, default_value = "/")]
    image: PathBuf,

    /// Probe cloud instance metadata for template rendering
    #[arg(long, global = true)]
    cloud: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages from configured repositories
    Install {
        /// Requirements, e.g. nginx or nginx>=1.24
        #[arg(required = true)]
        packages: Vec<String>,

        /// Candidate policy: updated or installed
        #[arg(long, default_value = "updated")]
        policy: String,
    },

    /// Remove installed packages
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Show what an install or remove would do
    Plan {
        /// install or remove
        action: String,

        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// List installed packages
    List,

    /// Refresh repository metadata
    Refresh,

    /// Drop cached artifacts and metadata
    Clean,

    /// Build a .zpkg from a manifest and a staging tree
    Build {
        /// Manifest JSON carrying the package identity
        manifest: PathBuf,

        /// Directory mirroring the image layout
        staging: PathBuf,

        /// Where to write the artifact
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Publish artifacts to a configured repository
    Publish {
        /// Repository name from the image configuration
        repo: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Initialize a repository's layout
    RepoInit {
        /// Repository name from the image configuration
        repo: String,
    },

    /// List configured repositories
    RepoList,

    /// List a repository's cached candidates
    RepoContents {
        repo: String,
    },

    /// Show the transaction log
    History,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Install { packages, policy } => {
            commands::install(&cli.image, &packages, &policy, cli.cloud)
        }
        Commands::Remove { packages } => commands::remove(&cli.image, &packages, cli.cloud),
        Commands::Plan { action, packages } => commands::plan(&cli.image, &action, &packages),
        Commands::List => commands::list(&cli.image),
        Commands::Refresh => commands::refresh(&cli.image),
        Commands::Clean => commands::clean(&cli.image),
        Commands::Build {
            manifest,
            staging,
            output,
        } => commands::build(&manifest, &staging, &output),
        Commands::Publish { repo, files } => commands::publish(&cli.image, &repo, &files),
        Commands::RepoInit { repo } => commands::repo_init(&cli.image, &repo),
        Commands::RepoList => commands::repo_list(&cli.image),
        Commands::RepoContents { repo } => commands::repo_contents(&cli.image, &repo),
        Commands::History => commands::history(&cli.image),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
