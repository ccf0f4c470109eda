// src/error.rs

//! Crate-wide error type
//!
//! All fallible operations in the core return [`Result`]. Errors are not
//! logged here; callers (the CLI commands) render them.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the core
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed version, requirement, or manifest input
    #[error("parse error: {0}")]
    ParseError(String),

    /// Manifest failed its internal validation invariants
    #[error("validation error: {0}")]
    ValidationError(String),

    /// An install request matched nothing in the pool
    #[error("no candidates found for {0}")]
    NoCandidates(String),

    /// The solver exhausted every assignment; carries the decision trace
    #[error("unsatisfiable request:\n{0}")]
    Unsatisfiable(String),

    /// Dependency cycle among the selected packages
    #[error("cyclic dependency: {0}")]
    CyclicConflict(String),

    /// Two packages in one solution claim the same path
    #[error("package conflict:\n{0} {1} => {2}\n{3} {4} => {2}")]
    PackageConflict(String, String, String, String, String),

    /// A candidate claims a path owned by a different installed package
    #[error("{0} {1} from installed package {2} conflicts with candidate {3}")]
    ImageConflict(String, String, String, String),

    /// Repository platform directory is locked by another publisher
    #[error("repository {0} is locked by another process")]
    LockContended(String),

    /// Named entity (package, repo, template source) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Artifact or metadata transfer failed
    #[error("download error: {0}")]
    DownloadError(String),

    /// Configuration file is missing required data or malformed
    #[error("config error: {0}")]
    ConfigError(String),

    /// Transaction was cancelled between actions
    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}
