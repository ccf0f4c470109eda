// src/db/mod.rs

//! Persistent image state
//!
//! [`StateDb`] wraps the SQLite database recording what is installed: the
//! `Packages`, `Objects`, and `Transactions` table contracts. Every call
//! is atomic on its own; grouping calls into a larger unit is the
//! transaction engine's job.

pub mod models;
pub mod schema;

use crate::action::{ActionKind, Manifest};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use models::{ObjectEntry, PackageRow, TransactionEntry};
use rusqlite::Connection;
use std::path::Path;

/// Handle to the installed-image state database
pub struct StateDb {
    conn: Connection,
}

impl StateDb {
    /// Open (creating and migrating as needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database, for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Store the manifest of an installed package
    pub fn packages_put(&self, name: &str, manifest: &Manifest) -> Result<()> {
        PackageRow::put(&self.conn, name, &manifest.to_json()?)
    }

    /// Fetch the manifest of an installed package
    pub fn packages_get(&self, name: &str) -> Result<Option<Manifest>> {
        match PackageRow::get(&self.conn, name)? {
            Some(json) => Ok(Some(Manifest::from_json(&json)?)),
            None => Ok(None),
        }
    }

    /// Forget an installed package
    pub fn packages_del(&self, name: &str) -> Result<()> {
        PackageRow::delete(&self.conn, name)
    }

    /// Every installed manifest, ordered by name
    pub fn packages_all(&self) -> Result<Vec<Manifest>> {
        PackageRow::list_all(&self.conn)?
            .iter()
            .map(|json| Manifest::from_json(json))
            .collect()
    }

    /// Claim a path for a package
    ///
    /// Directories may be claimed by several packages; a file or symlink
    /// claim must be the path's only claim from another package.
    pub fn objects_put(&self, path: &str, pkg: &str, kind: ActionKind) -> Result<()> {
        let existing = ObjectEntry::find_by_path(&self.conn, path)?;
        for entry in &existing {
            if entry.pkg == pkg {
                continue;
            }
            if kind != ActionKind::Dir || entry.kind != ActionKind::Dir.as_str() {
                return Err(Error::ImageConflict(
                    entry.kind.clone(),
                    path.to_string(),
                    entry.pkg.clone(),
                    pkg.to_string(),
                ));
            }
        }

        ObjectEntry::new(path, pkg, kind.as_str()).insert(&self.conn)
    }

    /// All claims on a path
    pub fn objects_get(&self, path: &str) -> Result<Vec<ObjectEntry>> {
        ObjectEntry::find_by_path(&self.conn, path)
    }

    /// Release one package's claim on a path
    pub fn objects_del(&self, path: &str, pkg: &str) -> Result<()> {
        ObjectEntry::delete(&self.conn, path, pkg)
    }

    /// Append an entry to the transaction log
    pub fn transactions_put(
        &self,
        tx_id: &str,
        pkg_id: &str,
        operation: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        TransactionEntry::new(tx_id, pkg_id, operation, at).insert(&self.conn)
    }

    /// Entries recorded under one transaction id
    pub fn transactions_get(&self, tx_id: &str) -> Result<Vec<TransactionEntry>> {
        TransactionEntry::find_by_tx(&self.conn, tx_id)
    }

    /// The whole transaction log, oldest first
    pub fn transactions_all(&self) -> Result<Vec<TransactionEntry>> {
        TransactionEntry::list_all(&self.conn)
    }
}
