// src/db/models.rs

//! Row models for the state database tables

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use chrono::{DateTime, Utc};

/// A filesystem claim held by an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub pkg: String,
    /// Action type tag: `dir`, `file`, or `symlink`
    pub kind: String,
}

impl ObjectEntry {
    pub fn new(path: &str, pkg: &str, kind: &str) -> Self {
        Self {
            path: path.to_string(),
            pkg: pkg.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO objects (path, pkg, type) VALUES (?1, ?2, ?3)",
            params![&self.path, &self.pkg, &self.kind],
        )?;
        Ok(())
    }

    /// Every claim on a path, ordered by claiming package
    pub fn find_by_path(conn: &Connection, path: &str) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT path, pkg, type FROM objects WHERE path = ?1 ORDER BY pkg")?;
        let entries = stmt
            .query_map([path], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Remove one package's claim on a path
    pub fn delete(conn: &Connection, path: &str, pkg: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM objects WHERE path = ?1 AND pkg = ?2",
            params![path, pkg],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            pkg: row.get(1)?,
            kind: row.get(2)?,
        })
    }
}

/// One entry of the append-only transaction log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEntry {
    pub tx_id: String,
    pub pkg_id: String,
    pub operation: String,
    pub at: DateTime<Utc>,
}

impl TransactionEntry {
    pub fn new(tx_id: &str, pkg_id: &str, operation: &str, at: DateTime<Utc>) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            pkg_id: pkg_id.to_string(),
            operation: operation.to_string(),
            at,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO transactions (tx_id, pkg_id, operation, at) VALUES (?1, ?2, ?3, ?4)",
            params![&self.tx_id, &self.pkg_id, &self.operation, self.at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Entries for one transaction id, oldest first
    pub fn find_by_tx(conn: &Connection, tx_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT tx_id, pkg_id, operation, at FROM transactions WHERE tx_id = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map([tx_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// The whole log, oldest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT tx_id, pkg_id, operation, at FROM transactions ORDER BY id")?;
        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let at: String = row.get(3)?;
        let at = DateTime::parse_from_rfc3339(&at)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
            .with_timezone(&Utc);

        Ok(Self {
            tx_id: row.get(0)?,
            pkg_id: row.get(1)?,
            operation: row.get(2)?,
            at,
        })
    }
}

/// Manifest storage for installed packages
pub struct PackageRow;

impl PackageRow {
    pub fn put(conn: &Connection, name: &str, manifest_json: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO packages (name, manifest) VALUES (?1, ?2)",
            params![name, manifest_json],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, name: &str) -> Result<Option<String>> {
        let manifest = conn
            .query_row(
                "SELECT manifest FROM packages WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(manifest)
    }

    pub fn delete(conn: &Connection, name: &str) -> Result<()> {
        conn.execute("DELETE FROM packages WHERE name = ?1", [name])?;
        Ok(())
    }

    /// Every installed manifest, ordered by name
    pub fn list_all(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT manifest FROM packages ORDER BY name")?;
        let manifests = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(manifests)
    }
}
