// src/db/schema.rs

//! State database schema and migrations
//!
//! Three logical tables back the installed image: `packages` (one manifest
//! per installed name), `objects` (filesystem claims), and `transactions`
//! (append-only operation log). A `schema_version` table tracks applied
//! migrations.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("state db schema is up to date at version {}", current_version);
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("applying state db migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("unknown migration version: {}", version),
    }
}

/// Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("creating state db schema version 1");

    conn.execute_batch(
        "
        -- Packages: one manifest per installed name
        CREATE TABLE packages (
            name TEXT PRIMARY KEY,
            manifest TEXT NOT NULL
        );

        -- Objects: filesystem claims; a path may carry several dir claims
        -- but at most one file or symlink claim
        CREATE TABLE objects (
            path TEXT NOT NULL,
            pkg TEXT NOT NULL,
            type TEXT NOT NULL CHECK(type IN ('dir', 'file', 'symlink')),
            PRIMARY KEY (path, pkg)
        );

        CREATE INDEX idx_objects_path ON objects(path);
        CREATE INDEX idx_objects_pkg ON objects(pkg);

        -- Transactions: append-only operation log
        CREATE TABLE transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_id TEXT NOT NULL,
            pkg_id TEXT NOT NULL,
            operation TEXT NOT NULL CHECK(operation IN ('install', 'remove')),
            at TEXT NOT NULL
        );

        CREATE INDEX idx_transactions_tx_id ON transactions(tx_id);
        ",
    )?;

    Ok(())
}
