//! Database connection and schema migrations

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Current schema version, tracked with `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

const MIGRATIONS: &[&str] = &[
    // v1: user accounts and their credit balance
    "CREATE TABLE IF NOT EXISTS users (
        uid TEXT PRIMARY KEY,
        email TEXT,
        credits INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
];

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` and migrate it
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database, for tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&self) -> Result<()> {
        let current: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        for (idx, sql) in MIGRATIONS.iter().enumerate() {
            let version = idx as i32 + 1;
            if version <= current {
                continue;
            }
            self.conn
                .execute_batch(sql)
                .with_context(|| format!("Failed to apply migration v{}", version))?;
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {}", version))?;
            info!("Database migrated to v{}", version);
        }

        Ok(())
    }
}
