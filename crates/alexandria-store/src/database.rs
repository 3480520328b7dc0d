//! Database connection management.
//!
//! [`Database`] wraps a [`rusqlite::Connection`] whose schema is guaranteed
//! to be migrated before any other call can touch it.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the client database in the platform data directory,
    /// e.g. `~/.local/share/alexandria/alexandria.db` on Linux.
    pub fn new() -> Result<Self> {
        let dirs =
            ProjectDirs::from("com", "alexandria", "alexandria").ok_or(StoreError::NoDataDir)?;
        std::fs::create_dir_all(dirs.data_dir())?;

        let db_path = dirs.data_dir().join("alexandria.db");
        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.  Tests and embedders
    /// with their own directory layout use this directly.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Direct access to the connection, for transactions and ad-hoc queries
    /// the typed helpers do not cover.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}
