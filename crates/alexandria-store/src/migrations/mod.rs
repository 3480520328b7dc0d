//! Schema migrations.
//!
//! Every [`Database::open_at`](crate::database::Database::open_at) runs any
//! outstanding migrations before handing out the connection.  The applied
//! schema version lives in SQLite's `user_version` pragma, so each step runs
//! exactly once per database file.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Version the schema is at after all known migrations have run.
const LATEST_VERSION: u32 = 1;

/// Bring the connected database up to [`LATEST_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let applied: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if applied >= LATEST_VERSION {
        return Ok(());
    }

    tracing::info!(applied, latest = LATEST_VERSION, "migrating database schema");

    if applied < 1 {
        v001_initial::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    Ok(())
}
