use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No platform data directory could be determined for the database file.
    #[error("No application data directory available")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A lookup expected exactly one row and found none.
    #[error("Record not found")]
    NotFound,

    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// A JSON column could not be encoded or decoded.
    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
