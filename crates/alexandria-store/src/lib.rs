//! # alexandria-store
//!
//! Local persistence for the Alexandria client, backed by SQLite.
//!
//! Chat transcripts are stored per organization so switching organizations
//! switches histories.  Only finalized messages are written; in-flight
//! streaming state never touches disk.  The crate exposes a synchronous
//! `Database` handle that wraps a `rusqlite::Connection` and provides typed
//! CRUD helpers.

pub mod database;
pub mod history;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
