//! Session layer of the Alexandria client.
//!
//! Ties the transport, the message reducer, and local persistence together:
//! a [`session::spawn_session`] task owns one organization's chat timeline,
//! [`preview::PreviewStore`] tracks per-document viewer state, and
//! [`state::AppState`] carries the cross-cutting context (organization,
//! database handle, source metadata cache).

pub mod config;
pub mod preview;
pub mod session;
pub mod state;

mod error;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use preview::{toggle_preview, DocumentKey, PreviewOutcome, PreviewState, PreviewStore};
pub use session::{spawn_session, SessionCommand, SessionNotification};
pub use state::AppState;
