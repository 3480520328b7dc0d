use thiserror::Error;

use alexandria_net::NetError;
use alexandria_store::StoreError;

/// Errors surfaced by the session layer.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("State lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
