use thiserror::Error;

/// Errors produced by the transport layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// The HTTP request could not be performed at all.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request reached the server but came back non-success.
    #[error("Request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },

    /// An event payload explicitly carried an error field.
    #[error("Stream error: {0}")]
    Stream(String),

    /// An event line failed to decode for a reason other than truncation.
    #[error("Malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A document fetch returned a zero-length body.
    #[error("Document payload was empty")]
    EmptyDocument,

    /// Filesystem error while writing a downloaded document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
