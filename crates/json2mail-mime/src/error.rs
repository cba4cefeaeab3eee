//! Error types for MIME operations.

use std::io;
use std::path::PathBuf;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header value would break the header block (bare CR or LF).
    #[error("Invalid MIME header {0}: value contains a line break")]
    InvalidHeader(String),

    /// Missing required header.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Attachment could not be read.
    #[error("cannot read attachment {path}: {source}")]
    Attachment {
        /// Path of the attachment.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
