//! Media error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or decoding an audio origin
#[derive(Debug, Error)]
pub enum MediaError {
    /// Origin does not exist
    #[error("audio origin not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Origin exists but could not be read
    #[error("failed to read audio origin {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Origin is not a recognizable audio container
    #[error("malformed audio origin: {0}")]
    Malformed(String),

    /// Container or codec isn't supported
    #[error("unsupported audio encoding: {0}")]
    Unsupported(String),

    /// Decoded audio could not be converted to the relay format
    #[error("audio conversion failed: {0}")]
    Conversion(String),
}
