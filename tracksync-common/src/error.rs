//! Error types for tracksync
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. All scheduler errors are contained internally; none of them
//! reach consumers as panics.

use thiserror::Error;

/// Common result type for tracksync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared across the tracksync workspace
#[derive(Error, Debug)]
pub enum Error {
    /// Track resolution failed (per-entry, may be retryable)
    #[error("Resolution error for track {track_id}: {message}")]
    Resolution {
        track_id: String,
        message: String,
        /// Whether a retry with cache bypass may succeed
        retryable: bool,
    },

    /// Engine queue mutation failed (add/remove/reset/load)
    #[error("Engine mutation error: {0}")]
    EngineMutation(String),

    /// Internal signal: this job belongs to a superseded generation.
    /// Never surfaced to callers; used to short-circuit cooperative loops.
    #[error("Stale generation: {0}")]
    StaleGeneration(u64),

    /// Invalid state for operation (e.g. seek with no active track)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when a retry with cache bypass is worth attempting
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Resolution { retryable: true, .. } | Error::EngineMutation(_)
        )
    }
}
