//! ESI client error types.

use thiserror::Error;

/// Errors that can occur talking to ESI.
#[derive(Debug, Error)]
pub enum EsiError {
    /// Request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// ESI answered with a non-success status.
    #[error("unexpected status {status} for {path}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for EsiError {
    fn from(e: reqwest::Error) -> Self {
        EsiError::Transport(e.to_string())
    }
}

impl From<EsiError> for roster_sync::SyncError {
    fn from(e: EsiError) -> Self {
        roster_sync::SyncError::Fetch(e.to_string())
    }
}
