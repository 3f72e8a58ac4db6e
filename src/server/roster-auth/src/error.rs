//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be decoded or lacks the expected claims.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing authentication token.
    #[error("missing authentication token")]
    MissingToken,

    /// Token subject does not have the `CHARACTER:EVE:<id>` shape.
    #[error("malformed subject: {0}")]
    MalformedSubject(String),
}
