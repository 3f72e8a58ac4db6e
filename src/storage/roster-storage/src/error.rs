//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry already exists.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Input rejected before reaching the database.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Connection or migration error.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution error.
    #[error("query failed: {0}")]
    QueryFailed(String),
}
