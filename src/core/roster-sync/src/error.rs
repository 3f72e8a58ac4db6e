//! Synchronization error types.

use thiserror::Error;

/// Run-level failures. Individual mutation failures never surface here;
/// they are collected in [`crate::MutationReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport or HTTP failure while fetching entitlements.
    #[error("entitlement fetch failed: {0}")]
    Fetch(String),

    /// Failure reading the catalog or current memberships.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<roster_storage::StorageError> for SyncError {
    fn from(e: roster_storage::StorageError) -> Self {
        SyncError::Storage(e.to_string())
    }
}
