//! Storage backend trait definitions.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{Group, GroupId, UserRecord};

/// Group catalog and user/group membership relation.
///
/// Implementations must make `relate` and `unrelate` idempotent: relating an
/// already related pair, or unrelating a pair that is not related, succeeds.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// List every group in the catalog.
    async fn list_groups(&self) -> Result<Vec<Group>, StorageError>;

    /// Create a new group with the given display name.
    async fn create_group(&self, name: &str) -> Result<Group, StorageError>;

    /// Ids of the groups the user currently belongs to.
    async fn current_group_ids(&self, user_id: &str) -> Result<BTreeSet<GroupId>, StorageError>;

    /// Add the user to a group.
    async fn relate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError>;

    /// Remove the user from a group.
    async fn unrelate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError>;
}

/// Host user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the user, or refresh the display name and e-mail of an existing one.
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), StorageError>;

    /// Get a user by provider id.
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StorageError>;
}
