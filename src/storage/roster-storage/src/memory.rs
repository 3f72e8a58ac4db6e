//! In-memory storage backend.
//!
//! Used by the server in development mode and by tests across the
//! workspace. Nothing survives a restart.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{GroupStore, UserStore};
use crate::error::StorageError;
use crate::model::{Group, GroupId, UserRecord};

#[derive(Default)]
struct State {
    groups: BTreeMap<GroupId, Group>,
    next_group_id: i64,
    memberships: HashMap<String, BTreeSet<GroupId>>,
    users: HashMap<String, UserRecord>,
}

/// Volatile storage backend guarded by a single `RwLock`.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with the given catalog.
    ///
    /// Ids are taken as-is; new groups are numbered after the highest one.
    pub fn with_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        let mut state = State::default();
        for group in groups {
            state.next_group_id = state.next_group_id.max(group.id.0);
            state.groups.insert(group.id, group);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Replaces a user's memberships wholesale. Intended for seeding fixtures.
    pub async fn set_memberships(&self, user_id: &str, ids: impl IntoIterator<Item = GroupId>) {
        let mut state = self.state.write().await;
        state
            .memberships
            .insert(user_id.to_string(), ids.into_iter().collect());
    }
}

#[async_trait]
impl GroupStore for MemoryBackend {
    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        Ok(self.state.read().await.groups.values().cloned().collect())
    }

    async fn create_group(&self, name: &str) -> Result<Group, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("group name cannot be empty".into()));
        }

        let mut state = self.state.write().await;
        if state.groups.values().any(|g| g.name == name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        state.next_group_id += 1;
        let group = Group::new(state.next_group_id, name);
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn current_group_ids(&self, user_id: &str) -> Result<BTreeSet<GroupId>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn relate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&group_id) {
            return Err(StorageError::NotFound(format!("group {group_id}")));
        }
        state
            .memberships
            .entry(user_id.to_string())
            .or_default()
            .insert(group_id);
        Ok(())
    }

    async fn unrelate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if let Some(ids) = state.memberships.get_mut(user_id) {
            ids.remove(&group_id);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryBackend {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }
}
