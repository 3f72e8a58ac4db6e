//! Applying a reconciliation plan.
//!
//! Every add and every permitted remove runs concurrently. One failing
//! mutation neither cancels nor blocks the others; failures are collected
//! into a [`MutationReport`].

use std::fmt;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use roster_storage::{GroupId, GroupStore, StorageError};

use crate::catalog::GroupCatalog;
use crate::reconcile::ReconciliationPlan;

/// Kind of membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOperation {
    /// Relate the user to a group.
    Add,
    /// Unrelate the user from a group.
    Remove,
}

impl fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// What happened to a single operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// The store was updated.
    Applied,
    /// The group is not in the catalog; nothing was done.
    Skipped,
}

/// A mutation the store rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationFailure {
    /// Target group.
    pub group_id: GroupId,
    /// Attempted operation.
    pub operation: MutationOperation,
    /// Store error message.
    pub error: String,
}

/// Aggregate outcome of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    /// Groups the user was added to.
    pub added: Vec<GroupId>,
    /// Groups the user was removed from.
    pub removed: Vec<GroupId>,
    /// Operations skipped because the group vanished from the catalog.
    pub skipped: Vec<GroupId>,
    /// Operations the store rejected.
    pub failures: Vec<MutationFailure>,
}

impl MutationReport {
    /// True when at least one operation failed.
    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Applies membership changes for one user against the store.
pub struct GroupMutator<'a> {
    store: &'a dyn GroupStore,
    catalog: &'a GroupCatalog,
    user_id: &'a str,
}

impl<'a> GroupMutator<'a> {
    /// Creates a mutator for `user_id`.
    pub fn new(store: &'a dyn GroupStore, catalog: &'a GroupCatalog, user_id: &'a str) -> Self {
        Self {
            store,
            catalog,
            user_id,
        }
    }

    /// Adds the user to the group. Unknown groups are a logged no-op.
    pub async fn add_group(&self, group_id: GroupId) -> Result<MutationStatus, StorageError> {
        let Some(group) = self.catalog.get(group_id) else {
            warn!(group_id = %group_id, "Could not find group to add");
            return Ok(MutationStatus::Skipped);
        };

        self.store.relate(self.user_id, group_id).await?;

        info!(user_id = %self.user_id, group = %group.name, group_id = %group_id, "Added group");
        Ok(MutationStatus::Applied)
    }

    /// Removes the user from the group. Unknown groups are a logged no-op.
    pub async fn remove_group(&self, group_id: GroupId) -> Result<MutationStatus, StorageError> {
        let Some(group) = self.catalog.get(group_id) else {
            warn!(group_id = %group_id, "Could not find group to remove");
            return Ok(MutationStatus::Skipped);
        };

        self.store.unrelate(self.user_id, group_id).await?;

        info!(user_id = %self.user_id, group = %group.name, group_id = %group_id, "Removed group");
        Ok(MutationStatus::Applied)
    }

    async fn run(
        &self,
        operation: MutationOperation,
        group_id: GroupId,
    ) -> (MutationOperation, GroupId, Result<MutationStatus, StorageError>) {
        let result = match operation {
            MutationOperation::Add => self.add_group(group_id).await,
            MutationOperation::Remove => self.remove_group(group_id).await,
        };
        (operation, group_id, result)
    }

    /// Applies every add and remove of the plan concurrently and waits for
    /// all of them.
    pub async fn apply(&self, plan: &ReconciliationPlan) -> MutationReport {
        let operations = plan
            .to_add
            .iter()
            .map(|&id| (MutationOperation::Add, id))
            .chain(plan.to_remove.iter().map(|&id| (MutationOperation::Remove, id)));

        let results = join_all(operations.map(|(op, id)| self.run(op, id))).await;

        let mut report = MutationReport::default();
        for (operation, group_id, result) in results {
            match (operation, result) {
                (_, Ok(MutationStatus::Skipped)) => report.skipped.push(group_id),
                (MutationOperation::Add, Ok(MutationStatus::Applied)) => report.added.push(group_id),
                (MutationOperation::Remove, Ok(MutationStatus::Applied)) => {
                    report.removed.push(group_id)
                },
                (_, Err(e)) => {
                    warn!(
                        user_id = %self.user_id,
                        group_id = %group_id,
                        operation = %operation,
                        error = %e,
                        "Group mutation failed"
                    );
                    report.failures.push(MutationFailure {
                        group_id,
                        operation,
                        error: e.to_string(),
                    });
                },
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeSet, HashSet};

    use std::time::Duration;

    use async_trait::async_trait;
    use roster_storage::{Group, MemoryBackend};
    use tokio::sync::Barrier;

    use super::*;

    /// Store that rejects any mutation touching the configured groups.
    pub(crate) struct FlakyStore {
        pub inner: MemoryBackend,
        pub failing: HashSet<GroupId>,
    }

    #[async_trait]
    impl GroupStore for FlakyStore {
        async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
            self.inner.list_groups().await
        }

        async fn create_group(&self, name: &str) -> Result<Group, StorageError> {
            self.inner.create_group(name).await
        }

        async fn current_group_ids(
            &self,
            user_id: &str,
        ) -> Result<BTreeSet<GroupId>, StorageError> {
            self.inner.current_group_ids(user_id).await
        }

        async fn relate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
            if self.failing.contains(&group_id) {
                return Err(StorageError::QueryFailed("database is locked".into()));
            }
            self.inner.relate(user_id, group_id).await
        }

        async fn unrelate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
            if self.failing.contains(&group_id) {
                return Err(StorageError::QueryFailed("database is locked".into()));
            }
            self.inner.unrelate(user_id, group_id).await
        }
    }

    /// Store whose mutations only complete once `barrier` is reached by
    /// every expected operation.
    struct BarrierStore {
        inner: MemoryBackend,
        barrier: Barrier,
    }

    #[async_trait]
    impl GroupStore for BarrierStore {
        async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
            self.inner.list_groups().await
        }

        async fn create_group(&self, name: &str) -> Result<Group, StorageError> {
            self.inner.create_group(name).await
        }

        async fn current_group_ids(
            &self,
            user_id: &str,
        ) -> Result<BTreeSet<GroupId>, StorageError> {
            self.inner.current_group_ids(user_id).await
        }

        async fn relate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
            self.barrier.wait().await;
            self.inner.relate(user_id, group_id).await
        }

        async fn unrelate(&self, user_id: &str, group_id: GroupId) -> Result<(), StorageError> {
            self.barrier.wait().await;
            self.inner.unrelate(user_id, group_id).await
        }
    }

    fn groups() -> Vec<Group> {
        vec![
            Group::new(1, "director"),
            Group::new(2, "fleet commander"),
            Group::new(3, "member"),
            Group::new(4, "logistics"),
        ]
    }

    fn plan(add: &[i64], remove: &[i64]) -> ReconciliationPlan {
        ReconciliationPlan {
            to_add: add.iter().map(|&id| GroupId(id)).collect(),
            to_remove: remove.iter().map(|&id| GroupId(id)).collect(),
            ..ReconciliationPlan::default()
        }
    }

    #[tokio::test]
    async fn test_apply_adds_and_removes() {
        let store = MemoryBackend::with_groups(groups());
        store.set_memberships("42", [GroupId(3), GroupId(4)]).await;
        let catalog = GroupCatalog::new(groups());

        let mutator = GroupMutator::new(&store, &catalog, "42");
        let report = mutator.apply(&plan(&[1, 2], &[4])).await;

        assert_eq!(report.added, vec![GroupId(1), GroupId(2)]);
        assert_eq!(report.removed, vec![GroupId(4)]);
        assert!(!report.is_partial_failure());

        let current = store.current_group_ids("42").await.unwrap();
        assert_eq!(current, BTreeSet::from([GroupId(1), GroupId(2), GroupId(3)]));
    }

    #[tokio::test]
    async fn test_unknown_group_is_skipped() {
        let store = MemoryBackend::with_groups(groups());
        let catalog = GroupCatalog::new(groups());
        let mutator = GroupMutator::new(&store, &catalog, "42");

        assert_eq!(
            mutator.add_group(GroupId(99)).await.unwrap(),
            MutationStatus::Skipped
        );
        assert_eq!(
            mutator.remove_group(GroupId(99)).await.unwrap(),
            MutationStatus::Skipped
        );

        let report = mutator.apply(&plan(&[99], &[])).await;
        assert_eq!(report.skipped, vec![GroupId(99)]);
        assert!(store.current_group_ids("42").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let store = FlakyStore {
            inner: MemoryBackend::with_groups(groups()),
            failing: HashSet::from([GroupId(2), GroupId(4)]),
        };
        store.inner.set_memberships("42", [GroupId(3), GroupId(4)]).await;
        let catalog = GroupCatalog::new(groups());

        let mutator = GroupMutator::new(&store, &catalog, "42");
        let report = mutator.apply(&plan(&[1, 2], &[3, 4])).await;

        assert_eq!(report.added, vec![GroupId(1)]);
        assert_eq!(report.removed, vec![GroupId(3)]);
        assert_eq!(
            report.failures,
            vec![
                MutationFailure {
                    group_id: GroupId(2),
                    operation: MutationOperation::Add,
                    error: "query failed: database is locked".into(),
                },
                MutationFailure {
                    group_id: GroupId(4),
                    operation: MutationOperation::Remove,
                    error: "query failed: database is locked".into(),
                },
            ]
        );

        let current = store.inner.current_group_ids("42").await.unwrap();
        assert_eq!(current, BTreeSet::from([GroupId(1), GroupId(4)]));
    }

    #[tokio::test]
    async fn test_mutations_run_concurrently() {
        // Two adds and one remove must all be in flight at once to pass the barrier
        let store = BarrierStore {
            inner: MemoryBackend::with_groups(groups()),
            barrier: Barrier::new(3),
        };
        store.inner.set_memberships("42", [GroupId(4)]).await;
        let catalog = GroupCatalog::new(groups());

        let mutator = GroupMutator::new(&store, &catalog, "42");
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            mutator.apply(&plan(&[1, 2], &[4])),
        )
        .await
        .expect("mutations were applied one after another");

        assert_eq!(report.added, vec![GroupId(1), GroupId(2)]);
        assert_eq!(report.removed, vec![GroupId(4)]);
    }

    #[tokio::test]
    async fn test_empty_plan_is_noop() {
        let store = MemoryBackend::with_groups(groups());
        let catalog = GroupCatalog::new(groups());

        let report = GroupMutator::new(&store, &catalog, "42")
            .apply(&ReconciliationPlan::default())
            .await;

        assert_eq!(report, MutationReport::default());
    }
}
