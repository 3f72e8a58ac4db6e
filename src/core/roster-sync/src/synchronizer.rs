//! One synchronization run per authentication event.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use roster_auth::Identity;
use roster_storage::GroupStore;

use crate::catalog::GroupCatalog;
use crate::config::SyncConfig;
use crate::entitlement::{fetch_snapshot, AffiliationFacts, EntitlementSource};
use crate::error::SyncError;
use crate::membership::{evaluate, Membership};
use crate::mutate::{GroupMutator, MutationReport};
use crate::reconcile::{reconcile, ReconcileInput, ReconciliationPlan};

/// Everything decided and done during a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Fetched affiliation.
    pub affiliation: AffiliationFacts,
    /// Membership decision.
    pub membership: Membership,
    /// Normalized role and title tokens.
    pub tokens: BTreeSet<String>,
    /// Computed plan.
    pub plan: ReconciliationPlan,
    /// Outcome of applying the plan.
    pub mutations: MutationReport,
}

/// Result of a run that did not fail outright.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Neither corporation nor alliance ids are configured; nothing was
    /// fetched or changed.
    NotConfigured,
    /// The run completed. Individual mutations may still have failed.
    Synced(SyncReport),
}

/// Synchronizes a user's groups with their EVE roles, titles and affiliation.
///
/// Collaborators are injected; the synchronizer holds no per-user state and
/// may be shared across concurrent authentications.
#[derive(Clone)]
pub struct GroupSynchronizer {
    source: Arc<dyn EntitlementSource>,
    store: Arc<dyn GroupStore>,
    config: SyncConfig,
}

impl GroupSynchronizer {
    /// Creates a synchronizer.
    pub fn new(
        source: Arc<dyn EntitlementSource>,
        store: Arc<dyn GroupStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one synchronization for the identity.
    ///
    /// # Errors
    ///
    /// Returns an error when a fetch fails at the transport level or the
    /// catalog/current memberships cannot be read. Mutation failures are
    /// reported in [`SyncReport::mutations`] instead.
    pub async fn synchronize(
        &self,
        identity: &Identity,
        access_token: &str,
    ) -> Result<SyncOutcome, SyncError> {
        if !self.config.is_configured() {
            info!(character_id = %identity.id, "Organization sync not configured");
            return Ok(SyncOutcome::NotConfigured);
        }

        let (snapshot, groups, current) = tokio::join!(
            fetch_snapshot(
                self.source.as_ref(),
                identity,
                access_token,
                self.config.use_auto_roles,
            ),
            self.store.list_groups(),
            self.store.current_group_ids(&identity.id),
        );
        let snapshot = snapshot?;
        let catalog = GroupCatalog::new(groups?);
        let current = current?;
        debug!(
            character_id = %identity.id,
            catalog = catalog.len(),
            current = current.len(),
            "Loaded groups"
        );

        let membership = evaluate(
            &snapshot.affiliation,
            &self.config.corp_ids,
            &self.config.alliance_ids,
        );

        let plan = reconcile(ReconcileInput {
            tokens: &snapshot.tokens,
            membership,
            catalog: &catalog,
            current: &current,
            config: &self.config,
        });

        let mutations = GroupMutator::new(self.store.as_ref(), &catalog, &identity.id)
            .apply(&plan)
            .await;

        if mutations.is_partial_failure() {
            warn!(
                character_id = %identity.id,
                failed = mutations.failures.len(),
                "Group sync finished with failures"
            );
        } else {
            info!(
                character_id = %identity.id,
                added = mutations.added.len(),
                removed = mutations.removed.len(),
                protected = plan.protected.len(),
                "Group sync finished"
            );
        }

        Ok(SyncOutcome::Synced(SyncReport {
            affiliation: snapshot.affiliation,
            membership,
            tokens: snapshot.tokens,
            plan,
            mutations,
        }))
    }
}
