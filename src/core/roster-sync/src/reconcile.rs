//! Group reconciliation.
//!
//! Computes which groups a user gains and loses for one authentication
//! event. Pure: no I/O, only logging.
//!
//! ## Rules
//!
//! - Member groups are the catalog entries named in the configured member
//!   group list.
//! - A non-member loses their member groups and nothing else. Role and title
//!   matching is not attempted.
//! - A member's target is every group whose name equals an entitlement token
//!   plus every member group. Groups outside the target are removed only
//!   while auto roles are enabled.
//! - A removal is vetoed when the group name contains a blacklist keyword.
//! - Current memberships pointing at groups missing from the catalog are
//!   ignored.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use roster_storage::GroupId;

use crate::catalog::GroupCatalog;
use crate::config::SyncConfig;
use crate::membership::Membership;

/// Inputs of one reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    /// Normalized role and title tokens.
    pub tokens: &'a BTreeSet<String>,
    /// Membership decision.
    pub membership: Membership,
    /// Group catalog snapshot.
    pub catalog: &'a GroupCatalog,
    /// Group ids the user holds right now.
    pub current: &'a BTreeSet<GroupId>,
    /// Member group names, blacklist and the auto roles switch.
    pub config: &'a SyncConfig,
}

/// Result of one reconciliation.
///
/// `to_add` and `to_remove` are disjoint: the first only holds ids outside
/// the current membership, the second only ids inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    /// Groups the user should hold.
    pub target: BTreeSet<GroupId>,
    /// Groups to add.
    pub to_add: BTreeSet<GroupId>,
    /// Groups to remove, after blacklist protection.
    pub to_remove: BTreeSet<GroupId>,
    /// Removals vetoed by the blacklist.
    pub protected: BTreeSet<GroupId>,
    /// Current memberships referencing groups missing from the catalog.
    pub unknown: BTreeSet<GroupId>,
}

impl ReconciliationPlan {
    /// True when nothing needs to change.
    pub fn is_converged(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the reconciliation plan.
pub fn reconcile(input: ReconcileInput<'_>) -> ReconciliationPlan {
    let ReconcileInput {
        tokens,
        membership,
        catalog,
        current,
        config,
    } = input;

    let mut unknown = BTreeSet::new();
    let mut known = BTreeSet::new();
    for &id in current {
        if catalog.contains(id) {
            known.insert(id);
        } else {
            warn!(group_id = %id, "Current membership references unknown group, skipping");
            unknown.insert(id);
        }
    }

    let member_groups: BTreeSet<GroupId> = catalog
        .ids_where(|name| config.member_group_names.iter().any(|n| n == name))
        .collect();

    let (target, to_add, candidates) = if membership.is_member() {
        let matched: BTreeSet<GroupId> = if config.use_auto_roles {
            catalog.ids_where(|name| tokens.contains(name)).collect()
        } else {
            BTreeSet::new()
        };

        let target: BTreeSet<GroupId> = matched.union(&member_groups).copied().collect();
        let to_add: BTreeSet<GroupId> = target.difference(&known).copied().collect();
        let candidates: BTreeSet<GroupId> = if config.use_auto_roles {
            known.difference(&target).copied().collect()
        } else {
            BTreeSet::new()
        };

        (target, to_add, candidates)
    } else {
        let candidates: BTreeSet<GroupId> = known.intersection(&member_groups).copied().collect();
        (BTreeSet::new(), BTreeSet::new(), candidates)
    };

    let mut to_remove = BTreeSet::new();
    let mut protected = BTreeSet::new();
    for id in candidates {
        let Some(group) = catalog.get(id) else {
            continue;
        };
        match config.protecting_keyword(&group.name) {
            Some(keyword) => {
                info!(group = %group.name, group_id = %id, keyword, "Ignored group");
                protected.insert(id);
            },
            None => {
                to_remove.insert(id);
            },
        }
    }

    let target = if membership.is_member() {
        target
    } else {
        known.difference(&to_remove).copied().collect()
    };

    ReconciliationPlan {
        target,
        to_add,
        to_remove,
        protected,
        unknown,
    }
}
