//! Per-run snapshot of the host group catalog.

use std::collections::HashMap;

use roster_storage::{Group, GroupId};

use crate::normalize::fold_name;

/// Groups indexed by id. Built once per run and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct GroupCatalog {
    groups: HashMap<GroupId, Group>,
}

impl GroupCatalog {
    /// Indexes the given groups. A later duplicate id replaces an earlier one.
    pub fn new(groups: impl IntoIterator<Item = Group>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.id, g)).collect(),
        }
    }

    /// Looks up a group by id.
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Whether the catalog knows the id.
    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Ids of the groups whose folded name satisfies the predicate.
    pub(crate) fn ids_where<'a>(
        &'a self,
        mut predicate: impl FnMut(&str) -> bool + 'a,
    ) -> impl Iterator<Item = GroupId> + 'a {
        self.groups
            .values()
            .filter(move |g| predicate(&fold_name(&g.name)))
            .map(|g| g.id)
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
