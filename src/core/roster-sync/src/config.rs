//! Synchronization settings.

use serde::{Deserialize, Serialize};

use crate::normalize::fold_name;

/// Parsed synchronization settings.
///
/// Built from the comma-separated values operators configure. Every list is
/// trimmed and empty items are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Corporation ids whose characters count as members.
    pub corp_ids: Vec<String>,
    /// Alliance ids whose characters count as members.
    pub alliance_ids: Vec<String>,
    /// Case-folded names of the groups every member receives.
    pub member_group_names: Vec<String>,
    /// Case-folded keywords protecting groups from automatic removal.
    pub keyword_blacklist: Vec<String>,
    /// Whether roles and titles drive group assignment.
    pub use_auto_roles: bool,
}

impl SyncConfig {
    /// Creates an empty configuration (synchronization disabled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the corporation ids from a comma-separated list.
    pub fn with_corp_ids(mut self, csv: &str) -> Self {
        self.corp_ids = parse_csv(csv);
        self
    }

    /// Sets the alliance ids from a comma-separated list.
    pub fn with_alliance_ids(mut self, csv: &str) -> Self {
        self.alliance_ids = parse_csv(csv);
        self
    }

    /// Sets the member group names from a comma-separated list.
    pub fn with_member_group_names(mut self, csv: &str) -> Self {
        self.member_group_names = parse_csv(csv).iter().map(|n| fold_name(n)).collect();
        self
    }

    /// Sets the blacklist keywords from a comma-separated list.
    pub fn with_keyword_blacklist(mut self, csv: &str) -> Self {
        self.keyword_blacklist = parse_csv(csv).iter().map(|k| fold_name(k)).collect();
        self
    }

    /// Enables or disables role/title driven groups.
    pub fn with_auto_roles(mut self, enabled: bool) -> Self {
        self.use_auto_roles = enabled;
        self
    }

    /// False when neither corporation nor alliance ids are configured.
    ///
    /// An unconfigured synchronizer never fetches and never mutates.
    pub fn is_configured(&self) -> bool {
        !self.corp_ids.is_empty() || !self.alliance_ids.is_empty()
    }

    /// Whether the group name is one of the configured member groups.
    pub fn is_member_group(&self, group_name: &str) -> bool {
        let name = fold_name(group_name);
        self.member_group_names.iter().any(|n| *n == name)
    }

    /// Returns the first blacklist keyword contained in the group name.
    ///
    /// Matching is by substring: blacklisting `director` also protects
    /// `Director Corp`.
    pub fn protecting_keyword(&self, group_name: &str) -> Option<&str> {
        let name = fold_name(group_name);
        self.keyword_blacklist
            .iter()
            .find(|keyword| name.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

/// Splits a comma-separated list into trimmed, non-empty items.
pub fn parse_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
