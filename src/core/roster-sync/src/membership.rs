//! Organization membership evaluation.

use serde::Serialize;
use tracing::info;

use crate::entitlement::AffiliationFacts;

/// Whether the character belongs to a configured corporation or alliance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Membership {
    /// Corporation id is in the configured list.
    pub is_corp_member: bool,
    /// Alliance id is in the configured list.
    pub is_alliance_member: bool,
}

impl Membership {
    /// Member of at least one configured organization.
    pub fn is_member(&self) -> bool {
        self.is_corp_member || self.is_alliance_member
    }
}

/// Matches the affiliation against the configured id lists.
///
/// Ids compare as trimmed strings. An empty list never matches.
pub fn evaluate(
    affiliation: &AffiliationFacts,
    corp_ids: &[String],
    alliance_ids: &[String],
) -> Membership {
    let membership = Membership {
        is_corp_member: matches_any(affiliation.corporation_id.as_deref(), corp_ids),
        is_alliance_member: matches_any(affiliation.alliance_id.as_deref(), alliance_ids),
    };

    let corporation_id = affiliation.corporation_id.as_deref().unwrap_or("none");
    let alliance_id = affiliation.alliance_id.as_deref().unwrap_or("none");

    if membership.is_member() {
        info!(
            corporation_id,
            alliance_id,
            corp_member = membership.is_corp_member,
            alliance_member = membership.is_alliance_member,
            "Is member"
        );
    } else {
        info!(corporation_id, alliance_id, "Is not member");
    }

    membership
}

fn matches_any(id: Option<&str>, configured: &[String]) -> bool {
    let Some(id) = id.map(str::trim) else {
        return false;
    };
    !id.is_empty() && configured.iter().any(|c| c.trim() == id)
}
