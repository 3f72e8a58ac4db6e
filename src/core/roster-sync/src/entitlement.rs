//! Entitlement fetching.
//!
//! The [`EntitlementSource`] trait is the seam to the character-data API;
//! [`fetch_snapshot`] runs the three lookups concurrently and normalizes
//! the labels they return.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use roster_auth::Identity;

use crate::error::SyncError;
use crate::normalize::normalize_label;

/// Corporation and alliance the character currently belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationFacts {
    /// Corporation id, if known.
    pub corporation_id: Option<String>,
    /// Alliance id, if the corporation is in one.
    pub alliance_id: Option<String>,
}

/// Source of the raw facts about a character.
///
/// Implementations degrade malformed or missing response bodies to empty
/// results and return an error only for transport failures.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    /// Corporation and alliance of the character.
    async fn affiliation(&self, character_id: &str) -> Result<AffiliationFacts, SyncError>;

    /// Raw corporation role labels.
    async fn roles(&self, character_id: &str, access_token: &str)
        -> Result<Vec<String>, SyncError>;

    /// Raw corporation title labels.
    async fn titles(&self, character_id: &str, access_token: &str)
        -> Result<Vec<String>, SyncError>;
}

/// Everything fetched about a character for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitlementSnapshot {
    /// Affiliation facts.
    pub affiliation: AffiliationFacts,
    /// Normalized role and title tokens.
    pub tokens: BTreeSet<String>,
}

/// Fetches affiliation, roles and titles concurrently.
///
/// Roles and titles are not requested at all when `use_auto_roles` is off.
/// All three requests run to completion before any error is reported.
pub async fn fetch_snapshot(
    source: &dyn EntitlementSource,
    identity: &Identity,
    access_token: &str,
    use_auto_roles: bool,
) -> Result<EntitlementSnapshot, SyncError> {
    let roles = async {
        if use_auto_roles {
            source.roles(&identity.id, access_token).await
        } else {
            Ok(Vec::new())
        }
    };
    let titles = async {
        if use_auto_roles {
            source.titles(&identity.id, access_token).await
        } else {
            Ok(Vec::new())
        }
    };

    let (affiliation, roles, titles) =
        tokio::join!(source.affiliation(&identity.id), roles, titles);

    let affiliation = affiliation?;
    let tokens: BTreeSet<String> = roles?
        .iter()
        .chain(titles?.iter())
        .filter_map(|label| normalize_label(label))
        .collect();

    debug!(character_id = %identity.id, tokens = ?tokens, "Roles and titles");

    Ok(EntitlementSnapshot {
        affiliation,
        tokens,
    })
}
