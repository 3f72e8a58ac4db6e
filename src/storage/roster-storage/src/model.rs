//! Shared persistence model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a group in the host catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for GroupId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A catalog entry. The synchronizer only ever reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier.
    pub id: GroupId,
    /// Display name, matched against entitlement tokens.
    pub name: String,
}

impl Group {
    /// Creates a group record.
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A host user, keyed by the identity provider's subject id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Provider id (character id).
    pub id: String,
    /// Display name from the provider.
    pub display_name: String,
    /// Synthetic or real e-mail address.
    pub email: Option<String>,
}
