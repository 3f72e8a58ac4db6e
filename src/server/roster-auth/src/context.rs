//! Authenticated identity.

use serde::{Deserialize, Serialize};

/// Domain used to build synthetic e-mail addresses for host user records.
const EMAIL_DOMAIN: &str = "auth.eveonline.com";

/// The character an access token was issued for.
///
/// Immutable for the duration of one authentication event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Character id (the third segment of the token subject).
    pub id: String,

    /// Character name.
    pub display_name: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Synthetic e-mail address used by hosts that require one.
    pub fn email(&self) -> String {
        format!("{}@{}", self.id, EMAIL_DOMAIN)
    }
}
