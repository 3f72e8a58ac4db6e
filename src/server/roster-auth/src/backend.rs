//! Authentication backend trait.

use async_trait::async_trait;

use crate::{AuthError, Identity};

/// Trait for authentication backends.
///
/// Implementations read a token and return the [`Identity`] it belongs to.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Extracts the identity from the given token.
    ///
    /// # Arguments
    ///
    /// * `token` - The bearer access token
    ///
    /// # Returns
    ///
    /// * `Ok(Identity)` - If the token carries a usable subject
    /// * `Err(AuthError)` - Otherwise
    async fn identify(&self, token: &str) -> Result<Identity, AuthError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}
