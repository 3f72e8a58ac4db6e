//! HTTP client for ESI.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use roster_sync::{AffiliationFacts, EntitlementSource, SyncError};

use crate::{parse, EsiError};

/// Public ESI base URL.
pub const DEFAULT_BASE_URL: &str = "https://esi.evetech.net/latest";

/// ESI client settings.
#[derive(Debug, Clone)]
pub struct EsiConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for EsiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("roster/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// ESI client implementing [`EntitlementSource`].
#[derive(Clone)]
pub struct EsiClient {
    client: Client,
    base_url: String,
}

impl EsiClient {
    /// Creates a client.
    pub fn new(config: EsiConfig) -> Result<Self, EsiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| EsiError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetches the public character document.
    ///
    /// A non-success status is an error. An unreadable body yields empty
    /// facts.
    pub async fn character_affiliation(
        &self,
        character_id: &str,
    ) -> Result<AffiliationFacts, EsiError> {
        let path = format!("/characters/{character_id}/");

        let resp = self.client.get(self.url(&path)).send().await?;

        if !resp.status().is_success() {
            return Err(EsiError::Status {
                status: resp.status().as_u16(),
                path,
            });
        }

        let bytes = resp.bytes().await?;
        let facts = match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => parse::affiliation(&body),
            Err(e) => {
                warn!(path = %path, error = %e, "Malformed character document");
                AffiliationFacts::default()
            },
        };

        debug!(
            character_id,
            corporation_id = ?facts.corporation_id,
            alliance_id = ?facts.alliance_id,
            "Fetched affiliation"
        );
        Ok(facts)
    }

    /// Fetches the raw corporation role labels.
    pub async fn character_roles(
        &self,
        character_id: &str,
        access_token: &str,
    ) -> Result<Vec<String>, EsiError> {
        let path = format!("/characters/{character_id}/roles/");
        let body = self.get_authenticated(&path, access_token).await?;
        Ok(body.as_ref().map(parse::roles).unwrap_or_default())
    }

    /// Fetches the raw corporation title labels.
    pub async fn character_titles(
        &self,
        character_id: &str,
        access_token: &str,
    ) -> Result<Vec<String>, EsiError> {
        let path = format!("/characters/{character_id}/titles/");
        let body = self.get_authenticated(&path, access_token).await?;
        Ok(body.as_ref().map(parse::titles).unwrap_or_default())
    }

    /// GET with a bearer token. Returns `None` for error statuses and
    /// unparseable bodies; only transport failures are errors.
    async fn get_authenticated(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<Option<Value>, EsiError> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            warn!(path = %path, status = status.as_u16(), "ESI request rejected, treating as empty");
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => Ok(Some(body)),
            Err(e) => {
                warn!(path = %path, error = %e, "Malformed ESI response, treating as empty");
                Ok(None)
            },
        }
    }
}

#[async_trait]
impl EntitlementSource for EsiClient {
    async fn affiliation(&self, character_id: &str) -> Result<AffiliationFacts, SyncError> {
        Ok(self.character_affiliation(character_id).await?)
    }

    async fn roles(
        &self,
        character_id: &str,
        access_token: &str,
    ) -> Result<Vec<String>, SyncError> {
        Ok(self.character_roles(character_id, access_token).await?)
    }

    async fn titles(
        &self,
        character_id: &str,
        access_token: &str,
    ) -> Result<Vec<String>, SyncError> {
        Ok(self.character_titles(character_id, access_token).await?)
    }
}
