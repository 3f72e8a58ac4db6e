//! Integration tests for the Roster server.
//!
//! These tests start the server binary against a fake ESI and verify the
//! login-time group sync end to end.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserGroupsResponse {
    pub user_id: String,
    pub groups: Vec<Group>,
    pub unknown: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SyncResponse {
    pub identity: Value,
    pub outcome: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Fake ESI
// ============================================================================

/// Character in the configured corporation.
pub const MEMBER_CHARACTER: &str = "90000001";
/// Character in an unrelated corporation.
pub const OUTSIDER_CHARACTER: &str = "90000002";
/// Configured corporation id.
pub const CORP_ID: &str = "98000001";

async fn esi_character(Path(id): Path<String>) -> impl IntoResponse {
    let corporation_id = if id == MEMBER_CHARACTER { 98000001 } else { 98000666 };
    Json(json!({ "name": "Test Pilot", "corporation_id": corporation_id }))
}

async fn esi_roles() -> impl IntoResponse {
    Json(json!({ "roles": ["Director"] }))
}

async fn esi_titles() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!([{ "title_id": 1, "name": "<b>Fleet_Commander</b>" }])),
    )
}

/// Serves a minimal ESI on an ephemeral port and returns its base URL.
pub async fn start_fake_esi() -> Result<String> {
    let router = Router::new()
        .route("/characters/{id}/", get(esi_character))
        .route("/characters/{id}/roles/", get(esi_roles))
        .route("/characters/{id}/titles/", get(esi_titles));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(format!("http://{}", addr))
}

/// Builds an SSO-shaped access token for a character.
pub fn sso_token(character_id: &str, name: &str) -> String {
    let claims = json!({
        "sub": format!("CHARACTER:EVE:{}", character_id),
        "name": name,
        "iss": "https://login.eveonline.com",
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"not-checked"),
    )
    .expect("Failed to encode token")
}

// ============================================================================
// Test Server
// ============================================================================

/// A test server instance that manages its own data directory and process.
pub struct TestServer {
    process: Child,
    pub base_url: String,
    pub port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Start a dev-mode server on the given port with extra arguments.
    pub async fn start(port: u16, args: &[&str]) -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;

        let server_binary = find_server_binary()?;

        let process = Command::new(&server_binary)
            .arg("--dev")
            .arg("--data-dir")
            .arg(data_dir.path())
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start server: {:?}", server_binary))?;

        let server = Self {
            process,
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            _data_dir: data_dir,
        };

        server.wait_for_ready().await?;

        Ok(server)
    }

    /// Wait for the server to be ready to accept connections.
    async fn wait_for_ready(&self) -> Result<()> {
        let client = Client::new();
        let url = format!("{}/v1/sys/health", self.base_url);

        for _ in 0..50 {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }

        bail!("Server failed to start within 5 seconds")
    }

    /// Get a configured HTTP client for this server.
    pub fn client(&self) -> RosterClient {
        RosterClient::new(&self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Find the server binary in the target directory.
fn find_server_binary() -> Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    // Try debug build first, then release
    let candidates = [
        std::path::Path::new(&manifest_dir).join("../../target/debug/roster-server"),
        std::path::Path::new(&manifest_dir).join("../../target/debug/roster-server.exe"),
        std::path::Path::new(&manifest_dir).join("../../target/release/roster-server"),
        std::path::Path::new(&manifest_dir).join("../../target/release/roster-server.exe"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.canonicalize()?);
        }
    }

    bail!(
        "Could not find roster-server binary. Run 'cargo build -p roster-server' first. Searched in: {:?}",
        candidates
    )
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client for testing the Roster API.
pub struct RosterClient {
    client: Client,
    base_url: String,
}

impl RosterClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.client.get(self.url("/v1/sys/health")).send().await?;
        Ok(resp.json().await?)
    }

    pub async fn create_group(&self, name: &str) -> Result<Group> {
        let req = CreateGroupRequest {
            name: name.to_string(),
        };
        let resp = self
            .client
            .post(self.url("/v1/groups"))
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("Create group failed: {}", resp.text().await?);
        }
        Ok(resp.json().await?)
    }

    /// Returns the status code alongside the parsed body.
    pub async fn sync(&self, token: Option<&str>) -> Result<(u16, Option<SyncResponse>)> {
        let mut req = self.client.post(self.url("/v1/auth/sync"));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Ok((status, None));
        }
        Ok((status, Some(resp.json().await?)))
    }

    pub async fn user_groups(&self, user_id: &str) -> Result<UserGroupsResponse> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/users/{}/groups", user_id)))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("Get user groups failed: {}", resp.text().await?);
        }
        Ok(resp.json().await?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};

    // Port counter to avoid conflicts between parallel tests
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18300);

    fn next_port() -> u16 {
        PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
    }

    async fn configured_server(esi_url: &str, extra: &[&str]) -> TestServer {
        let mut args = vec![
            "--esi-url",
            esi_url,
            "--corp-ids",
            CORP_ID,
            "--member-group-names",
            "Member",
            "--keyword-blacklist",
            "admin",
            "--use-auto-roles",
        ];
        args.extend_from_slice(extra);
        TestServer::start(next_port(), &args).await.unwrap()
    }

    fn group_names(groups: &UserGroupsResponse) -> Vec<String> {
        let mut names: Vec<String> = groups.groups.iter().map(|g| g.name.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_server_health_in_dev_mode() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();

        let health = server.client().health().await.unwrap();

        assert_eq!(health.status, "ok");
        assert_eq!(health.storage, "memory");
    }

    #[tokio::test]
    async fn test_full_sync_workflow() {
        let esi = start_fake_esi().await.unwrap();
        let server = configured_server(&esi, &[]).await;
        let client = server.client();

        for name in ["Director", "Fleet Commander", "Member", "Wiki Admins", "Logistics"] {
            client.create_group(name).await.unwrap();
        }

        // 1. Member logs in and receives role, title and member groups
        let token = sso_token(MEMBER_CHARACTER, "Jita Trader");
        let (status, body) = client.sync(Some(&token)).await.unwrap();
        assert_eq!(status, 200);
        let body = body.unwrap();
        assert_eq!(body.outcome, "synced");
        assert_eq!(body.identity["id"], MEMBER_CHARACTER);

        let groups = client.user_groups(MEMBER_CHARACTER).await.unwrap();
        assert_eq!(
            group_names(&groups),
            vec!["Director", "Fleet Commander", "Member"]
        );

        // 2. Logging in again changes nothing
        let (_, body) = client.sync(Some(&token)).await.unwrap();
        let report = body.unwrap().result.unwrap();
        assert_eq!(report["plan"]["to_add"], json!([]));
        assert_eq!(report["plan"]["to_remove"], json!([]));

        // 3. An outsider gets nothing
        let token = sso_token(OUTSIDER_CHARACTER, "Hisec Miner");
        let (_, body) = client.sync(Some(&token)).await.unwrap();
        let report = body.unwrap().result.unwrap();
        assert_eq!(report["membership"]["is_corp_member"], false);

        let groups = client.user_groups(OUTSIDER_CHARACTER).await.unwrap();
        assert!(groups.groups.is_empty());
    }

    #[tokio::test]
    async fn test_sync_not_configured() {
        let esi = start_fake_esi().await.unwrap();
        let server = TestServer::start(next_port(), &["--esi-url", &esi])
            .await
            .unwrap();
        let client = server.client();
        client.create_group("Member").await.unwrap();

        let token = sso_token(MEMBER_CHARACTER, "Jita Trader");
        let (status, body) = client.sync(Some(&token)).await.unwrap();

        assert_eq!(status, 200);
        assert_eq!(body.unwrap().outcome, "not_configured");
        let groups = client.user_groups(MEMBER_CHARACTER).await.unwrap();
        assert!(groups.groups.is_empty());
    }

    #[tokio::test]
    async fn test_esi_outage_respects_failure_policy() {
        // Nothing listens on this address
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_esi = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let token = sso_token(MEMBER_CHARACTER, "Jita Trader");

        let server = configured_server(&dead_esi, &[]).await;
        let (status, body) = server.client().sync(Some(&token)).await.unwrap();
        assert_eq!(status, 200);
        let body = body.unwrap();
        assert_eq!(body.outcome, "failed");
        assert!(body.error.is_some());

        let server = configured_server(&dead_esi, &["--on-sync-failure", "abort"]).await;
        let (status, _) = server.client().sync(Some(&token)).await.unwrap();
        assert_eq!(status, 502);
    }

    #[tokio::test]
    async fn test_token_required() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();
        let client = server.client();

        let (status, _) = client.sync(None).await.unwrap();
        assert_eq!(status, 401);

        let (status, _) = client.sync(Some("not-a-jwt")).await.unwrap();
        assert_eq!(status, 401);
    }
}
