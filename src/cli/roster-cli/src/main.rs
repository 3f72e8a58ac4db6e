//! Roster CLI - Command line interface.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Roster CLI - Manage EVE Online corporation group sync")]
#[command(version)]
struct Cli {
    /// Roster server address
    #[arg(long, default_value = "http://localhost:8300", env = "ROSTER_ADDR")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group catalog management
    Groups {
        #[command(subcommand)]
        command: GroupsCommands,
    },
    /// Run a group sync for the character owning an SSO access token
    Sync {
        /// EVE SSO access token
        #[arg(long, env = "ROSTER_SSO_TOKEN")]
        token: String,
        /// Print the full JSON report
        #[arg(long)]
        json: bool,
    },
    /// Show the groups a user currently holds
    Members {
        /// Character id
        user_id: String,
    },
    /// Check server status
    Status,
}

#[derive(Subcommand)]
enum GroupsCommands {
    /// List groups
    List,
    /// Create a group
    Create {
        /// Group name
        name: String,
    },
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    storage: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct Group {
    id: i64,
    name: String,
}

#[derive(Serialize)]
struct CreateGroupRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserGroupsResponse {
    user_id: String,
    groups: Vec<Group>,
    unknown: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct Identity {
    id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    identity: Identity,
    outcome: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct RosterClient {
    client: Client,
    base_url: String,
}

impl RosterClient {
    fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse<T: DeserializeOwned>(resp: Response, action: &str) -> Result<T> {
        if !resp.status().is_success() {
            let error: ErrorResponse = resp.json().await.unwrap_or(ErrorResponse {
                error: "Unknown error".into(),
            });
            bail!("{} failed: {}", action, error.error);
        }

        resp.json().await.context("Failed to parse response")
    }

    async fn get_health(&self) -> Result<HealthResponse> {
        let resp = self
            .client
            .get(self.url("/v1/sys/health"))
            .send()
            .await
            .context("Failed to connect to server")?;

        Self::parse(resp, "Health check").await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let resp = self
            .client
            .get(self.url("/v1/groups"))
            .send()
            .await
            .context("Failed to connect to server")?;

        Self::parse(resp, "List groups").await
    }

    async fn create_group(&self, name: &str) -> Result<Group> {
        let resp = self
            .client
            .post(self.url("/v1/groups"))
            .json(&CreateGroupRequest { name })
            .send()
            .await
            .context("Failed to connect to server")?;

        Self::parse(resp, "Create group").await
    }

    async fn sync(&self, token: &str) -> Result<SyncResponse> {
        let resp = self
            .client
            .post(self.url("/v1/auth/sync"))
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to connect to server")?;

        Self::parse(resp, "Sync").await
    }

    async fn user_groups(&self, user_id: &str) -> Result<UserGroupsResponse> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/users/{}/groups", user_id)))
            .send()
            .await
            .context("Failed to connect to server")?;

        Self::parse(resp, "Get user groups").await
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_status(client: &RosterClient) -> Result<()> {
    let health = client.get_health().await?;

    println!("Roster server status:");
    println!("  Status:  {}", health.status);
    println!("  Version: {}", health.version);
    println!("  Storage: {}", health.storage);

    Ok(())
}

async fn cmd_groups_list(client: &RosterClient) -> Result<()> {
    let groups = client.list_groups().await?;

    if groups.is_empty() {
        println!("No groups found");
    } else {
        println!("Groups:");
        for group in &groups {
            println!("  {:>6}  {}", group.id, group.name);
        }
    }

    Ok(())
}

async fn cmd_groups_create(client: &RosterClient, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Group name cannot be empty");
    }

    let group = client.create_group(name).await?;
    println!("Group '{}' created (id {})", group.name, group.id);

    Ok(())
}

/// Reads a list of group ids out of the sync report.
fn report_ids(report: &Value, section: &str, field: &str) -> Vec<String> {
    report[section][field]
        .as_array()
        .map(|ids| ids.iter().map(|id| id.to_string()).collect())
        .unwrap_or_default()
}

async fn cmd_sync(client: &RosterClient, token: &str, json: bool) -> Result<()> {
    let result = client.sync(token).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.result)?);
    }

    println!(
        "Character: {} ({})",
        result.identity.display_name, result.identity.id
    );

    match result.outcome.as_str() {
        "not_configured" => println!("Group sync is not configured on the server."),
        "failed" => {
            println!(
                "Group sync failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        },
        _ => {
            let report = result.result.unwrap_or(Value::Null);
            let member = report["membership"]["is_corp_member"].as_bool() == Some(true)
                || report["membership"]["is_alliance_member"].as_bool() == Some(true);

            println!("  Member:    {}", member);
            println!("  Added:     {:?}", report_ids(&report, "mutations", "added"));
            println!("  Removed:   {:?}", report_ids(&report, "mutations", "removed"));
            println!("  Protected: {:?}", report_ids(&report, "plan", "protected"));

            let failures = report["mutations"]["failures"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            if !failures.is_empty() {
                println!("  Failures:");
                for failure in &failures {
                    println!(
                        "    {} {}: {}",
                        failure["operation"].as_str().unwrap_or("?"),
                        failure["group_id"],
                        failure["error"].as_str().unwrap_or("?")
                    );
                }
            }
        },
    }

    Ok(())
}

async fn cmd_members(client: &RosterClient, user_id: &str) -> Result<()> {
    let result = client.user_groups(user_id).await?;

    if result.groups.is_empty() && result.unknown.is_empty() {
        println!("User {} holds no groups", result.user_id);
        return Ok(());
    }

    println!("Groups of {}:", result.user_id);
    for group in &result.groups {
        println!("  {:>6}  {}", group.id, group.name);
    }
    for id in &result.unknown {
        println!("  {:>6}  (unknown group)", id);
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RosterClient::new(&cli.addr)?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Groups { command } => match command {
            GroupsCommands::List => cmd_groups_list(&client).await,
            GroupsCommands::Create { name } => cmd_groups_create(&client, &name).await,
        },
        Commands::Sync { token, json } => cmd_sync(&client, &token, json).await,
        Commands::Members { user_id } => cmd_members(&client, &user_id).await,
    }
}
