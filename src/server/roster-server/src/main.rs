//! Roster Server - Main entry point.

mod api;
mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster_auth::EveSsoBackend;
use roster_esi::EsiClient;
use roster_storage::{GroupStore, MemoryBackend, UserStore};
use roster_storage_sqlite::SqliteBackend;
use roster_sync::GroupSynchronizer;

use crate::api::AppState;
use crate::config::Cli;

/// Actor recorded in the membership history for sync-driven changes.
const SYNC_ACTOR: &str = "roster-sync";

async fn build_state(cli: &Cli) -> anyhow::Result<AppState> {
    let users: Arc<dyn UserStore>;
    let groups: Arc<dyn GroupStore>;
    let storage = if cli.dev {
        let backend = Arc::new(MemoryBackend::new());
        users = backend.clone();
        groups = backend;
        "memory"
    } else {
        let backend = SqliteBackend::open(&cli.data_dir, "roster")
            .await
            .with_context(|| format!("Failed to open database in {}", cli.data_dir.display()))?
            .with_actor(SYNC_ACTOR);
        let backend = Arc::new(backend);
        users = backend.clone();
        groups = backend;
        "sqlite"
    };

    let sync_config = cli.sync_config();
    if !sync_config.is_configured() {
        tracing::warn!("No corporation or alliance ids configured - group sync is disabled");
    }

    let esi = EsiClient::new(cli.esi_config()).context("Failed to create ESI client")?;
    let sync = GroupSynchronizer::new(Arc::new(esi), groups.clone(), sync_config);

    Ok(AppState {
        auth: Arc::new(EveSsoBackend::new()),
        users,
        groups,
        sync,
        failure_policy: cli.on_sync_failure,
        logout_url: cli.logout_url.clone(),
        storage,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Roster server...");
    tracing::info!("Bind address: {}", cli.bind);

    if cli.dev {
        tracing::warn!("Development mode enabled - memberships are not persisted");
    }

    let state = build_state(&cli).await?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;

    tracing::info!("Roster server started successfully");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
