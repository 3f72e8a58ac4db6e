//! HTTP API.
//!
//! - `GET  /v1/sys/health` - liveness and storage kind
//! - `POST /v1/auth/sync` - identify the bearer token and synchronize groups
//! - `GET  /v1/auth/logout` - post-logout redirect target
//! - `GET  /v1/groups`, `POST /v1/groups` - group catalog
//! - `GET  /v1/users/{id}/groups` - a user's current groups

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use roster_auth::{AuthBackend, AuthError, Identity};
use roster_storage::{Group, GroupId, GroupStore, StorageError, UserRecord, UserStore};
use roster_sync::{GroupSynchronizer, SyncOutcome};

use crate::config::SyncFailurePolicy;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthBackend>,
    pub users: Arc<dyn UserStore>,
    pub groups: Arc<dyn GroupStore>,
    pub sync: GroupSynchronizer,
    pub failure_policy: SyncFailurePolicy,
    pub logout_url: Option<String>,
    pub storage: &'static str,
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/sys/health", get(health))
        .route("/v1/auth/sync", post(sync))
        .route("/v1/auth/logout", get(logout))
        .route("/v1/groups", get(list_groups).post(create_group))
        .route("/v1/users/{id}/groups", get(user_groups))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Handler errors mapped onto status codes.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e),
            ApiError::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            ApiError::Conflict(e) => (StatusCode::CONFLICT, e),
            ApiError::BadGateway(e) => (StatusCode::BAD_GATEWAY, e),
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
            StorageError::InvalidInput(_) => ApiError::BadRequest(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage,
    })
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    identity: Identity,
    outcome: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum SyncStatus {
    Synced,
    NotConfigured,
    Failed,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::from(AuthError::MissingToken))
}

async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SyncResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let identity = state.auth.identify(token).await?;
    info!(
        backend = state.auth.name(),
        character_id = %identity.id,
        "Authenticated character"
    );

    state
        .users
        .upsert_user(&UserRecord {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            email: Some(identity.email()),
        })
        .await?;

    let response = match state.sync.synchronize(&identity, token).await {
        Ok(outcome) => SyncResponse {
            identity,
            outcome: match outcome {
                SyncOutcome::NotConfigured => SyncStatus::NotConfigured,
                SyncOutcome::Synced(_) => SyncStatus::Synced,
            },
            result: Some(outcome),
            error: None,
        },
        Err(e) => {
            warn!(character_id = %identity.id, error = %e, "Group sync failed");
            if state.failure_policy == SyncFailurePolicy::Abort {
                return Err(ApiError::BadGateway(e.to_string()));
            }
            SyncResponse {
                identity,
                outcome: SyncStatus::Failed,
                result: None,
                error: Some(e.to_string()),
            }
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    redirect: String,
}

async fn logout(State(state): State<AppState>) -> Json<LogoutResponse> {
    Json(LogoutResponse {
        redirect: state.logout_url.clone().unwrap_or_else(|| "/".to_string()),
    })
}

async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.groups.list_groups().await?))
}

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    name: String,
}

async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = state.groups.create_group(&req.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Debug, Serialize)]
struct UserGroupsResponse {
    user_id: String,
    groups: Vec<Group>,
    unknown: Vec<GroupId>,
}

async fn user_groups(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserGroupsResponse>, ApiError> {
    let (catalog, current) = tokio::join!(
        state.groups.list_groups(),
        state.groups.current_group_ids(&user_id)
    );
    let catalog = catalog?;
    let current = current?;

    let groups: Vec<Group> = catalog
        .into_iter()
        .filter(|g| current.contains(&g.id))
        .collect();
    let unknown = current
        .into_iter()
        .filter(|id| !groups.iter().any(|g| g.id == *id))
        .collect();

    Ok(Json(UserGroupsResponse {
        user_id,
        groups,
        unknown,
    }))
}
