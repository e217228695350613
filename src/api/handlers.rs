//! API Handlers
//!
//! HTTP request handlers exposing the plan cache to local view layers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::{CacheKey, EntityId};
use crate::error::{Result, SyncError};
use crate::models::{
    validate_patch, FetchQuery, HealthResponse, InvalidateRequest, MessageResponse,
    MutationResponse, PlansResponse, RemoveQuery, StatsResponse, ViewResponse,
};
use crate::sync::{spawn_refresh_listener, PlanCreated, PlanSync};

/// Capacity of the plan-created event queue
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Application state shared across all handlers.
///
/// Contains the plan cache handle and the sender feeding the refresh listener.
#[derive(Clone)]
pub struct AppState {
    /// Shared plan cache
    pub sync: PlanSync,
    /// Plan-created notifications
    pub events: mpsc::Sender<PlanCreated>,
}

impl AppState {
    /// Creates a new AppState from a cache handle and an event sender.
    pub fn new(sync: PlanSync, events: mpsc::Sender<PlanCreated>) -> Self {
        Self { sync, events }
    }

    /// Creates a new AppState and spawns the refresh listener fed by it.
    pub fn with_listener(sync: PlanSync) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let listener = spawn_refresh_listener(sync.clone(), rx);
        (Self::new(sync, tx), listener)
    }
}

async fn fetch_response(state: &AppState, key: CacheKey, force: bool) -> Result<Json<PlansResponse>> {
    let plans = state.sync.fetch_by_key(key, force).await?;
    let info = state.sync.entry_info(&key);
    Ok(Json(PlansResponse::new(key, &plans, info)))
}

/// Handler for GET /plans
///
/// Returns the full plan listing, from cache when fresh.
pub async fn fetch_all_handler(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<PlansResponse>> {
    fetch_response(&state, CacheKey::All, query.force).await
}

/// Handler for GET /plans/date/:date
///
/// Returns the plans for one day, from cache when fresh.
pub async fn fetch_date_handler(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<PlansResponse>> {
    let key: CacheKey = date.parse()?;
    fetch_response(&state, key, query.force).await
}

/// Handler for GET /views/:key
///
/// Returns the published view, loading flag and last error. Never fetches.
pub async fn view_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ViewResponse>> {
    let key: CacheKey = key.parse()?;
    Ok(Json(ViewResponse::new(key, state.sync.snapshot(&key))))
}

/// Handler for POST /cache/invalidate
///
/// Drops one key, or everything when the body names no key.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    body: Option<Json<InvalidateRequest>>,
) -> Result<Json<MessageResponse>> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let key = request.cache_key()?;
    state.sync.invalidate(key);

    let message = match key {
        Some(key) => format!("Key '{}' invalidated", key),
        None => "Cache cleared".to_string(),
    };
    Ok(Json(MessageResponse::new(message)))
}

/// Handler for PATCH /plans/:id
///
/// Applies an optimistic update to every cached copy of the plan.
pub async fn patch_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<MutationResponse>> {
    let patch = validate_patch(body)?;
    let views = EntityId::candidates(&id)
        .iter()
        .map(|candidate| state.sync.apply_patch(candidate, &patch))
        .sum();
    Ok(Json(MutationResponse::new("updated", id, views)))
}

/// Handler for DELETE /plans/:id
///
/// Removes the plan from one day (`?key=`) or every day, and from `all`.
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<MutationResponse>> {
    let key = query.cache_key()?;
    let views = EntityId::candidates(&id)
        .iter()
        .map(|candidate| state.sync.remove_entity(candidate, key))
        .sum();
    Ok(Json(MutationResponse::new("removed", id, views)))
}

/// Handler for POST /events/plan-created
///
/// Queues a refresh of the affected views and returns immediately.
pub async fn plan_created_handler(
    State(state): State<AppState>,
    Json(event): Json<PlanCreated>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state
        .events
        .send(event)
        .await
        .map_err(|_| SyncError::Internal("refresh listener is not running".to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("Refresh queued")),
    ))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.sync.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
