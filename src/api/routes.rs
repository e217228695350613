//! API Routes
//!
//! Configures the Axum router with all plan cache endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    fetch_all_handler, fetch_date_handler, health_handler, invalidate_handler, patch_handler,
    plan_created_handler, remove_handler, stats_handler, view_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /plans` - Full plan listing (`?force=true` bypasses the cache)
/// - `GET /plans/date/:date` - Plans for one day
/// - `PATCH /plans/:id` - Optimistic update of one plan
/// - `DELETE /plans/:id` - Optimistic removal (`?key=` limits it to one day)
/// - `GET /views/:key` - Published view, loading flag and last error
/// - `POST /cache/invalidate` - Drop one key or everything
/// - `POST /events/plan-created` - Queue a refresh after a plan was created
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/plans", get(fetch_all_handler))
        .route("/plans/date/:date", get(fetch_date_handler))
        .route("/plans/:id", delete(remove_handler).patch(patch_handler))
        .route("/views/:key", get(view_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/events/plan-created", post(plan_created_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
