//! API Module
//!
//! HTTP handlers and routing that expose the plan cache to local view layers.
//!
//! # Endpoints
//! - `GET /plans`, `GET /plans/date/:date` - Fetch through the cache
//! - `PATCH /plans/:id`, `DELETE /plans/:id` - Optimistic mutations
//! - `GET /views/:key` - Published state, never fetches
//! - `POST /cache/invalidate` - Drop cached data
//! - `POST /events/plan-created` - Trigger a refresh
//! - `GET /stats`, `GET /health`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
