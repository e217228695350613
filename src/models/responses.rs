//! Response DTOs for the plan cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheKey, CacheStats, Entity};
use crate::sync::{EntryInfo, ViewState};

/// Response body for the fetch endpoints (GET /plans, GET /plans/date/:date)
#[derive(Debug, Clone, Serialize)]
pub struct PlansResponse {
    /// The cache key served
    pub key: String,
    /// Number of plans returned
    pub count: usize,
    /// The plans
    pub plans: Vec<Entity>,
    /// When the cached entry was fetched (RFC 3339), if it is still cached
    pub fetched_at: Option<String>,
}

impl PlansResponse {
    pub fn new(key: CacheKey, plans: &[Entity], info: Option<EntryInfo>) -> Self {
        Self {
            key: key.to_string(),
            count: plans.len(),
            plans: plans.to_vec(),
            fetched_at: info.map(|i| i.fetched_at_utc.to_rfc3339()),
        }
    }
}

/// Response body for the view endpoint (GET /views/:key)
#[derive(Debug, Clone, Serialize)]
pub struct ViewResponse {
    pub key: String,
    /// Published plans, `null` when nothing is published
    pub data: Option<Vec<Entity>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ViewResponse {
    pub fn new(key: CacheKey, state: ViewState) -> Self {
        Self {
            key: key.to_string(),
            data: state.data.map(|plans| plans.as_ref().clone()),
            loading: state.loading,
            error: state.error,
        }
    }
}

/// Response body for PATCH /plans/:id and DELETE /plans/:id
#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse {
    /// Success message
    pub message: String,
    /// The entity id
    pub id: String,
    /// How many views changed
    pub views_updated: usize,
}

impl MutationResponse {
    pub fn new(action: &str, id: impl Into<String>, views_updated: usize) -> Self {
        let id = id.into();
        Self {
            message: format!("Plan '{}' {} in {} view(s)", id, action, views_updated),
            id,
            views_updated,
        }
    }
}

/// Plain acknowledgement (POST /cache/invalidate, POST /events/plan-created)
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
