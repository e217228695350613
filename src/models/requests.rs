//! Request DTOs for the plan cache API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::CacheKey;
use crate::error::{Result, SyncError};

/// Query string accepted by the fetch endpoints (`?force=true`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchQuery {
    /// Skip the freshness check and any fetch already in flight
    #[serde(default)]
    pub force: bool,
}

/// Request body for POST /cache/invalidate
///
/// # Fields
/// - `key`: the cache key to drop; every key when omitted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub key: Option<String>,
}

impl InvalidateRequest {
    /// Parses the optional key.
    pub fn cache_key(&self) -> Result<Option<CacheKey>> {
        self.key.as_deref().map(str::parse).transpose()
    }
}

/// Query string accepted by DELETE /plans/:id (`?key=date:2024-05-01`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveQuery {
    #[serde(default)]
    pub key: Option<String>,
}

impl RemoveQuery {
    /// Parses the optional scope key.
    pub fn cache_key(&self) -> Result<Option<CacheKey>> {
        self.key.as_deref().map(str::parse).transpose()
    }
}

/// Validates that a patch body is a non-empty JSON object.
pub fn validate_patch(body: serde_json::Value) -> Result<crate::cache::Patch> {
    match body {
        serde_json::Value::Object(fields) if !fields.is_empty() => Ok(fields),
        serde_json::Value::Object(_) => {
            Err(SyncError::InvalidRequest("Patch cannot be empty".to_string()))
        }
        _ => Err(SyncError::InvalidRequest(
            "Patch must be a JSON object".to_string(),
        )),
    }
}
