//! Error types for the plan synchronization cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Maximum length of a remote error body carried inside an error message
const MAX_ERROR_BODY_LENGTH: usize = 500;

// == Sync Error Enum ==
/// Unified error type for the synchronization layer.
///
/// `Clone` because a single failed fetch is delivered to every caller that
/// joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote collection source failed or timed out
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A cache key could not be parsed
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Nothing cached or published for the requested item
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Builds a transport error from a non-success response of the remote source.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        };
        SyncError::Transport(format!("status {}: {}", status, body))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
            SyncError::InvalidKey(_) | SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Config(_) | SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the synchronization layer.
pub type Result<T> = std::result::Result<T, SyncError>;
