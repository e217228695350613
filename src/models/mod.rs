//! Request and Response models for the plan cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_patch, FetchQuery, InvalidateRequest, RemoveQuery};
pub use responses::{
    ErrorResponse, HealthResponse, MessageResponse, MutationResponse, PlansResponse,
    StatsResponse, ViewResponse,
};
