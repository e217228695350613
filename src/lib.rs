//! Plan Sync - client-side synchronization cache for visit plans
//!
//! Deduplicates concurrent fetches, serves fresh data without a round trip,
//! and applies optimistic edits ahead of server confirmation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod source;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use config::{Config, SyncConfig};
pub use error::{Result, SyncError};
pub use sync::{PlanCreated, PlanSync, ViewState};
pub use tasks::spawn_reaper;
