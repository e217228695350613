//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of the
//! process.
//!
//! # Tasks
//! - Reaper: Evicts aged-out cache entries at configured intervals

mod reaper;

pub use reaper::spawn_reaper;
