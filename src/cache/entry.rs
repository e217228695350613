//! Cache Entry Module
//!
//! One cached view: the ordered ids of a fetched collection plus the
//! timestamps the freshness and eviction rules are evaluated against.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::cache::{Collection, EntityId};

// == Cache Entry ==
/// A cached view over the normalized entity store.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Entity ids in the order the source returned them
    pub ids: Vec<EntityId>,
    /// Materialized collection handed to callers
    pub payload: Collection,
    /// When the last successful fetch for this key was stored
    pub fetched_at: Instant,
    /// Wall-clock counterpart of `fetched_at`, for reporting
    pub fetched_at_utc: DateTime<Utc>,
    /// Issue order of the fetch that produced this entry
    pub generation: u64,
}

impl CacheEntry {
    // == Age ==
    /// Time elapsed since the entry was fetched.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    // == Is Fresh ==
    /// Fresh entries are served without touching the network.
    ///
    /// Boundary condition: an entry whose age equals the window is no longer fresh.
    pub fn is_fresh(&self, stale_window: Duration, now: Instant) -> bool {
        self.age(now) < stale_window
    }

    // == Is Expired ==
    /// Expired entries are removed by the reaper.
    ///
    /// Boundary condition: an entry is expired as soon as its age reaches `max_age`.
    pub fn is_expired(&self, max_age: Duration, now: Instant) -> bool {
        self.age(now) >= max_age
    }
}
