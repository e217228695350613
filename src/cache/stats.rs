//! Cache Statistics Module
//!
//! Tracks cache effectiveness: fresh hits, network fetches, coalesced
//! joins, failures and reaper evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Requests answered from a fresh entry
    pub hits: u64,
    /// Requests that found no fresh entry
    pub misses: u64,
    /// Fetches issued against the remote source
    pub fetches: u64,
    /// Requests that joined a fetch already in flight
    pub coalesced: u64,
    /// Fetches that failed
    pub failures: u64,
    /// Entries removed by the reaper
    pub evictions: u64,
    /// Current number of cached views
    pub total_entries: usize,
    /// Current number of distinct cached entities
    pub total_entities: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }
}
