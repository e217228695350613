//! Cache Module
//!
//! Normalized plan storage, freshness bookkeeping and the registry of
//! in-flight fetches.

mod entity;
mod entry;
mod key;
mod pending;
mod stats;
mod store;


// Re-export public types
pub use entity::{Collection, Entity, EntityId, Patch};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use pending::{PendingRegistry, PendingRequest, SharedFetch};
pub use stats::CacheStats;
pub use store::{CacheStore, WriteOutcome};
