//! Remote Collection Sources
//!
//! The boundary between the cache and whatever actually produces plan
//! collections.
//!
//! # Sources
//! - `HttpPlanSource`: the remote REST plans API
//! - `MemorySource`: in-process collections, for offline use and tests

mod http;
mod memory;

use futures::future::BoxFuture;

use crate::cache::{CacheKey, Entity};
use crate::error::Result;

pub use http::HttpPlanSource;
pub use memory::MemorySource;

/// Produces the collection behind a cache key.
///
/// Timeouts and retries are the source's own business; the cache surfaces
/// whatever error it returns verbatim.
pub trait CollectionSource: Send + Sync + 'static {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<Vec<Entity>>>;
}
