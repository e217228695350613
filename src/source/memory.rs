//! In-process collection source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

use super::CollectionSource;
use crate::cache::{CacheKey, Entity};
use crate::error::{Result, SyncError};

#[derive(Default)]
struct Inner {
    collections: Mutex<HashMap<CacheKey, Vec<Entity>>>,
    failures: Mutex<HashMap<CacheKey, String>>,
    calls: Mutex<HashMap<CacheKey, usize>>,
    total_calls: AtomicUsize,
    latency: Mutex<Duration>,
}

/// Serves collections from memory. Cloning shares the same data.
///
/// Unknown keys yield an empty collection.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Inner>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock() = latency;
        self
    }

    pub fn set(&self, key: CacheKey, entities: Vec<Entity>) {
        self.inner.collections.lock().insert(key, entities);
    }

    /// Makes fetches for `key` fail with `message` until cleared.
    pub fn fail(&self, key: CacheKey, message: impl Into<String>) {
        self.inner.failures.lock().insert(key, message.into());
    }

    pub fn clear_failure(&self, key: &CacheKey) {
        self.inner.failures.lock().remove(key);
    }

    /// Fetches issued for one key.
    pub fn calls(&self, key: &CacheKey) -> usize {
        self.inner.calls.lock().get(key).copied().unwrap_or(0)
    }

    /// Fetches issued for any key.
    pub fn total_calls(&self) -> usize {
        self.inner.total_calls.load(Ordering::SeqCst)
    }
}

impl CollectionSource for MemorySource {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<Vec<Entity>>> {
        let inner = Arc::clone(&self.inner);
        let key = *key;
        *inner.calls.lock().entry(key).or_insert(0) += 1;
        inner.total_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *inner.latency.lock();

        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if let Some(message) = inner.failures.lock().get(&key) {
                return Err(SyncError::Transport(message.clone()));
            }
            Ok(inner.collections.lock().get(&key).cloned().unwrap_or_default())
        }
        .boxed()
    }
}
