//! Pending Request Registry
//!
//! Tracks the fetch currently in flight for each key so concurrent callers
//! can join it instead of issuing their own.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};

use crate::cache::{CacheKey, Collection};
use crate::error::Result;

/// A fetch that any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Collection>>>;

// == Pending Request ==
/// An in-flight fetch and the generation it was issued with.
#[derive(Clone)]
pub struct PendingRequest {
    pub generation: u64,
    pub future: SharedFetch,
}

// == Pending Registry ==
/// At most one registered request per key.
#[derive(Default)]
pub struct PendingRegistry {
    requests: HashMap<CacheKey, PendingRequest>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&PendingRequest> {
        self.requests.get(key)
    }

    /// Registers a request, replacing any previous one for the key.
    /// The replaced request keeps running for the callers already awaiting it.
    pub fn set(&mut self, key: CacheKey, request: PendingRequest) -> Option<PendingRequest> {
        self.requests.insert(key, request)
    }

    /// Deregisters the request for `key` if it is still the one issued with
    /// `generation`. Returns whether it was removed.
    pub fn delete(&mut self, key: &CacheKey, generation: u64) -> bool {
        match self.requests.get(key) {
            Some(request) if request.generation == generation => {
                self.requests.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.requests.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
