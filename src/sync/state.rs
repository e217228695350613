//! Observable per-key state.
//!
//! Each key owns a `watch` channel carrying its latest published view.
//! Consumers hold receivers; the façade is the only sender.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cache::{CacheKey, Collection, Entity, EntityId, Patch};

/// What a consumer sees for one key.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Last published collection, `None` when nothing has been published
    pub data: Option<Collection>,
    /// True while a fetch for the key is in flight
    pub loading: bool,
    /// Message of the last failed fetch, cleared when a new fetch starts
    pub error: Option<String>,
}

#[derive(Default)]
pub struct StateBoard {
    slots: Mutex<HashMap<CacheKey, watch::Sender<ViewState>>>,
}

impl StateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, key: CacheKey) -> watch::Receiver<ViewState> {
        let mut slots = self.slots.lock();
        slots
            .entry(key)
            .or_insert_with(|| watch::channel(ViewState::default()).0)
            .subscribe()
    }

    pub fn snapshot(&self, key: &CacheKey) -> ViewState {
        self.slots
            .lock()
            .get(key)
            .map(|tx| tx.borrow().clone())
            .unwrap_or_default()
    }

    /// True when at least one consumer holds a receiver for the key.
    pub fn is_watched(&self, key: &CacheKey) -> bool {
        self.slots
            .lock()
            .get(key)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// Keys that currently hold published data.
    pub fn keys_with_data(&self) -> Vec<CacheKey> {
        self.slots
            .lock()
            .iter()
            .filter(|(_, tx)| tx.borrow().data.is_some())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn publish(&self, key: CacheKey, data: Collection) {
        self.update(key, |state| {
            let unchanged = state.data.as_ref().is_some_and(|d| Arc::ptr_eq(d, &data));
            state.data = Some(data);
            !unchanged
        });
    }

    /// Marks a fetch as started: loading on, previous error cleared.
    pub fn begin_fetch(&self, key: CacheKey) {
        self.update(key, |state| {
            state.loading = true;
            state.error = None;
            true
        });
    }

    pub fn set_loading(&self, key: CacheKey, loading: bool) {
        self.update(key, |state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    pub fn set_error(&self, key: CacheKey, message: String) {
        self.update(key, |state| {
            state.error = Some(message);
            true
        });
    }

    pub fn clear_error(&self, key: CacheKey) {
        self.update(key, |state| state.error.take().is_some());
    }

    /// Drops the published data and error for a key. Loading is untouched.
    pub fn clear(&self, key: &CacheKey) {
        let mut slots = self.slots.lock();
        if let Some(tx) = slots.get(key) {
            tx.send_if_modified(clear_view);
            if is_idle(tx) {
                slots.remove(key);
            }
        }
    }

    pub fn clear_all(&self) {
        let mut slots = self.slots.lock();
        for tx in slots.values() {
            tx.send_if_modified(clear_view);
        }
        slots.retain(|_, tx| !is_idle(tx));
    }

    /// Number of keys holding state or watched by a consumer.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Merges a patch into every published view containing `id`.
    /// Returns the keys that changed.
    pub fn patch_entity(&self, id: &EntityId, patch: &Patch) -> Vec<CacheKey> {
        self.rewrite_views(|_, data| {
            if !data.iter().any(|e| &e.id == id) {
                return None;
            }
            Some(
                data.iter()
                    .map(|e| if &e.id == id { e.merged(patch) } else { e.clone() })
                    .collect(),
            )
        })
    }

    /// Removes `id` from the published views selected by `in_scope`.
    /// A view left empty is dropped. Returns the keys that changed.
    pub fn remove_entity<F>(&self, id: &EntityId, in_scope: F) -> Vec<CacheKey>
    where
        F: Fn(&CacheKey) -> bool,
    {
        self.rewrite_views(|key, data| {
            if !in_scope(key) || !data.iter().any(|e| &e.id == id) {
                return None;
            }
            Some(data.iter().filter(|e| &e.id != id).cloned().collect())
        })
    }

    fn rewrite_views<F>(&self, rewrite: F) -> Vec<CacheKey>
    where
        F: Fn(&CacheKey, &Collection) -> Option<Vec<Entity>>,
    {
        let mut slots = self.slots.lock();
        let mut touched = Vec::new();
        for (key, tx) in slots.iter() {
            let modified = tx.send_if_modified(|state| {
                let Some(data) = state.data.as_ref() else {
                    return false;
                };
                let Some(next) = rewrite(key, data) else {
                    return false;
                };
                state.data = if next.is_empty() { None } else { Some(Arc::new(next)) };
                true
            });
            if modified {
                touched.push(*key);
            }
        }
        for key in &touched {
            if slots.get(key).is_some_and(is_idle) {
                slots.remove(key);
            }
        }
        touched
    }

    fn update<F>(&self, key: CacheKey, modify: F)
    where
        F: FnOnce(&mut ViewState) -> bool,
    {
        let mut slots = self.slots.lock();
        let tx = slots
            .entry(key)
            .or_insert_with(|| watch::channel(ViewState::default()).0);
        tx.send_if_modified(modify);
        if is_idle(tx) {
            slots.remove(&key);
        }
    }
}

/// A slot nobody watches and that holds nothing can be dropped; a later
/// subscriber starts from the same default state.
fn is_idle(tx: &watch::Sender<ViewState>) -> bool {
    if tx.receiver_count() > 0 {
        return false;
    }
    let state = tx.borrow();
    state.data.is_none() && state.error.is_none() && !state.loading
}

fn clear_view(state: &mut ViewState) -> bool {
    let changed = state.data.is_some() || state.error.is_some();
    state.data = None;
    state.error = None;
    changed
}
