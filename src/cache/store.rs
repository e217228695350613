//! Cache Store Module
//!
//! Normalized storage: every entity lives once, keyed by id, and each cached
//! view (`date:*` or `all`) is an ordered index over it. Views share entities,
//! so an update through one is visible through every other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheKey, CacheStats, Collection, Entity, EntityId, Patch};

/// An entity together with the number of views listing it.
#[derive(Debug)]
struct StoredEntity {
    entity: Entity,
    refs: usize,
}

/// Result of storing a fetched collection.
#[derive(Debug)]
pub struct WriteOutcome {
    /// The collection for the written key
    pub payload: Collection,
    /// False when a newer fetch had already been stored for the key
    pub stored: bool,
    /// Other views whose content changed because they share entities
    pub refreshed: Vec<CacheKey>,
}

// == Cache Store ==
/// Process-wide storage behind the synchronization façade.
#[derive(Debug, Default)]
pub struct CacheStore {
    entities: HashMap<EntityId, StoredEntity>,
    entries: HashMap<CacheKey, CacheEntry>,
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the entry for a key, fresh or not.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Get Fresh ==
    /// Returns the payload if the entry is younger than `stale_window`.
    /// Counts a hit or a miss.
    pub fn get_fresh(
        &mut self,
        key: &CacheKey,
        stale_window: Duration,
        now: Instant,
    ) -> Option<Collection> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(stale_window, now) => {
                let payload = Arc::clone(&entry.payload);
                self.stats.record_hit();
                Some(payload)
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Write ==
    /// Stores a fetched collection under `key`.
    ///
    /// A write carrying an older generation than the stored entry is
    /// discarded. `fetched_at` never moves backwards.
    pub fn write(
        &mut self,
        key: CacheKey,
        fetched: Vec<Entity>,
        generation: u64,
        now: Instant,
    ) -> WriteOutcome {
        if let Some(existing) = self.entries.get(&key) {
            if existing.generation > generation {
                return WriteOutcome {
                    payload: Arc::new(fetched),
                    stored: false,
                    refreshed: Vec::new(),
                };
            }
        }

        // Dedup by id: first position wins, last content wins.
        let mut ids = Vec::with_capacity(fetched.len());
        let mut latest: HashMap<EntityId, Entity> = HashMap::with_capacity(fetched.len());
        for entity in fetched {
            if !latest.contains_key(&entity.id) {
                ids.push(entity.id.clone());
            }
            latest.insert(entity.id.clone(), entity);
        }

        let mut changed = HashSet::new();
        for (id, entity) in latest {
            match self.entities.get_mut(&id) {
                Some(stored) => {
                    if stored.entity != entity {
                        stored.entity = entity;
                        changed.insert(id);
                    }
                    stored.refs += 1;
                }
                None => {
                    self.entities.insert(id, StoredEntity { entity, refs: 1 });
                }
            }
        }

        let payload = materialize(&self.entities, &ids);
        let previous = self.entries.remove(&key);
        let fetched_at = previous
            .as_ref()
            .map_or(now, |prev| prev.fetched_at.max(now));
        if let Some(prev) = previous {
            self.release(&prev.ids);
        }

        self.entries.insert(
            key,
            CacheEntry {
                ids,
                payload: Arc::clone(&payload),
                fetched_at,
                fetched_at_utc: Utc::now(),
                generation,
            },
        );

        let refreshed = self.rematerialize_where(|k, entry| {
            *k != key && entry.ids.iter().any(|id| changed.contains(id))
        });

        WriteOutcome {
            payload,
            stored: true,
            refreshed,
        }
    }

    // == Patch ==
    /// Merges `patch` into the entity with `id` and rewrites every view
    /// listing it. `fetched_at` is preserved. Unknown ids are a no-op.
    ///
    /// Returns the keys whose payload changed.
    pub fn patch(&mut self, id: &EntityId, patch: &Patch) -> Vec<CacheKey> {
        let Some(stored) = self.entities.get_mut(id) else {
            return Vec::new();
        };
        stored.entity.merge(patch);
        self.rematerialize_where(|_, entry| entry.ids.contains(id))
    }

    // == Remove Entity ==
    /// Drops `id` from the given view (or every view) and from `all`.
    ///
    /// Returns the keys whose payload changed.
    pub fn remove_entity(&mut self, id: &EntityId, scope: Option<CacheKey>) -> Vec<CacheKey> {
        let targets: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(k, entry)| {
                let in_scope = match scope {
                    Some(scoped) => **k == scoped || **k == CacheKey::All,
                    None => true,
                };
                in_scope && entry.ids.contains(id)
            })
            .map(|(k, _)| *k)
            .collect();

        for key in &targets {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.ids.retain(|existing| existing != id);
                entry.payload = materialize(&self.entities, &entry.ids);
            }
            self.release(std::slice::from_ref(id));
        }

        targets
    }

    // == Delete ==
    /// Removes the entry for a key. Returns whether one existed.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.release(&entry.ids);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Removes every entry and entity. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.entities.clear();
    }

    // == Reap Expired ==
    /// Removes entries at least `max_age` old, except those for which
    /// `skip` returns true.
    ///
    /// Returns the number of entries removed.
    pub fn reap_expired<F>(&mut self, max_age: Duration, now: Instant, skip: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, entry)| entry.is_expired(max_age, now) && !skip(key))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.delete(key);
        }

        self.stats.record_evictions(expired.len());
        expired.len()
    }

    /// Looks up a cached entity by id.
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id).map(|stored| &stored.entity)
    }

    /// Keys of all cached views.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.keys().copied().collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.total_entities = self.entities.len();
        stats
    }

    /// Counters updated by the façade.
    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    // == Length ==
    /// Returns the current number of cached views.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct cached entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Decrements reference counts, dropping entities no view lists anymore.
    fn release(&mut self, ids: &[EntityId]) {
        for id in ids {
            if let Some(stored) = self.entities.get_mut(id) {
                stored.refs = stored.refs.saturating_sub(1);
                if stored.refs == 0 {
                    self.entities.remove(id);
                }
            }
        }
    }

    fn rematerialize_where<F>(&mut self, pred: F) -> Vec<CacheKey>
    where
        F: Fn(&CacheKey, &CacheEntry) -> bool,
    {
        let mut touched = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if pred(key, entry) {
                entry.payload = materialize(&self.entities, &entry.ids);
                touched.push(*key);
            }
        }
        touched
    }

    #[cfg(test)]
    pub(crate) fn refs(&self, id: &EntityId) -> usize {
        self.entities.get(id).map_or(0, |stored| stored.refs)
    }
}

fn materialize(entities: &HashMap<EntityId, StoredEntity>, ids: &[EntityId]) -> Collection {
    Arc::new(
        ids.iter()
            .filter_map(|id| entities.get(id).map(|stored| stored.entity.clone()))
            .collect(),
    )
}
