//! Synchronization façade.
//!
//! The only API consumers use. Serves fresh entries straight from the
//! store, joins fetches already in flight, issues new ones otherwise, and
//! applies optimistic edits to both the store and the published views.
//!
//! Lock order is pending → store → board. No path takes them in another order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::state::{StateBoard, ViewState};
use crate::cache::{
    CacheKey, CacheStats, CacheStore, Collection, Entity, EntityId, Patch, PendingRegistry,
    PendingRequest, SharedFetch,
};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::source::CollectionSource;

/// Metadata about a cached view.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub fetched_at: Instant,
    pub fetched_at_utc: DateTime<Utc>,
    pub age: Duration,
    pub len: usize,
    pub generation: u64,
}

struct Inner {
    config: SyncConfig,
    source: Arc<dyn CollectionSource>,
    pending: Mutex<PendingRegistry>,
    store: Mutex<CacheStore>,
    board: StateBoard,
    generation: AtomicU64,
}

/// Handle to the process-wide plan cache. Clones share the same state.
#[derive(Clone)]
pub struct PlanSync {
    inner: Arc<Inner>,
}

enum Acquired {
    Fresh(Collection),
    InFlight(SharedFetch),
}

impl PlanSync {
    pub fn new<S: CollectionSource>(source: S, config: SyncConfig) -> Self {
        Self::with_source(Arc::new(source), config)
    }

    pub fn with_source(source: Arc<dyn CollectionSource>, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                source,
                pending: Mutex::new(PendingRegistry::new()),
                store: Mutex::new(CacheStore::new()),
                board: StateBoard::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> SyncConfig {
        self.inner.config
    }

    // == Fetch ==
    /// Returns the collection for `key`.
    ///
    /// Without `force`, a fresh entry is returned as is and a fetch already in
    /// flight is joined. Otherwise a new fetch is issued. Callers that joined
    /// the same fetch all get the same result, failure included.
    pub async fn fetch_by_key(&self, key: CacheKey, force: bool) -> Result<Collection> {
        let future = match self.acquire(key, force) {
            Acquired::Fresh(payload) => return Ok(payload),
            Acquired::InFlight(future) => future,
        };

        let fetched = future.await?;
        // Prefer the stored view: it carries any edits made while we waited.
        let current = self
            .inner
            .store
            .lock()
            .get(&key)
            .map(|entry| Arc::clone(&entry.payload));
        let payload = current.unwrap_or(fetched);
        self.inner.board.publish(key, Arc::clone(&payload));
        Ok(payload)
    }

    /// `fetch_by_key` for the full listing.
    pub async fn fetch_all(&self, force: bool) -> Result<Collection> {
        self.fetch_by_key(CacheKey::All, force).await
    }

    /// Drops the cached entry and published view for `key`, then fetches it anew.
    pub async fn refresh(&self, key: CacheKey) -> Result<Collection> {
        self.invalidate(Some(key));
        self.fetch_by_key(key, true).await
    }

    fn acquire(&self, key: CacheKey, force: bool) -> Acquired {
        let inner = &self.inner;

        if !force {
            let fresh = inner
                .store
                .lock()
                .get_fresh(&key, inner.config.stale_window, Instant::now());
            if let Some(payload) = fresh {
                let loading = inner.pending.lock().contains(&key);
                inner.board.publish(key, Arc::clone(&payload));
                inner.board.set_loading(key, loading);
                debug!("{}: served fresh from cache", key);
                return Acquired::Fresh(payload);
            }
        }

        let mut pending = inner.pending.lock();
        if !force {
            if let Some(request) = pending.get(&key) {
                let future = request.future.clone();
                inner.store.lock().stats_mut().record_coalesced();
                debug!("{}: joined fetch #{} in flight", key, request.generation);
                return Acquired::InFlight(future);
            }
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.board.begin_fetch(key);
        // Spawned while the registry is locked, so the fetch cannot
        // deregister itself before it has been registered.
        let future = self.spawn_fetch(key, generation);
        pending.set(
            key,
            PendingRequest {
                generation,
                future: future.clone(),
            },
        );
        inner.store.lock().stats_mut().record_fetch();
        debug!("{}: issued fetch #{} (force={})", key, generation, force);
        Acquired::InFlight(future)
    }

    /// Runs the fetch on its own task so it completes even when every
    /// caller has gone away.
    fn spawn_fetch(&self, key: CacheKey, generation: u64) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _guard = FetchGuard {
                inner: Arc::clone(&inner),
                key,
                generation,
            };
            let outcome = inner.source.fetch(&key).await;
            inner.complete(key, generation, outcome)
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(SyncError::Internal(format!("fetch task for {} failed: {}", key, e)))
            })
        }
        .boxed()
        .shared()
    }

    // == Invalidate ==
    /// Drops the cached entry and published view for `key`, or for every key
    /// when `None`. Fetches in flight are left alone and will repopulate the
    /// store when they land.
    pub fn invalidate(&self, key: Option<CacheKey>) {
        match key {
            Some(key) => {
                self.inner.store.lock().delete(&key);
                self.inner.board.clear(&key);
                debug!("{}: invalidated", key);
            }
            None => {
                self.inner.store.lock().clear();
                self.inner.board.clear_all();
                debug!("cache cleared");
            }
        }
    }

    // == Apply Patch ==
    /// Optimistically merges `patch` into entity `id` wherever it is cached
    /// or published. Entries keep their `fetched_at`. Unknown ids are a no-op.
    ///
    /// Returns the number of views changed.
    pub fn apply_patch(&self, id: &EntityId, patch: &Patch) -> usize {
        let mut touched = self.inner.store.lock().patch(id, patch);
        touched.extend(self.inner.board.patch_entity(id, patch));
        count_distinct(touched)
    }

    // == Remove Entity ==
    /// Drops entity `id` from the view for `key` (every view when `None`)
    /// and from `all`. Published views left empty are dropped.
    ///
    /// Returns the number of views changed.
    pub fn remove_entity(&self, id: &EntityId, key: Option<CacheKey>) -> usize {
        let mut touched = self.inner.store.lock().remove_entity(id, key);
        touched.extend(self.inner.board.remove_entity(id, |candidate| match key {
            Some(scoped) => *candidate == scoped || *candidate == CacheKey::All,
            None => true,
        }));
        count_distinct(touched)
    }

    // == Read Accessors ==
    /// Published collection for `key`; `None` means no data. Never fetches.
    pub fn get_by_key(&self, key: &CacheKey) -> Option<Collection> {
        self.inner.board.snapshot(key).data
    }

    pub fn get_all(&self) -> Option<Collection> {
        self.get_by_key(&CacheKey::All)
    }

    pub fn is_loading(&self, key: &CacheKey) -> bool {
        self.inner.board.snapshot(key).loading
    }

    pub fn get_error(&self, key: &CacheKey) -> Option<String> {
        self.inner.board.snapshot(key).error
    }

    pub fn snapshot(&self, key: &CacheKey) -> ViewState {
        self.inner.board.snapshot(key)
    }

    /// A consumer-scoped projection that updates whenever the key's view does.
    pub fn subscribe(&self, key: CacheKey) -> watch::Receiver<ViewState> {
        self.inner.board.subscribe(key)
    }

    pub fn entry_info(&self, key: &CacheKey) -> Option<EntryInfo> {
        let now = Instant::now();
        self.inner.store.lock().get(key).map(|entry| EntryInfo {
            fetched_at: entry.fetched_at,
            fetched_at_utc: entry.fetched_at_utc,
            age: entry.age(now),
            len: entry.payload.len(),
            generation: entry.generation,
        })
    }

    /// True when the key is cached, published, or watched by a consumer.
    pub fn is_tracked(&self, key: &CacheKey) -> bool {
        self.inner.store.lock().get(key).is_some()
            || self.inner.board.snapshot(key).data.is_some()
            || self.inner.board.is_watched(key)
    }

    pub fn has_pending(&self, key: &CacheKey) -> bool {
        self.inner.pending.lock().contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.store.lock().stats()
    }

    // == Reap Expired ==
    /// One reaper sweep: evicts entries older than `max_age` unless a fetch
    /// for their key is in flight. Published views are left alone.
    pub fn reap_expired(&self) -> usize {
        let pending = self.inner.pending.lock();
        let mut store = self.inner.store.lock();
        store.reap_expired(self.inner.config.max_age, Instant::now(), |key| {
            pending.contains(key)
        })
    }
}

impl Inner {
    fn complete(
        &self,
        key: CacheKey,
        generation: u64,
        outcome: Result<Vec<Entity>>,
    ) -> Result<Collection> {
        // Still registered means no newer fetch was issued for the key.
        let latest = self
            .pending
            .lock()
            .get(&key)
            .is_some_and(|request| request.generation == generation);

        match outcome {
            Ok(entities) => {
                let (written, refreshed) = {
                    let mut store = self.store.lock();
                    let written = store.write(key, entities, generation, Instant::now());
                    let refreshed: Vec<(CacheKey, Collection)> = written
                        .refreshed
                        .iter()
                        .filter_map(|k| store.get(k).map(|e| (*k, Arc::clone(&e.payload))))
                        .collect();
                    (written, refreshed)
                };
                if written.stored {
                    self.board.clear_error(key);
                } else {
                    debug!("{}: fetch #{} superseded by a newer one", key, generation);
                }

                let published = self.board.keys_with_data();
                for (other, payload) in refreshed {
                    if published.contains(&other) {
                        self.board.publish(other, payload);
                    }
                }
                if written.stored && self.board.is_watched(&key) {
                    self.board.publish(key, Arc::clone(&written.payload));
                }
                Ok(written.payload)
            }
            Err(err) => {
                self.store.lock().stats_mut().record_failure();
                warn!("{}: fetch #{} failed: {}", key, generation, err);
                if latest {
                    self.board.set_error(key, error_message(&err));
                }
                Err(err)
            }
        }
    }
}

/// Deregisters a fetch when its task ends, however it ends.
struct FetchGuard {
    inner: Arc<Inner>,
    key: CacheKey,
    generation: u64,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        let still_pending = {
            let mut pending = self.inner.pending.lock();
            pending.delete(&self.key, self.generation);
            pending.contains(&self.key)
        };
        self.inner.board.set_loading(self.key, still_pending);
    }
}

/// Transport failures surface with the source's own message.
fn error_message(err: &SyncError) -> String {
    match err {
        SyncError::Transport(message) => message.clone(),
        other => other.to_string(),
    }
}

fn count_distinct(mut keys: Vec<CacheKey>) -> usize {
    keys.sort_by_key(|k| k.to_string());
    keys.dedup();
    keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use chrono::NaiveDate;
    use futures::future::join_all;
    use serde_json::json;

    const LATENCY: Duration = Duration::from_millis(100);

    fn day(d: u32) -> CacheKey {
        CacheKey::Date(NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
    }

    fn patch(value: serde_json::Value) -> Patch {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (MemorySource, PlanSync) {
        let source = MemorySource::new().with_latency(LATENCY);
        source.set(day(1), vec![Entity::new(1, "in progress")]);
        source.set(
            CacheKey::All,
            vec![Entity::new(1, "in progress"), Entity::new(2, "planned")],
        );
        let sync = PlanSync::new(source.clone(), SyncConfig::default());
        (source, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_coalesce() {
        let (source, sync) = setup();

        let results = join_all((0..8).map(|_| sync.fetch_by_key(day(1), false))).await;

        assert_eq!(source.calls(&day(1)), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert!(!sync.has_pending(&day(1)));
        assert!(!sync.is_loading(&day(1)));
        assert_eq!(sync.stats().coalesced, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_short_circuits() {
        let (source, sync) = setup();

        let first = sync.fetch_by_key(day(1), false).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let second = sync.fetch_by_key(day(1), false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(&day(1)), 1);
        assert_eq!(sync.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_refetches() {
        let (source, sync) = setup();

        sync.fetch_by_key(day(1), false).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        sync.fetch_by_key(day(1), false).await.unwrap();

        assert_eq!(source.calls(&day(1)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_bypasses_fresh_entry() {
        let (source, sync) = setup();

        sync.fetch_all(false).await.unwrap();
        sync.fetch_all(true).await.unwrap();

        assert_eq!(source.calls(&CacheKey::All), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_waiter_and_keeps_stale_data() {
        let (source, sync) = setup();
        let good = sync.fetch_by_key(day(1), false).await.unwrap();

        source.fail(day(1), "gateway timeout");
        tokio::time::advance(Duration::from_secs(11)).await;
        let results = join_all((0..3).map(|_| sync.fetch_by_key(day(1), false))).await;

        for result in results {
            assert_eq!(
                result.unwrap_err(),
                SyncError::Transport("gateway timeout".to_string())
            );
        }
        assert_eq!(source.calls(&day(1)), 2);
        assert_eq!(sync.get_error(&day(1)).as_deref(), Some("gateway timeout"));
        assert!(!sync.is_loading(&day(1)));
        assert!(!sync.has_pending(&day(1)));

        // The previous good data survives in both the store and the view.
        assert_eq!(sync.entry_info(&day(1)).unwrap().len, 1);
        assert!(Arc::ptr_eq(&sync.get_by_key(&day(1)).unwrap(), &good));
        assert_eq!(sync.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fetch_clears_previous_error() {
        let (source, sync) = setup();
        source.fail(day(1), "offline");
        assert!(sync.fetch_by_key(day(1), false).await.is_err());

        source.clear_failure(&day(1));
        sync.fetch_by_key(day(1), false).await.unwrap();
        assert!(sync.get_error(&day(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_while_in_flight() {
        let (_source, sync) = setup();
        let background = sync.clone();
        let task = tokio::spawn(async move { background.fetch_by_key(day(1), false).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(sync.is_loading(&day(1)));
        assert!(sync.has_pending(&day(1)));

        task.await.unwrap().unwrap();
        assert!(!sync.is_loading(&day(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_operations_do_not_wait_on_fetch() {
        let (_source, sync) = setup();
        sync.fetch_all(false).await.unwrap();

        let background = sync.clone();
        let task = tokio::spawn(async move { background.fetch_by_key(day(1), false).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // All of these complete while the day(1) fetch is still pending.
        assert_eq!(sync.apply_patch(&EntityId::Num(2), &patch(json!({"status": "done"}))), 1);
        assert_eq!(sync.remove_entity(&EntityId::Num(2), None), 1);
        sync.invalidate(Some(CacheKey::All));
        assert!(sync.get_all().is_none());
        assert!(sync.has_pending(&day(1)));

        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_keys_are_not_blocked() {
        let (source, sync) = setup();
        source.set(day(2), vec![Entity::new(5, "planned")]);
        sync.fetch_by_key(day(2), false).await.unwrap();

        let background = sync.clone();
        let slow = tokio::spawn(async move { background.fetch_by_key(day(1), false).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cached = sync.fetch_by_key(day(2), false).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert!(sync.has_pending(&day(1)));
        slow.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_patch_updates_both_views_without_refresh() {
        let (_source, sync) = setup();
        sync.fetch_by_key(day(1), false).await.unwrap();
        sync.fetch_all(false).await.unwrap();
        let day_stamp = sync.entry_info(&day(1)).unwrap().fetched_at;
        let all_stamp = sync.entry_info(&CacheKey::All).unwrap().fetched_at;

        tokio::time::advance(Duration::from_secs(3)).await;
        let touched = sync.apply_patch(&EntityId::Num(1), &patch(json!({"status": "done"})));
        assert_eq!(touched, 2);

        let day_view = sync.get_by_key(&day(1)).unwrap();
        let all_view = sync.get_all().unwrap();
        assert_eq!(day_view[0].status.as_deref(), Some("done"));
        assert_eq!(all_view[0].status.as_deref(), Some("done"));
        assert_eq!(all_view[1].status.as_deref(), Some("planned"));
        assert_eq!(sync.entry_info(&day(1)).unwrap().fetched_at, day_stamp);
        assert_eq!(sync.entry_info(&CacheKey::All).unwrap().fetched_at, all_stamp);

        // Still fresh: the patched entry is served without a fetch.
        let served = sync.fetch_by_key(day(1), false).await.unwrap();
        assert_eq!(served[0].status.as_deref(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_patch_unknown_id_is_noop() {
        let (_source, sync) = setup();
        sync.fetch_all(false).await.unwrap();
        let before = sync.get_all().unwrap();

        assert_eq!(sync.apply_patch(&EntityId::Num(404), &patch(json!({"status": "x"}))), 0);
        assert_eq!(sync.remove_entity(&EntityId::Num(404), None), 0);
        assert!(Arc::ptr_eq(&before, &sync.get_all().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_patch_entity_missing_from_date_view() {
        let (_source, sync) = setup();
        sync.fetch_by_key(day(1), false).await.unwrap();
        sync.fetch_all(false).await.unwrap();

        sync.apply_patch(&EntityId::Num(2), &patch(json!({"status": "done"})));

        assert_eq!(sync.get_by_key(&day(1)).unwrap().len(), 1);
        assert_eq!(sync.get_all().unwrap()[1].status.as_deref(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_drops_emptied_view() {
        let (_source, sync) = setup();
        sync.fetch_by_key(day(1), false).await.unwrap();
        sync.fetch_all(false).await.unwrap();
        let stamp = sync.entry_info(&CacheKey::All).unwrap().fetched_at;

        assert_eq!(sync.remove_entity(&EntityId::Num(1), Some(day(1))), 2);

        assert!(sync.get_by_key(&day(1)).is_none());
        assert_eq!(sync.entry_info(&day(1)).unwrap().len, 0);
        let all = sync.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, EntityId::Num(2));
        assert_eq!(sync.entry_info(&CacheKey::All).unwrap().fetched_at, stamp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_then_force_refetches() {
        let (source, sync) = setup();
        sync.fetch_by_key(day(1), false).await.unwrap();

        sync.invalidate(Some(day(1)));
        assert!(sync.get_by_key(&day(1)).is_none());
        assert!(sync.entry_info(&day(1)).is_none());

        sync.fetch_by_key(day(1), true).await.unwrap();
        assert_eq!(source.calls(&day(1)), 2);
        assert!(sync.get_by_key(&day(1)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all_clears_everything() {
        let (_source, sync) = setup();
        sync.fetch_by_key(day(1), false).await.unwrap();
        sync.fetch_all(false).await.unwrap();

        sync.invalidate(None);

        assert!(sync.get_by_key(&day(1)).is_none());
        assert!(sync.get_all().is_none());
        assert_eq!(sync.stats().total_entries, 0);
        assert_eq!(sync.stats().total_entities, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_leaves_in_flight_fetch_to_repopulate() {
        let (_source, sync) = setup();
        let background = sync.clone();
        let task = tokio::spawn(async move { background.fetch_by_key(day(1), false).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        sync.invalidate(Some(day(1)));
        assert!(sync.has_pending(&day(1)));

        task.await.unwrap().unwrap();
        assert!(sync.entry_info(&day(1)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_populates_cache_without_publishing() {
        let (source, sync) = setup();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), sync.fetch_by_key(day(1), false)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(LATENCY * 2).await;
        assert!(!sync.has_pending(&day(1)));
        assert!(sync.entry_info(&day(1)).is_some());
        assert!(sync.get_by_key(&day(1)).is_none());

        // A later caller is served from the store without another fetch.
        sync.fetch_by_key(day(1), false).await.unwrap();
        assert_eq!(source.calls(&day(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_publishes_to_live_subscriber() {
        let (_source, sync) = setup();
        let mut rx = sync.subscribe(day(1));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), sync.fetch_by_key(day(1), false)).await;
        assert!(abandoned.is_err());

        rx.wait_for(|state| state.data.is_some()).await.unwrap();
        assert_eq!(sync.get_by_key(&day(1)).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_sweep_skips_pending_keys() {
        let (source, sync) = setup();
        sync.fetch_by_key(day(1), false).await.unwrap();
        sync.fetch_all(false).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let background = sync.clone();
        let task = tokio::spawn(async move { background.fetch_all(false).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sync.reap_expired(), 1);
        assert!(sync.entry_info(&day(1)).is_none());
        assert!(sync.entry_info(&CacheKey::All).is_some());
        // The published view outlives eviction.
        assert!(sync.get_by_key(&day(1)).is_some());

        task.await.unwrap().unwrap();
        sync.fetch_by_key(day(1), false).await.unwrap();
        assert_eq!(source.calls(&day(1)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_fetch_replaces_pending_registration() {
        let (source, sync) = setup();
        let first = {
            let s = sync.clone();
            tokio::spawn(async move { s.fetch_by_key(day(1), false).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        source.set(day(1), vec![Entity::new(1, "done")]);
        let forced = sync.fetch_by_key(day(1), true).await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(source.calls(&day(1)), 2);
        assert_eq!(forced[0].status.as_deref(), Some("done"));
        assert!(!sync.has_pending(&day(1)));
        assert_eq!(
            sync.get_by_key(&day(1)).unwrap()[0].status.as_deref(),
            Some("done")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_failure_does_not_mark_key() {
        let (source, sync) = setup();
        source.fail(day(1), "offline");
        let first = {
            let s = sync.clone();
            tokio::spawn(async move { s.fetch_by_key(day(1), false).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let forced = {
            let s = sync.clone();
            tokio::spawn(async move { s.fetch_by_key(day(1), true).await })
        };
        // The first fetch fails at 100ms, the forced one answers at 110ms.
        tokio::time::sleep(Duration::from_millis(95)).await;
        source.clear_failure(&day(1));

        assert!(first.await.unwrap().is_err());
        let plans = forced.await.unwrap().unwrap();

        assert_eq!(plans.len(), 1);
        assert!(sync.get_error(&day(1)).is_none());
        assert_eq!(sync.get_by_key(&day(1)).unwrap().len(), 1);
        assert!(!sync.is_loading(&day(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_failure_reported_next_to_older_data() {
        let (source, sync) = setup();
        let first = {
            let s = sync.clone();
            tokio::spawn(async move { s.fetch_by_key(day(1), false).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let forced = {
            let s = sync.clone();
            tokio::spawn(async move { s.fetch_by_key(day(1), true).await })
        };
        tokio::time::sleep(Duration::from_millis(95)).await;
        source.fail(day(1), "offline");

        assert!(first.await.unwrap().is_ok());
        assert!(forced.await.unwrap().is_err());

        assert_eq!(sync.get_error(&day(1)).as_deref(), Some("offline"));
        assert_eq!(sync.get_by_key(&day(1)).unwrap().len(), 1);
        assert!(!sync.is_loading(&day(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_keys_leave_no_state_behind() {
        let (_source, sync) = setup();
        for d in 1..=3 {
            sync.fetch_by_key(day(d), false).await.unwrap();
        }
        assert_eq!(sync.inner.board.len(), 3);

        sync.invalidate(Some(day(1)));
        assert_eq!(sync.inner.board.len(), 2);

        sync.invalidate(None);
        assert!(sync.inner.board.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_visit_day_scenario() {
        let source = MemorySource::new();
        source.set(day(1), vec![Entity::new(1, "in progress")]);
        let sync = PlanSync::new(source.clone(), SyncConfig::default());

        let first = sync.fetch_by_key(day(1), false).await.unwrap();
        assert_eq!(first.as_ref(), &vec![Entity::new(1, "in progress")]);
        let t0 = sync.entry_info(&day(1)).unwrap().fetched_at;

        tokio::time::advance(Duration::from_secs(5)).await;
        let again = sync.fetch_by_key(day(1), false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(source.calls(&day(1)), 1);

        sync.apply_patch(&EntityId::Num(1), &patch(json!({"status": "done"})));
        assert_eq!(sync.get_by_key(&day(1)).unwrap()[0].status.as_deref(), Some("done"));
        assert_eq!(sync.entry_info(&day(1)).unwrap().fetched_at, t0);

        tokio::time::advance(Duration::from_secs(26)).await;
        assert_eq!(sync.reap_expired(), 1);
        assert!(sync.entry_info(&day(1)).is_none());

        sync.fetch_by_key(day(1), false).await.unwrap();
        assert_eq!(source.calls(&day(1)), 2);
    }
}
