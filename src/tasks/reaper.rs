//! Periodic Reaper
//!
//! Background task that evicts cache entries older than the configured
//! maximum age.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::sync::PlanSync;

/// Spawns a background task that periodically evicts aged-out entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// sweeps. Entries whose key has a fetch in flight are skipped; published
/// views are never touched.
///
/// # Arguments
/// * `sync` - handle to the shared plan cache
/// * `interval` - time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let sync = PlanSync::new(source, SyncConfig::default());
/// let reaper = spawn_reaper(sync.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// reaper.abort();
/// ```
pub fn spawn_reaper(sync: PlanSync, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache reaper with interval of {} seconds (max age {} seconds)",
            interval.as_secs(),
            sync.config().max_age.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = sync.reap_expired();

            if removed > 0 {
                info!("Reaper: evicted {} expired entries", removed);
            } else {
                debug!("Reaper: no expired entries found");
            }
        }
    })
}
