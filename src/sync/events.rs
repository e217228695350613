//! Refresh on "plan created" notifications.
//!
//! The creation flow lives elsewhere; it only sends a `PlanCreated` message.
//! The listener turns each message into an invalidate-and-refetch of the
//! affected views.

use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::PlanSync;
use crate::cache::CacheKey;

/// A plan was created, optionally for a known day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PlanCreated {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl PlanCreated {
    /// Day view first, then the full listing.
    pub fn keys(&self) -> Vec<CacheKey> {
        match self.date {
            Some(date) => vec![CacheKey::Date(date), CacheKey::All],
            None => vec![CacheKey::All],
        }
    }
}

/// Spawns the task that refreshes views as `PlanCreated` messages arrive.
///
/// The day view is always refetched; `all` only when some consumer already
/// tracks it. Failures are logged and the listener keeps running. The task
/// ends when every sender is dropped, or when aborted.
pub fn spawn_refresh_listener(
    sync: PlanSync,
    mut events: mpsc::Receiver<PlanCreated>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting plan-created refresh listener");

        while let Some(event) = events.recv().await {
            for key in event.keys() {
                if key == CacheKey::All && !sync.is_tracked(&key) {
                    continue;
                }
                match sync.refresh(key).await {
                    Ok(plans) => debug!("{}: refreshed after create ({} plans)", key, plans.len()),
                    Err(e) => warn!("{}: refresh after create failed: {}", key, e),
                }
            }
        }

        debug!("Refresh listener stopped: all senders dropped");
    })
}
