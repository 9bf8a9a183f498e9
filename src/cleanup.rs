//! Scheduled cleanup of expired refresh sessions.

use crate::session::SessionStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

/// Interval between eviction runs.
const EVICTION_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Evict sessions whose refresh token has expired.
pub fn run_eviction(store: &SessionStore) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let evicted = store.evict_expired(now);
    if evicted > 0 {
        info!(evicted, "evicted expired refresh sessions");
    }
}

/// Spawn a background task that runs eviction periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_eviction_scheduler(store: Arc<SessionStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);

        loop {
            interval.tick().await;
            run_eviction(&store);
        }
    })
}
