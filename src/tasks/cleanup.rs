//! Cleanup Task
//!
//! Background task that periodically runs the eviction sweep on a store.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedStore;
use crate::tasks::PersistSignal;

/// Spawns a background task that periodically sweeps a cache store.
///
/// The task runs in an infinite loop, sleeping for `interval` between sweeps.
/// Each sweep removes expired entries, then evicts down to `max_size`, and
/// schedules one persistence write if anything was removed.
///
/// # Returns
/// A JoinHandle for the spawned task, which is aborted when the owning cache
/// is destroyed or dropped.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(CacheStore::<String>::new(CacheConfig::data())));
/// let handle = spawn_cleanup_task("data_cache".into(), store.clone(), PersistSignal::disabled(), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<T>(
    namespace: String,
    store: SharedStore<T>,
    persist: PersistSignal,
    interval: Duration,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            namespace = %namespace,
            "Starting cleanup task with interval of {:?}", interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let outcome = {
                let mut guard = store.write().await;
                guard.cleanup()
            };

            if outcome.removed() > 0 {
                info!(
                    namespace = %namespace,
                    "Cleanup: removed {} expired and evicted {} entries",
                    outcome.expired, outcome.evicted
                );
                persist.mark_dirty();
            } else {
                debug!(namespace = %namespace, "Cleanup: nothing to remove");
            }
        }
    })
}
