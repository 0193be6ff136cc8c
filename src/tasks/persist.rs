//! Persistence Writer Task
//!
//! Write-behind persistence: mutations mark the store dirty and a single
//! background task writes one snapshot per burst of mutations.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::SharedStore;
use crate::persistence::SnapshotWriter;

// == Persist Signal ==
/// Dirty flag shared between a cache handle, its cleanup task and its writer.
///
/// A disabled signal ignores every mark, for caches that do not persist.
#[derive(Debug, Clone, Default)]
pub struct PersistSignal {
    notify: Option<Arc<Notify>>,
}

impl PersistSignal {
    pub fn new() -> Self {
        Self {
            notify: Some(Arc::new(Notify::new())),
        }
    }

    pub fn disabled() -> Self {
        Self { notify: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.notify.is_some()
    }

    /// Schedules a snapshot write. Marks made while a write is pending coalesce.
    pub fn mark_dirty(&self) {
        if let Some(notify) = &self.notify {
            notify.notify_one();
        }
    }
}

/// Spawns the writer task for `store`.
///
/// Returns `None` when `signal` is disabled. Otherwise the task waits for a
/// dirty mark, sleeps `debounce` so further mutations fold into the same
/// write, then writes the snapshot. Write failures are logged and retried on
/// the next mark.
pub fn spawn_persist_task<T>(
    store: SharedStore<T>,
    writer: Arc<SnapshotWriter>,
    signal: &PersistSignal,
    debounce: Duration,
) -> Option<JoinHandle<()>>
where
    T: Serialize + Send + Sync + 'static,
{
    let notify = signal.notify.clone()?;

    Some(tokio::spawn(async move {
        info!(
            slot = %writer.slot(),
            backend = writer.backend_name(),
            "Starting persistence writer with debounce of {:?}", debounce
        );

        loop {
            notify.notified().await;

            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
            }

            if let Err(e) = writer.write(&store).await {
                warn!(slot = %writer.slot(), error = %e, "Failed to persist cache snapshot");
            }
        }
    }))
}
