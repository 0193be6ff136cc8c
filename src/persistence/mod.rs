//! Persistence Module
//!
//! Moves store snapshots to and from a durable storage slot.
//!
//! Failures here are never fatal to the cache: a failed load starts the store
//! empty and a failed background write leaves the in-memory state untouched.

mod backend;
mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, CacheEntry, SharedStore};
use crate::error::Result;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use snapshot::{decode, encode, SNAPSHOT_VERSION};

/// Reads the entries persisted under `slot`.
///
/// Missing, unreadable or corrupt snapshots are logged and yield an empty map.
pub async fn load_entries<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    slot: &str,
) -> HashMap<String, CacheEntry<T>> {
    let blob = match backend.read(slot).await {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            debug!(slot, backend = backend.name(), "No persisted snapshot found");
            return HashMap::new();
        }
        Err(e) => {
            warn!(slot, backend = backend.name(), error = %e, "Failed to read persisted snapshot");
            return HashMap::new();
        }
    };

    match decode(&blob) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(slot, error = %e, "Discarding unusable persisted snapshot");
            HashMap::new()
        }
    }
}

// == Snapshot Writer ==
/// Writes snapshots of one store into one slot, one write at a time.
///
/// Encoding happens under the writer's lock, so a snapshot taken later is
/// never overwritten by one taken earlier. Once closed the writer ignores
/// further writes.
pub struct SnapshotWriter {
    backend: Arc<dyn StorageBackend>,
    slot: String,
    /// Held across encode and write; `true` once closed
    closed: Mutex<bool>,
}

impl SnapshotWriter {
    pub fn new(backend: Arc<dyn StorageBackend>, slot: impl Into<String>) -> Self {
        Self {
            backend,
            slot: slot.into(),
            closed: Mutex::new(false),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Serializes the current store and writes it to the slot.
    ///
    /// The store lock is held only while encoding.
    pub async fn write<T: Serialize>(&self, store: &SharedStore<T>) -> Result<()> {
        let closed = self.closed.lock().await;
        if *closed {
            return Ok(());
        }
        self.write_locked(store).await
    }

    /// Writes one final snapshot and closes the writer.
    pub async fn close<T: Serialize>(&self, store: &SharedStore<T>) -> Result<()> {
        let mut closed = self.closed.lock().await;
        if *closed {
            return Ok(());
        }
        *closed = true;
        self.write_locked(store).await
    }

    async fn write_locked<T: Serialize>(&self, store: &SharedStore<T>) -> Result<()> {
        let (blob, count) = {
            let guard = store.read().await;
            (encode(guard.entries(), current_timestamp_ms())?, guard.len())
        };

        self.backend.write(&self.slot, blob).await?;
        debug!(slot = %self.slot, entries = count, "Persisted cache snapshot");
        Ok(())
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("slot", &self.slot)
            .field("backend", &self.backend.name())
            .finish()
    }
}
