//! Storage Backends
//!
//! Durable slots holding one serialized blob per storage key.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{CacheError, Result};

/// A keyed slot store for serialized cache snapshots.
///
/// Implementations only move opaque strings; encoding and expiry filtering
/// happen in the snapshot layer.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// A name for tracing.
    fn name(&self) -> &'static str;

    /// Returns the blob stored under `slot`, or `None` if the slot is empty.
    async fn read(&self, slot: &str) -> Result<Option<String>>;

    /// Replaces the blob stored under `slot`.
    async fn write(&self, slot: &str, blob: String) -> Result<()>;

    /// Empties `slot`. Removing an empty slot succeeds.
    async fn remove(&self, slot: &str) -> Result<()>;
}

// == Memory Storage ==
/// In-process slot store.
///
/// Clones share the same slots, so a store reopened against a clone sees
/// what the previous one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| CacheError::Persistence("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots()?.get(slot).cloned())
    }

    async fn write(&self, slot: &str, blob: String) -> Result<()> {
        self.slots()?.insert(slot.to_string(), blob);
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<()> {
        self.slots()?.remove(slot);
        Ok(())
    }
}

// == File Storage ==
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One JSON file per slot inside a directory.
///
/// Writes go to a uniquely named temporary file first and are renamed into
/// place, so a crash mid-write leaves the previous snapshot intact and
/// concurrent writers never share a temporary file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `slot`. Characters outside `[A-Za-z0-9_.-]` become `_`.
    pub fn path_for(&self, slot: &str) -> PathBuf {
        let file_name: String = slot
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn read(&self, slot: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(slot)).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, slot: &str, blob: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(slot);
        let tmp = path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, blob).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(slot)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
