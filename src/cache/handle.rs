//! Resource Cache Handle
//!
//! Shared, cloneable handle over a [`CacheStore`] that owns the store's
//! background tasks and persistence wiring, and runs preload and refresh
//! loaders concurrently.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::entry::{current_timestamp_ms, DEFAULT_PRIORITY};
use crate::cache::{
    CacheStatsReport, CacheStore, Loader, PreloadReport, PreloadRequest, RefreshReport,
    SetOptions, SweepOutcome,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::persistence::{load_entries, SnapshotWriter, StorageBackend};
use crate::tasks::{spawn_cleanup_task, spawn_persist_task, PersistSignal};

/// A store shared between a handle and its background tasks.
pub type SharedStore<T> = Arc<RwLock<CacheStore<T>>>;

/// Bounds every cached payload type satisfies.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

// == Resource Cache ==
/// A namespaced TTL/LRU cache.
///
/// Cloning is cheap and every clone addresses the same store. The cleanup
/// and persistence tasks stop on [`ResourceCache::destroy`] or once the last
/// clone is dropped. A destroyed cache never writes to its slot again.
pub struct ResourceCache<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    namespace: String,
    store: SharedStore<T>,
    writer: Option<Arc<SnapshotWriter>>,
    persist: PersistSignal,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl<T> Inner<T> {
    fn abort_tasks(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let count = tasks.len();
        for task in tasks {
            task.abort();
        }
        count
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("namespace", &self.inner.namespace)
            .field("persisted", &self.inner.writer.is_some())
            .finish()
    }
}

impl<T: CacheValue> ResourceCache<T> {
    // == Constructors ==
    /// Opens a cache namespace, restoring non-expired entries from `backend`
    /// when `config.persist_to_storage` is set.
    pub async fn open(config: CacheConfig, backend: Arc<dyn StorageBackend>) -> Self {
        if !config.persist_to_storage {
            return Self::ephemeral(config);
        }

        let persisted = load_entries::<T>(backend.as_ref(), &config.storage_key).await;
        let found = persisted.len();
        let store = CacheStore::restore(config.clone(), persisted, current_timestamp_ms());
        info!(
            namespace = %config.storage_key,
            restored = store.len(),
            discarded = found - store.len(),
            "Cache namespace opened"
        );

        Self::start(config, store, Some(backend))
    }

    /// Creates a cache that never touches durable storage.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn ephemeral(config: CacheConfig) -> Self {
        let store = CacheStore::new(config.clone());
        Self::start(config, store, None)
    }

    fn start(
        config: CacheConfig,
        store: CacheStore<T>,
        backend: Option<Arc<dyn StorageBackend>>,
    ) -> Self {
        let namespace = config.storage_key.clone();
        let store: SharedStore<T> = Arc::new(RwLock::new(store));
        let writer = backend.map(|backend| Arc::new(SnapshotWriter::new(backend, namespace.clone())));
        let persist = if writer.is_some() {
            PersistSignal::new()
        } else {
            PersistSignal::disabled()
        };

        let mut tasks = vec![spawn_cleanup_task(
            namespace.clone(),
            store.clone(),
            persist.clone(),
            config.cleanup_interval,
        )];
        if let Some(writer) = &writer {
            tasks.extend(spawn_persist_task(
                store.clone(),
                writer.clone(),
                &persist,
                config.persist_debounce,
            ));
        }

        Self {
            inner: Arc::new(Inner {
                namespace,
                store,
                writer,
                persist,
                tasks: Mutex::new(tasks),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// The namespace's storage key.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    // == Basic Operations ==
    /// Inserts or overwrites an entry and schedules a persistence write.
    pub async fn set(&self, key: impl Into<String>, data: T, options: SetOptions) {
        self.inner.store.write().await.set(key, data, options);
        self.inner.persist.mark_dirty();
    }

    /// Returns the payload for a live entry, `None` if absent or expired.
    pub async fn get(&self, key: &str) -> Option<T> {
        self.inner.store.write().await.get(key)
    }

    /// Peeks for a live entry without updating access statistics.
    pub async fn has(&self, key: &str) -> bool {
        self.inner.store.write().await.has(key)
    }

    /// Removes an entry, returning whether a live one was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let removed = self.inner.store.write().await.delete(key);
        if removed {
            self.inner.persist.mark_dirty();
        }
        removed
    }

    /// Removes every entry and persists the empty state.
    pub async fn clear(&self) {
        self.inner.store.write().await.clear();
        self.inner.persist.mark_dirty();
    }

    pub async fn stats(&self) -> CacheStatsReport {
        self.inner.store.read().await.report()
    }

    /// Number of physically stored entries.
    pub async fn len(&self) -> usize {
        self.inner.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.store.read().await.is_empty()
    }

    // == Invalidation ==
    /// Deletes every key matching `pattern`, returning the count removed.
    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let removed = self.inner.store.write().await.invalidate_pattern(pattern);
        if removed > 0 {
            debug!(namespace = %self.inner.namespace, pattern = %pattern, removed, "Invalidated keys");
            self.inner.persist.mark_dirty();
        }
        removed
    }

    /// Compiles `pattern` and invalidates matching keys.
    pub async fn invalidate_matching(&self, pattern: &str) -> Result<usize> {
        let pattern = Regex::new(pattern)?;
        Ok(self.invalidate_pattern(&pattern).await)
    }

    // == Sweeps ==
    /// Runs the eviction sweep now, outside the periodic schedule.
    pub async fn cleanup(&self) -> SweepOutcome {
        let outcome = self.inner.store.write().await.cleanup();
        if outcome.removed() > 0 {
            self.inner.persist.mark_dirty();
        }
        outcome
    }

    /// Sweeps with the capacity temporarily lowered to `max_size * ratio`.
    ///
    /// `ratio` is clamped to `0.0..=1.0`; NaN leaves the capacity unchanged.
    pub async fn relieve_pressure(&self, ratio: f64) -> SweepOutcome {
        let ratio = if ratio.is_nan() { 1.0 } else { ratio.clamp(0.0, 1.0) };
        let outcome = {
            let mut guard = self.inner.store.write().await;
            let capacity = (guard.config().max_size as f64 * ratio).floor() as usize;
            guard.sweep_at(current_timestamp_ms(), capacity)
        };
        if outcome.removed() > 0 {
            self.inner.persist.mark_dirty();
        }
        outcome
    }

    // == Preload ==
    /// Warms the cache.
    ///
    /// Requests run highest priority first; keys already present are skipped
    /// without invoking their loader. Remaining loaders run concurrently and
    /// this returns once every one has settled. Loader failures are logged
    /// and leave that key untouched.
    pub async fn preload(&self, mut requests: Vec<PreloadRequest<T>>) -> PreloadReport {
        requests.sort_by_key(|r| Reverse(r.priority.unwrap_or(DEFAULT_PRIORITY)));

        let mut report = PreloadReport::default();
        let mut pending = Vec::with_capacity(requests.len());
        {
            let mut guard = self.inner.store.write().await;
            for request in requests {
                if guard.has(&request.key) {
                    report.skipped.push(request.key);
                } else {
                    pending.push(request);
                }
            }
        }

        let results = join_all(pending.into_iter().map(|request| {
            let store = self.inner.store.clone();
            async move {
                let PreloadRequest {
                    key,
                    loader,
                    priority,
                    ttl,
                } = request;
                match loader().await {
                    Ok(data) => {
                        store
                            .write()
                            .await
                            .set(key.clone(), data, SetOptions { ttl, priority });
                        Ok(key)
                    }
                    Err(e) => Err((key, e)),
                }
            }
        }))
        .await;

        for result in results {
            match result {
                Ok(key) => report.loaded.push(key),
                Err((key, e)) => {
                    self.log_loader_failure("Preload", &key, &e);
                    report.failed.push(key);
                }
            }
        }

        if !report.loaded.is_empty() {
            self.inner.persist.mark_dirty();
        }
        debug!(
            namespace = %self.inner.namespace,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Preload finished"
        );
        report
    }

    // == Refresh ==
    /// Replaces entries with at most a quarter of their TTL left.
    ///
    /// Only keys with a refresher registered under the exact key are touched.
    /// A successful refresh keeps the entry's priority and TTL span; a failed
    /// one is logged and leaves the old entry in place.
    pub async fn refresh_expired(&self, mut refreshers: HashMap<String, Loader<T>>) -> RefreshReport {
        let mut targets = self
            .inner
            .store
            .read()
            .await
            .near_expiry_at(current_timestamp_ms());
        targets.sort_by(|a, b| a.key.cmp(&b.key));

        let jobs: Vec<_> = targets
            .into_iter()
            .filter_map(|target| refreshers.remove(&target.key).map(|refresher| (target, refresher)))
            .collect();

        let results = join_all(jobs.into_iter().map(|(target, refresher)| {
            let store = self.inner.store.clone();
            async move {
                match refresher().await {
                    Ok(data) => {
                        let options = SetOptions::ttl(target.ttl).with_priority(target.priority);
                        store.write().await.set(target.key.clone(), data, options);
                        Ok(target.key)
                    }
                    Err(e) => Err((target.key, e)),
                }
            }
        }))
        .await;

        let mut report = RefreshReport::default();
        for result in results {
            match result {
                Ok(key) => report.refreshed.push(key),
                Err((key, e)) => {
                    self.log_loader_failure("Refresh", &key, &e);
                    report.failed.push(key);
                }
            }
        }

        if !report.refreshed.is_empty() {
            self.inner.persist.mark_dirty();
        }
        report
    }

    fn log_loader_failure(&self, stage: &str, key: &str, error: &anyhow::Error) {
        let err = CacheError::Loader {
            key: key.to_string(),
            message: format!("{:#}", error),
        };
        warn!(namespace = %self.inner.namespace, error = %err, "{} loader failed", stage);
    }

    // == Lifecycle ==
    /// Writes the current snapshot immediately.
    ///
    /// Ordered with the background writer, so once this returns the slot
    /// holds this snapshot or a newer one. A no-op for ephemeral and
    /// destroyed caches.
    pub async fn flush(&self) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        match &self.inner.writer {
            Some(writer) => writer.write(&self.inner.store).await,
            None => Ok(()),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Stops background tasks, flushes the snapshot and drops in-memory entries.
    ///
    /// The persisted slot is kept, so a cache reopened with the same storage
    /// key restores what was flushed here. Only the first call has any effect.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            debug!(namespace = %self.inner.namespace, "Cache already destroyed");
            return;
        }
        let stopped = self.inner.abort_tasks();

        let closed = match &self.inner.writer {
            Some(writer) => writer.close(&self.inner.store).await,
            None => Ok(()),
        };
        if let Err(e) = closed {
            warn!(namespace = %self.inner.namespace, error = %e, "Failed to flush cache on destroy");
        }

        self.inner.store.write().await.clear();
        info!(namespace = %self.inner.namespace, stopped_tasks = stopped, "Cache destroyed");
    }
}
