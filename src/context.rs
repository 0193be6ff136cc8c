//! Application Context
//!
//! The three cache namespaces plus the optimization manager, built once at
//! startup and passed to whatever needs them.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{CacheValue, ResourceCache, SweepOutcome};
use crate::config::Config;
use crate::fetch::{CachedResource, FetchOptions, Fetcher};
use crate::optimization::{MemorySampler, OptimizationManager};
use crate::persistence::StorageBackend;
use crate::tasks::spawn_memory_pressure_task;

// == Caches ==
/// The coexisting cache namespaces.
#[derive(Debug, Clone)]
pub struct Caches {
    /// Small, short-lived cache for rendered fragments
    pub component: ResourceCache<Value>,
    /// API payloads
    pub data: ResourceCache<Value>,
    /// Resolved image sources
    pub image: ResourceCache<String>,
}

impl Caches {
    /// Opens every namespace against the same backend.
    pub async fn open(config: &Config, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            component: ResourceCache::open(config.component.clone(), backend.clone()).await,
            data: ResourceCache::open(config.data.clone(), backend.clone()).await,
            image: ResourceCache::open(config.image.clone(), backend).await,
        }
    }

    /// Sweeps every namespace now.
    pub async fn cleanup_all(&self) -> SweepOutcome {
        let mut outcome = self.component.cleanup().await;
        outcome += self.data.cleanup().await;
        outcome += self.image.cleanup().await;
        outcome
    }

    /// Shrinks every namespace to `ratio` of its capacity.
    pub async fn relieve_pressure(&self, ratio: f64) -> SweepOutcome {
        let mut outcome = self.component.relieve_pressure(ratio).await;
        outcome += self.data.relieve_pressure(ratio).await;
        outcome += self.image.relieve_pressure(ratio).await;
        outcome
    }

    /// Stops every namespace's tasks and flushes its snapshot.
    pub async fn destroy(&self) {
        self.component.destroy().await;
        self.data.destroy().await;
        self.image.destroy().await;
    }
}

// == App Context ==
pub struct AppContext {
    pub caches: Caches,
    pub fetcher: Arc<dyn Fetcher>,
    pub optimizer: Arc<OptimizationManager>,
    pressure_task: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Opens the caches, preloads critical resources and starts the
    /// memory-pressure task.
    pub async fn start(
        config: &Config,
        backend: Arc<dyn StorageBackend>,
        fetcher: Arc<dyn Fetcher>,
        sampler: Arc<dyn MemorySampler>,
    ) -> Self {
        let caches = Caches::open(config, backend).await;
        let optimizer = Arc::new(OptimizationManager::new(
            caches.clone(),
            fetcher.clone(),
            sampler,
            config.optimization.clone(),
        ));

        let report = optimizer.preload_critical().await;
        if !report.loaded.is_empty() || !report.failed.is_empty() {
            info!(
                loaded = report.loaded.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "Critical resources preloaded"
            );
        }

        let pressure_task = spawn_memory_pressure_task(optimizer.clone());

        Self {
            caches,
            fetcher,
            optimizer,
            pressure_task: Some(pressure_task),
        }
    }

    /// Binds `locator` to `cache` through this context's fetcher.
    pub fn cached_resource<T: CacheValue>(
        &self,
        cache: &ResourceCache<T>,
        locator: impl Into<String>,
        options: FetchOptions,
    ) -> CachedResource<T> {
        CachedResource::new(cache.clone(), self.fetcher.clone(), locator, options)
    }

    /// Stops the pressure task and destroys every cache, flushing snapshots.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.pressure_task.take() {
            task.abort();
        }
        self.caches.destroy().await;
        info!("Application context shut down");
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Some(task) = self.pressure_task.take() {
            task.abort();
        }
    }
}
