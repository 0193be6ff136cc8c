//! Optimization Manager
//!
//! Process-wide coordinator over the cache namespaces: route prefetching,
//! image source resolution, critical-resource preloading and memory-pressure
//! relief.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{loader, PreloadReport, PreloadRequest, SetOptions, SweepOutcome};
use crate::config::OptimizationSettings;
use crate::context::Caches;
use crate::fetch::{cached_fetch, retrieve, FetchOptions, Fetcher};
use crate::optimization::MemorySampler;

/// Priority given to critical resources so pressure sweeps evict them last.
pub const CRITICAL_PRIORITY: i32 = 10;

/// Result of a pressure check that crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureRelief {
    pub usage_ratio: f64,
    pub outcome: SweepOutcome,
}

// == Optimization Manager ==
pub struct OptimizationManager {
    caches: Caches,
    fetcher: Arc<dyn Fetcher>,
    sampler: Arc<dyn MemorySampler>,
    settings: OptimizationSettings,
    prefetched: Mutex<HashSet<String>>,
}

impl OptimizationManager {
    pub fn new(
        caches: Caches,
        fetcher: Arc<dyn Fetcher>,
        sampler: Arc<dyn MemorySampler>,
        settings: OptimizationSettings,
    ) -> Self {
        Self {
            caches,
            fetcher,
            sampler,
            settings,
            prefetched: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &OptimizationSettings {
        &self.settings
    }

    // == Prefetch ==
    /// Fetches `path` into the data cache in the background.
    ///
    /// Each path is prefetched at most once per manager; repeats return `None`.
    pub fn prefetch_route(&self, path: &str) -> Option<JoinHandle<()>> {
        let first = self
            .prefetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string());
        if !first {
            return None;
        }

        let cache = self.caches.data.clone();
        let fetcher = self.fetcher.clone();
        let path = path.to_string();
        Some(tokio::spawn(async move {
            match cached_fetch(&cache, fetcher.as_ref(), &path, &FetchOptions::default()).await {
                Ok(_) => debug!(path = %path, "Route prefetched"),
                Err(e) => warn!(path = %path, error = %e, "Route prefetch failed"),
            }
        }))
    }

    pub fn is_prefetched(&self, path: &str) -> bool {
        self.prefetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    // == Images ==
    /// Resolves an image source through the image cache.
    ///
    /// Returns `true` when the source was already cached; on a miss the
    /// source is recorded and `false` is returned.
    pub async fn load_image(&self, src: &str) -> bool {
        if self.caches.image.get(src).await.is_some() {
            return true;
        }
        self.caches
            .image
            .set(src, src.to_string(), SetOptions::default())
            .await;
        false
    }

    // == Critical Resources ==
    /// Preloads every configured critical resource into the data cache.
    pub async fn preload_critical(&self) -> PreloadReport {
        let requests: Vec<PreloadRequest<Value>> = self
            .settings
            .critical_resources
            .iter()
            .map(|locator| {
                let fetcher = self.fetcher.clone();
                let target = locator.clone();
                PreloadRequest::new(
                    locator.clone(),
                    loader(move || async move {
                        let data = retrieve::<Value>(fetcher.as_ref(), &target).await?;
                        Ok(data)
                    }),
                )
                .with_priority(CRITICAL_PRIORITY)
            })
            .collect();

        if requests.is_empty() {
            return PreloadReport::default();
        }
        self.caches.data.preload(requests).await
    }

    // == Memory Pressure ==
    /// Samples memory and shrinks every namespace when usage is at or above
    /// the threshold.
    ///
    /// Returns `None` when no sample is available or usage is below it.
    pub async fn check_memory_pressure(&self) -> Option<PressureRelief> {
        let sampler = self.sampler.clone();
        let sample = match tokio::task::spawn_blocking(move || sampler.sample()).await {
            Ok(sample) => sample?,
            Err(e) => {
                warn!(error = %e, "Memory sampling task failed");
                return None;
            }
        };
        let usage_ratio = sample.usage_ratio();
        if usage_ratio < self.settings.pressure_threshold {
            debug!(usage_ratio, "Memory usage below threshold");
            return None;
        }

        let outcome = self
            .caches
            .relieve_pressure(self.settings.pressure_shrink_ratio)
            .await;
        warn!(
            usage_ratio,
            used_bytes = sample.used_bytes,
            limit_bytes = sample.limit_bytes,
            expired = outcome.expired,
            evicted = outcome.evicted,
            "Memory pressure detected, caches shrunk"
        );
        Some(PressureRelief {
            usage_ratio,
            outcome,
        })
    }

    /// Sweeps every namespace now.
    pub async fn cleanup_all(&self) -> SweepOutcome {
        let outcome = self.caches.cleanup_all().await;
        info!(
            expired = outcome.expired,
            evicted = outcome.evicted,
            "Swept all caches"
        );
        outcome
    }
}
