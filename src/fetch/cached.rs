//! Cache-Aware Fetch
//!
//! Read-through, write-back retrieval with stale-on-error fallback: a failed
//! retrieval degrades to the last cached copy when one exists.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::{CacheValue, ResourceCache, SetOptions};
use crate::error::{CacheError, Result};
use crate::fetch::Fetcher;

// == Fetch Options ==
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Cache key, the locator when `None`
    pub cache_key: Option<String>,
    /// Lifetime of the written-back entry, the cache default when `None`
    pub cache_ttl: Option<Duration>,
    /// Skip the initial cache read
    pub bypass_cache: bool,
}

impl FetchOptions {
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// Where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Live cache hit
    Cache,
    /// Fresh retrieval, written back to the cache
    Network,
    /// Cached copy served after the retrieval failed
    Stale,
}

impl FetchSource {
    pub fn is_cached(&self) -> bool {
        !matches!(self, FetchSource::Network)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub source: FetchSource,
}

// == Cached Fetch ==
/// Fetches `locator` through `cache`.
///
/// 1. Unless bypassing, a live cache entry is returned as-is.
/// 2. Otherwise the resource is retrieved; non-success statuses fail with
///    `CacheError::Network`, unparseable bodies with `CacheError::Parse`.
/// 3. Parsed data is written back under the cache key.
/// 4. On any failure in 2-3 the cached copy is served if present, else the
///    original error is returned.
pub async fn cached_fetch<T: CacheValue>(
    cache: &ResourceCache<T>,
    fetcher: &dyn Fetcher,
    locator: &str,
    options: &FetchOptions,
) -> Result<T> {
    fetch_with_source(cache, fetcher, locator, options)
        .await
        .map(|fetched| fetched.data)
}

/// Same as [`cached_fetch`], also reporting where the data came from.
pub async fn fetch_with_source<T: CacheValue>(
    cache: &ResourceCache<T>,
    fetcher: &dyn Fetcher,
    locator: &str,
    options: &FetchOptions,
) -> Result<Fetched<T>> {
    let key = options.cache_key.as_deref().unwrap_or(locator);

    if !options.bypass_cache {
        if let Some(data) = cache.get(key).await {
            debug!(namespace = cache.namespace(), key, "Cache hit");
            return Ok(Fetched {
                data,
                source: FetchSource::Cache,
            });
        }
    }

    match retrieve::<T>(fetcher, locator).await {
        Ok(data) => {
            let options = SetOptions {
                ttl: options.cache_ttl,
                priority: None,
            };
            cache.set(key, data.clone(), options).await;
            Ok(Fetched {
                data,
                source: FetchSource::Network,
            })
        }
        Err(e) => match cache.get(key).await {
            Some(data) => {
                warn!(
                    namespace = cache.namespace(),
                    key,
                    error = %e,
                    "Fetch failed, serving cached copy"
                );
                Ok(Fetched {
                    data,
                    source: FetchSource::Stale,
                })
            }
            None => Err(e),
        },
    }
}

/// Retrieves and parses `locator` without touching any cache.
pub(crate) async fn retrieve<T: DeserializeOwned>(fetcher: &dyn Fetcher, locator: &str) -> Result<T> {
    let response = fetcher.fetch(locator).await?;
    if !response.is_success() {
        return Err(CacheError::status(
            response.status,
            format!("GET {} returned {}", locator, response.status),
        ));
    }
    response.json()
}
