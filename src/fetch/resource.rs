//! Cached Resource
//!
//! A data binding over one locator: holds `{data, loading, error, cached}`
//! and publishes every change on a watch channel so consumers can re-render.

use std::sync::Arc;

use tokio::sync::watch;

use crate::cache::{CacheValue, ResourceCache};
use crate::fetch::{fetch_with_source, FetchOptions, Fetcher};

/// Observable state of a [`CachedResource`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    /// Last successfully obtained data; kept across later failures
    pub data: Option<T>,
    pub loading: bool,
    /// Message of the most recent failure, cleared when a load starts
    pub error: Option<String>,
    /// Whether `data` came from the cache rather than a fresh retrieval
    pub cached: bool,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            cached: false,
        }
    }
}

// == Cached Resource ==
pub struct CachedResource<T> {
    cache: ResourceCache<T>,
    fetcher: Arc<dyn Fetcher>,
    locator: String,
    options: FetchOptions,
    state: watch::Sender<ResourceState<T>>,
}

impl<T: CacheValue> CachedResource<T> {
    pub fn new(
        cache: ResourceCache<T>,
        fetcher: Arc<dyn Fetcher>,
        locator: impl Into<String>,
        options: FetchOptions,
    ) -> Self {
        let (state, _) = watch::channel(ResourceState::default());
        Self {
            cache,
            fetcher,
            locator: locator.into(),
            options,
            state,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Receives every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    /// Loads through the cache.
    pub async fn load(&self) -> ResourceState<T> {
        let options = self.options.clone();
        self.run(&options).await
    }

    /// Loads bypassing the cache read, still falling back to the cached copy on failure.
    pub async fn refetch(&self) -> ResourceState<T> {
        let options = self.options.clone().bypassing_cache();
        self.run(&options).await
    }

    async fn run(&self, options: &FetchOptions) -> ResourceState<T> {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result =
            fetch_with_source(&self.cache, self.fetcher.as_ref(), &self.locator, options).await;

        self.state.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(fetched) => {
                    state.cached = fetched.source.is_cached();
                    state.data = Some(fetched.data);
                }
                Err(e) => state.error = Some(e.to_string()),
            }
        });

        self.state()
    }
}
