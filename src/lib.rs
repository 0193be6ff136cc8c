//! Resource Cache - namespaced client-side caching for fetched resources
//!
//! Provides TTL expiration, priority-aware LRU eviction, durable snapshots,
//! stale-on-error fetching and preload/refresh orchestration.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod optimization;
pub mod persistence;
pub mod tasks;

pub use cache::{CacheStatsReport, PreloadRequest, ResourceCache, SetOptions};
pub use config::{CacheConfig, Config};
pub use context::{AppContext, Caches};
pub use error::{CacheError, Result};
pub use fetch::{cached_fetch, CachedResource, FetchOptions, Fetcher, HttpFetcher};
pub use optimization::{OptimizationManager, ProcessMemorySampler};
pub use persistence::{FileStorage, MemoryStorage, StorageBackend};
