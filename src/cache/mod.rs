//! Cache Module
//!
//! Provides namespaced in-memory caching with TTL expiration, priority-aware
//! LRU eviction, persistence and preload/refresh orchestration.

mod entry;
mod eviction;
mod handle;
mod loader;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, DEFAULT_PRIORITY};
pub use eviction::{eviction_key, select_victims};
pub use handle::{CacheValue, ResourceCache, SharedStore};
pub use loader::{loader, LoadFuture, Loader, PreloadReport, PreloadRequest, RefreshReport};
pub use stats::{AccessRecord, CacheStats, CacheStatsReport, OldestEntry, MOST_ACCESSED_LIMIT};
pub use store::{CacheStore, RefreshTarget, SetOptions, SweepOutcome};
