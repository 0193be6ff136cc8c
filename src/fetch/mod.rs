//! Fetch Module
//!
//! Network retrieval plus the cache-aware wrappers consumers call instead of
//! hitting the network directly.

mod cached;
mod fetcher;
mod resource;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use cached::retrieve;
pub use cached::{cached_fetch, fetch_with_source, FetchOptions, FetchSource, Fetched};
pub use fetcher::{FetchResponse, Fetcher, HttpFetcher};
pub use resource::{CachedResource, ResourceState};
