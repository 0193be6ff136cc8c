//! Eviction Module
//!
//! Chooses which entries leave the cache when it grows past capacity.
//!
//! Entries are ordered ascending by `(priority, last_accessed, access_seq)`:
//! - Front = lowest priority, least recently used
//! - Back = highest priority, most recently used

use std::collections::HashMap;

use crate::cache::CacheEntry;

// == Select Victims ==
/// Returns the keys to remove so that at most `capacity` entries remain.
///
/// Keys come back in eviction order. Returns an empty list when the map is
/// already within capacity.
pub fn select_victims<T>(entries: &HashMap<String, CacheEntry<T>>, capacity: usize) -> Vec<String> {
    if entries.len() <= capacity {
        return Vec::new();
    }

    let surplus = entries.len() - capacity;
    let mut order: Vec<(&String, &CacheEntry<T>)> = entries.iter().collect();
    order.sort_by_key(|(_, entry)| eviction_key(entry));

    order
        .into_iter()
        .take(surplus)
        .map(|(key, _)| key.clone())
        .collect()
}

// == Eviction Key ==
/// Sort key for eviction; smaller keys are evicted first.
pub fn eviction_key<T>(entry: &CacheEntry<T>) -> (i32, u64, u64) {
    (entry.priority, entry.last_accessed, entry.access_seq)
}
