//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with TTL expiration and
//! priority-aware LRU eviction.
//!
//! Every time-dependent operation has an `_at` form taking the current Unix
//! millisecond timestamp; the plain forms read the wall clock.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;

use crate::cache::entry::{current_timestamp_ms, DEFAULT_PRIORITY};
use crate::cache::eviction::select_victims;
use crate::cache::{CacheEntry, CacheStats, CacheStatsReport};
use crate::config::CacheConfig;

// == Set Options ==
/// Per-entry overrides for `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime of the entry, `CacheConfig::default_ttl` when `None`
    pub ttl: Option<Duration>,
    /// Eviction priority, 1 when `None`
    pub priority: Option<i32>,
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            priority: None,
        }
    }

    pub fn priority(priority: i32) -> Self {
        Self {
            ttl: None,
            priority: Some(priority),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

// == Sweep Outcome ==
/// Entries removed by one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Removed because their TTL elapsed
    pub expired: usize,
    /// Removed to bring the store within capacity
    pub evicted: usize,
}

impl SweepOutcome {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

impl std::ops::AddAssign for SweepOutcome {
    fn add_assign(&mut self, other: Self) {
        self.expired += other.expired;
        self.evicted += other.evicted;
    }
}

// == Refresh Target ==
/// An entry close enough to expiry to be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTarget {
    pub key: String,
    pub priority: i32,
    pub ttl: Duration,
}

// == Cache Store ==
/// Main cache storage with TTL expiry and `(priority, last_accessed)` eviction.
///
/// `set` never evicts; the store may exceed `max_size` until the next sweep.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// Performance statistics
    stats: CacheStats,
    /// Namespace policy
    config: CacheConfig,
    /// Next access sequence stamp
    next_seq: u64,
}

impl<T> CacheStore<T> {
    // == Constructor ==
    /// Creates an empty store for the given namespace policy.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            config,
            next_seq: 0,
        }
    }

    /// Creates a store from previously persisted entries, dropping those expired at `now`.
    pub fn restore(config: CacheConfig, entries: HashMap<String, CacheEntry<T>>, now: u64) -> Self {
        let entries: HashMap<String, CacheEntry<T>> = entries
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired_at(now) && entry.expiry > entry.timestamp)
            .collect();
        let next_seq = entries
            .values()
            .map(|entry| entry.access_seq + 1)
            .max()
            .unwrap_or(0);

        Self {
            entries,
            stats: CacheStats::new(),
            config,
            next_seq,
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // == Set ==
    /// Inserts or overwrites an entry.
    pub fn set(&mut self, key: impl Into<String>, data: T, options: SetOptions) {
        self.set_at(key, data, options, current_timestamp_ms());
    }

    pub fn set_at(&mut self, key: impl Into<String>, data: T, options: SetOptions, now: u64) {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        let priority = options.priority.unwrap_or(DEFAULT_PRIORITY);
        let seq = self.next_seq();

        self.entries
            .insert(key.into(), CacheEntry::new(data, ttl, priority, now, seq));
    }

    // == Has ==
    /// Checks for a live entry without touching its access statistics.
    ///
    /// An expired entry is removed as a side effect.
    pub fn has(&mut self, key: &str) -> bool {
        self.has_at(key, current_timestamp_ms())
    }

    pub fn has_at(&mut self, key: &str, now: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.remove_expired(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Delete ==
    /// Removes an entry.
    ///
    /// Returns true only if a live entry was removed; an expired entry is
    /// purged but reported as absent.
    pub fn delete(&mut self, key: &str) -> bool {
        self.delete_at(key, current_timestamp_ms())
    }

    pub fn delete_at(&mut self, key: &str, now: u64) -> bool {
        match self.entries.remove(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.stats.record_expirations(1);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Invalidate Pattern ==
    /// Removes every key matching `pattern` and returns how many were removed.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.is_match(key));
        before - self.entries.len()
    }

    // == Cleanup ==
    /// Runs the eviction algorithm against `max_size`.
    pub fn cleanup(&mut self) -> SweepOutcome {
        self.cleanup_at(current_timestamp_ms())
    }

    pub fn cleanup_at(&mut self, now: u64) -> SweepOutcome {
        let capacity = self.config.max_size;
        self.sweep_at(now, capacity)
    }

    /// Removes expired entries, then evicts down to `capacity`.
    pub fn sweep_at(&mut self, now: u64, capacity: usize) -> SweepOutcome {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let expired = before - self.entries.len();

        let victims = select_victims(&self.entries, capacity);
        for key in &victims {
            self.entries.remove(key);
        }

        self.stats.record_expirations(expired);
        self.stats.record_evictions(victims.len());

        SweepOutcome {
            expired,
            evicted: victims.len(),
        }
    }

    // == Refresh Targets ==
    /// Entries with at most a quarter of their original TTL left.
    pub fn near_expiry_at(&self, now: u64) -> Vec<RefreshTarget> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_near_expiry(now))
            .map(|(key, entry)| RefreshTarget {
                key: key.clone(),
                priority: entry.priority,
                ttl: entry.original_ttl(),
            })
            .collect()
    }

    // == Stats ==
    /// Returns the aggregate report.
    pub fn report(&self) -> CacheStatsReport {
        self.report_at(current_timestamp_ms())
    }

    pub fn report_at(&self, now: u64) -> CacheStatsReport {
        CacheStatsReport::build(&self.entries, &self.stats, self.config.max_size, now)
    }

    /// Raw counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Read-only view of the stored entries.
    pub fn entries(&self) -> &HashMap<String, CacheEntry<T>> {
        &self.entries
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Length ==
    /// Returns the number of physically stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_expired(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.stats.record_expirations(1);
        }
    }
}

impl<T: Clone> CacheStore<T> {
    // == Get ==
    /// Retrieves a clone of the payload.
    ///
    /// Expired entries are removed and counted as misses. A hit bumps the
    /// entry's access count and recency.
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.get_at(key, current_timestamp_ms())
    }

    pub fn get_at(&mut self, key: &str, now: u64) -> Option<T> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_expired(key);
            self.stats.record_miss();
            return None;
        }

        let seq = self.next_seq();
        let entry = self.entries.get_mut(key)?;
        entry.record_access(now, seq);
        self.stats.record_hit();
        Some(entry.data.clone())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_size: usize) -> CacheConfig {
        CacheConfig::new("test", max_size, Duration::from_secs(300)).with_persistence(false)
    }

    #[test]
    fn test_store_new() {
        let store: CacheStore<String> = CacheStore::new(config(100));
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(config(100));

        store.set("key1", "value1".to_string(), SetOptions::default());
        let value = store.get("key1");

        assert_eq!(value, Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_defaults_ttl_and_priority() {
        let mut store = CacheStore::new(config(100));
        store.set_at("k", 1u8, SetOptions::default(), 1_000);

        let entry = &store.entries()["k"];
        assert_eq!(entry.priority, DEFAULT_PRIORITY);
        assert_eq!(entry.expiry, 1_000 + 300_000);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store: CacheStore<String> = CacheStore::new(config(100));
        assert_eq!(store.get("nonexistent"), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_get_expired_removes_entry() {
        let mut store = CacheStore::new(config(100));
        store.set_at("x", 1u8, SetOptions::ttl(Duration::from_millis(100)), 1_000);

        assert_eq!(store.get_at("x", 1_150), None);
        assert!(store.is_empty(), "Expired entry should be purged on read");
        assert_eq!(store.stats().misses, 1);
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_get_bumps_access_bookkeeping() {
        let mut store = CacheStore::new(config(100));
        store.set_at("k", 1u8, SetOptions::default(), 1_000);

        store.get_at("k", 1_500);
        store.get_at("k", 1_700);

        let entry = &store.entries()["k"];
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, 1_700);
        assert_eq!(store.stats().hits, 2);
    }

    #[test]
    fn test_has_is_side_effect_free_for_live_entries() {
        let mut store = CacheStore::new(config(100));
        store.set_at("k", 1u8, SetOptions::default(), 1_000);

        assert!(store.has_at("k", 2_000));

        let entry = &store.entries()["k"];
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.last_accessed, 1_000);
        assert_eq!(store.stats().hits, 0);
        assert_eq!(store.stats().misses, 0);
    }

    #[test]
    fn test_has_purges_expired() {
        let mut store = CacheStore::new(config(100));
        store.set_at("k", 1u8, SetOptions::ttl(Duration::from_millis(10)), 1_000);

        assert!(!store.has_at("k", 1_010));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_delete() {
        let mut store = CacheStore::new(config(100));

        store.set("key1", "value1".to_string(), SetOptions::default());
        assert!(store.delete("key1"));

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
        assert!(!store.delete("key1"));
    }

    #[test]
    fn test_delete_expired_reports_absent() {
        let mut store = CacheStore::new(config(100));
        store.set_at("k", 1u8, SetOptions::ttl(Duration::from_millis(10)), 1_000);

        assert!(!store.delete_at("k", 2_000));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(config(100));

        store.set("key1", "value1".to_string(), SetOptions::priority(5));
        store.set("key1", "value2".to_string(), SetOptions::default());

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()["key1"].priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_set_does_not_evict() {
        let mut store = CacheStore::new(config(2));
        for key in ["a", "b", "c", "d"] {
            store.set(key, 0u8, SetOptions::default());
        }
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_cleanup_priority_scenario() {
        let mut store = CacheStore::new(config(2));

        store.set_at("A", 'a', SetOptions::priority(1), 1_000);
        store.set_at("B", 'b', SetOptions::priority(5), 1_000);
        store.set_at("C", 'c', SetOptions::priority(1), 1_000);

        let outcome = store.cleanup_at(1_000);

        assert_eq!(outcome, SweepOutcome { expired: 0, evicted: 1 });
        assert_eq!(store.len(), 2);
        assert!(!store.has_at("A", 1_000));
        assert!(store.has_at("B", 1_000));
        assert!(store.has_at("C", 1_000));
        assert_eq!(store.report_at(1_000).size, 2);
    }

    #[test]
    fn test_cleanup_recent_read_survives() {
        let mut store = CacheStore::new(config(2));

        store.set_at("old", 1u8, SetOptions::default(), 1_000);
        store.set_at("mid", 2u8, SetOptions::default(), 1_100);
        store.get_at("old", 1_200);
        store.set_at("new", 3u8, SetOptions::default(), 1_300);

        store.cleanup_at(1_400);

        assert!(store.has_at("old", 1_400));
        assert!(!store.has_at("mid", 1_400));
        assert!(store.has_at("new", 1_400));
    }

    #[test]
    fn test_cleanup_removes_expired_before_evicting() {
        let mut store = CacheStore::new(config(2));

        store.set_at("short", 1u8, SetOptions::ttl(Duration::from_millis(50)), 1_000);
        store.set_at("a", 2u8, SetOptions::default(), 1_000);
        store.set_at("b", 3u8, SetOptions::default(), 1_000);

        let outcome = store.cleanup_at(1_100);

        assert_eq!(outcome, SweepOutcome { expired: 1, evicted: 0 });
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_sweep_with_lowered_capacity() {
        let mut store = CacheStore::new(config(10));
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            store.set_at(*key, i, SetOptions::default(), 1_000 + i as u64);
        }

        let outcome = store.sweep_at(2_000, 2);

        assert_eq!(outcome.evicted, 2);
        assert!(store.has_at("c", 2_000));
        assert!(store.has_at("d", 2_000));
        assert_eq!(store.stats().evictions, 2);
    }

    #[test]
    fn test_invalidate_pattern_is_idempotent() {
        let mut store = CacheStore::new(config(100));
        store.set("user:1", 1u8, SetOptions::default());
        store.set("user:2", 2u8, SetOptions::default());
        store.set("post:1", 3u8, SetOptions::default());

        let pattern = Regex::new("^user:").unwrap();

        assert_eq!(store.invalidate_pattern(&pattern), 2);
        assert_eq!(store.invalidate_pattern(&pattern), 0);
        assert_eq!(store.len(), 1);
        assert!(store.has("post:1"));
    }

    #[test]
    fn test_near_expiry_targets() {
        let mut store = CacheStore::new(config(100));
        store.set_at("soon", 1u8, SetOptions::ttl(Duration::from_millis(1_000)).with_priority(4), 0);
        store.set_at("later", 2u8, SetOptions::ttl(Duration::from_millis(10_000)), 0);

        let targets = store.near_expiry_at(800);

        assert_eq!(
            targets,
            vec![RefreshTarget {
                key: "soon".to_string(),
                priority: 4,
                ttl: Duration::from_millis(1_000),
            }]
        );
    }

    #[test]
    fn test_restore_drops_expired_and_resumes_sequence() {
        let mut source = CacheStore::new(config(100));
        source.set_at("live", 1u8, SetOptions::ttl(Duration::from_secs(60)), 1_000);
        source.set_at("dead", 2u8, SetOptions::ttl(Duration::from_millis(10)), 1_000);
        source.get_at("live", 1_001);

        let mut restored = CacheStore::restore(config(100), source.entries().clone(), 2_000);

        assert_eq!(restored.len(), 1);
        assert!(restored.has_at("live", 2_000));
        let last_seq = restored.entries()["live"].access_seq;
        restored.set_at("next", 3u8, SetOptions::default(), 2_000);
        assert!(restored.entries()["next"].access_seq > last_seq);
    }

    #[test]
    fn test_clear() {
        let mut store = CacheStore::new(config(100));
        store.set("a", 1u8, SetOptions::default());
        store.set("b", 2u8, SetOptions::default());

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.report().size, 0);
    }
}
