//! Cache Statistics Module
//!
//! Tracks cache performance counters and builds the aggregate report.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::cache::CacheEntry;

/// Number of keys listed in `CacheStatsReport::most_accessed`.
pub const MOST_ACCESSED_LIMIT: usize = 5;

// == Cache Stats ==
/// Running counters for a single store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of `get` calls that returned data
    pub hits: u64,
    /// Number of `get` calls on absent or expired keys
    pub misses: u64,
    /// Number of entries removed for exceeding capacity
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}

// == Report Types ==
/// A key and how often it has been read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRecord {
    pub key: String,
    pub access_count: u64,
}

/// The entry created longest ago.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OldestEntry {
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a store's occupancy and behavior.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// True hit ratio, hits / (hits + misses)
    pub hit_rate: f64,
    /// Legacy figure `size / total_accesses * 100`.
    ///
    /// This is an occupancy estimate, not a hit ratio; 0.0 when nothing has been read.
    pub occupancy_estimate: f64,
    /// Mean entry age in milliseconds
    pub average_age_ms: u64,
    /// Up to five most-read keys, most read first
    pub most_accessed: Vec<AccessRecord>,
    pub oldest_entry: Option<OldestEntry>,
}

impl CacheStatsReport {
    /// Builds the report for `entries` at time `now`.
    pub fn build<T>(
        entries: &HashMap<String, CacheEntry<T>>,
        stats: &CacheStats,
        max_size: usize,
        now: u64,
    ) -> Self {
        let size = entries.len();
        let total_accesses: u64 = entries.values().map(|e| e.access_count).sum();

        let occupancy_estimate = if total_accesses == 0 {
            0.0
        } else {
            size as f64 / total_accesses as f64 * 100.0
        };

        let average_age_ms = if size == 0 {
            0
        } else {
            entries.values().map(|e| e.age_ms(now)).sum::<u64>() / size as u64
        };

        let mut most_accessed: Vec<AccessRecord> = entries
            .iter()
            .filter(|(_, e)| e.access_count > 0)
            .map(|(key, e)| AccessRecord {
                key: key.clone(),
                access_count: e.access_count,
            })
            .collect();
        most_accessed.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| a.key.cmp(&b.key))
        });
        most_accessed.truncate(MOST_ACCESSED_LIMIT);

        let oldest_entry = entries
            .iter()
            .min_by(|(ka, a), (kb, b)| a.timestamp.cmp(&b.timestamp).then_with(|| ka.cmp(kb)))
            .and_then(|(key, e)| {
                Utc.timestamp_millis_opt(e.timestamp as i64)
                    .single()
                    .map(|created_at| OldestEntry {
                        key: key.clone(),
                        created_at,
                    })
            });

        Self {
            size,
            max_size,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            hit_rate: stats.hit_rate(),
            occupancy_estimate,
            average_age_ms,
            most_accessed,
            oldest_entry,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(timestamp: u64, access_count: u64) -> CacheEntry<()> {
        let mut entry = CacheEntry::new((), Duration::from_secs(60), 1, timestamp, 0);
        entry.access_count = access_count;
        entry
    }

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_removals() {
        let mut stats = CacheStats::new();
        stats.record_evictions(2);
        stats.record_expirations(3);
        stats.record_evictions(1);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.expirations, 3);
    }

    #[test]
    fn test_report_empty_store() {
        let entries: HashMap<String, CacheEntry<()>> = HashMap::new();
        let report = CacheStatsReport::build(&entries, &CacheStats::new(), 10, 1_000);

        assert_eq!(report.size, 0);
        assert_eq!(report.max_size, 10);
        assert_eq!(report.average_age_ms, 0);
        assert_eq!(report.occupancy_estimate, 0.0);
        assert!(report.most_accessed.is_empty());
        assert!(report.oldest_entry.is_none());
    }

    #[test]
    fn test_report_aggregates() {
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), entry(1_000, 3));
        entries.insert("b".to_string(), entry(2_000, 1));

        let report = CacheStatsReport::build(&entries, &CacheStats::new(), 10, 3_000);

        assert_eq!(report.size, 2);
        // ages 2000 and 1000
        assert_eq!(report.average_age_ms, 1_500);
        // 2 entries / 4 accesses * 100
        assert!((report.occupancy_estimate - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.most_accessed[0].key, "a");
        assert_eq!(report.oldest_entry.unwrap().key, "a");
    }

    #[test]
    fn test_most_accessed_is_capped_and_skips_unread() {
        let mut entries = HashMap::new();
        for i in 0..8u64 {
            entries.insert(format!("k{}", i), entry(1_000, i));
        }

        let report = CacheStatsReport::build(&entries, &CacheStats::new(), 10, 1_000);

        assert_eq!(report.most_accessed.len(), MOST_ACCESSED_LIMIT);
        assert_eq!(report.most_accessed[0].key, "k7");
        assert!(report.most_accessed.iter().all(|r| r.access_count > 0));
    }
}
