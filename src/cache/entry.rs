//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access bookkeeping.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default priority for entries stored without an explicit one.
pub const DEFAULT_PRIORITY: i32 = 1;

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// Timestamps are Unix milliseconds so entries survive a persistence round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The stored payload
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Absolute expiration timestamp (Unix milliseconds), always > `timestamp`
    pub expiry: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Timestamp of the most recent read, or creation time if never read
    pub last_accessed: u64,
    /// Higher values survive eviction longer
    pub priority: i32,
    /// Store-local ordering stamp, bumped with `last_accessed`
    #[serde(default)]
    pub access_seq: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry at `now` living for `ttl`.
    ///
    /// A zero TTL is clamped to one millisecond so `expiry > timestamp` holds.
    pub fn new(data: T, ttl: Duration, priority: i32, now: u64, access_seq: u64) -> Self {
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        Self {
            data,
            timestamp: now,
            expiry: now.saturating_add(ttl_ms),
            access_count: 0,
            last_accessed: now,
            priority,
            access_seq,
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now` reaches its expiry.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expiry
    }

    // == Record Access ==
    /// Updates the read bookkeeping used for LRU ordering.
    pub fn record_access(&mut self, now: u64, access_seq: u64) {
        self.access_count += 1;
        self.last_accessed = now;
        self.access_seq = access_seq;
    }

    /// The TTL span the entry was created with.
    pub fn original_ttl(&self) -> Duration {
        Duration::from_millis(self.expiry - self.timestamp)
    }

    /// Remaining lifetime in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expiry.saturating_sub(now)
    }

    /// True when no more than a quarter of the original TTL remains.
    pub fn is_near_expiry(&self, now: u64) -> bool {
        let span = self.expiry - self.timestamp;
        self.ttl_remaining_ms(now).saturating_mul(4) <= span
    }

    /// Milliseconds since creation.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
