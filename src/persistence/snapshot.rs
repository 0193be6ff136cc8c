//! Snapshot Encoding
//!
//! Versioned JSON blob holding a store's entries:
//! `{ "version": 1, "savedAt": <ms>, "entries": { key: CacheEntry } }`.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Current blob format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a, T> {
    version: u32,
    saved_at: u64,
    entries: &'a HashMap<String, CacheEntry<T>>,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

#[derive(Deserialize)]
struct Snapshot<T> {
    entries: HashMap<String, CacheEntry<T>>,
}

/// Serializes `entries` into a snapshot blob stamped with `now`.
pub fn encode<T: Serialize>(entries: &HashMap<String, CacheEntry<T>>, now: u64) -> Result<String> {
    serde_json::to_string(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        saved_at: now,
        entries,
    })
    .map_err(|e| CacheError::Persistence(format!("failed to encode snapshot: {}", e)))
}

/// Parses a snapshot blob.
///
/// Blobs without a version field, or with a version other than
/// [`SNAPSHOT_VERSION`], are rejected rather than guessed at. Expired entries
/// are returned as-is; callers filter them against their own clock.
pub fn decode<T: DeserializeOwned>(blob: &str) -> Result<HashMap<String, CacheEntry<T>>> {
    let header: SnapshotHeader = serde_json::from_str(blob)
        .map_err(|e| CacheError::Persistence(format!("unreadable snapshot header: {}", e)))?;

    if header.version != SNAPSHOT_VERSION {
        return Err(CacheError::Persistence(format!(
            "unsupported snapshot version {} (expected {})",
            header.version, SNAPSHOT_VERSION
        )));
    }

    let snapshot: Snapshot<T> = serde_json::from_str(blob)
        .map_err(|e| CacheError::Persistence(format!("corrupt snapshot: {}", e)))?;
    Ok(snapshot.entries)
}
