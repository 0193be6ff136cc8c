//! Integration Tests for Cache Persistence
//!
//! Round trips cache namespaces through `FileStorage` in a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use resource_cache::cache::SetOptions;
use resource_cache::persistence::decode;
use resource_cache::{CacheConfig, FileStorage, ResourceCache, StorageBackend};
use serde_json::{json, Value};
use tempfile::TempDir;

// == Helper Functions ==

fn config(key: &str) -> CacheConfig {
    CacheConfig::new(key, 50, Duration::from_secs(300)).with_persist_debounce(Duration::from_millis(50))
}

async fn open(dir: &TempDir, key: &str) -> ResourceCache<Value> {
    ResourceCache::open(config(key), Arc::new(FileStorage::new(dir.path()))).await
}

// == Persistence Round Trips ==

#[tokio::test]
async fn test_flushed_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, "data_cache").await;
    cache
        .set("/api/properties", json!([{"id": 1}]), SetOptions::priority(3))
        .await;
    cache.flush().await.unwrap();
    drop(cache);

    let reopened = open(&dir, "data_cache").await;

    assert_eq!(reopened.get("/api/properties").await, Some(json!([{"id": 1}])));
}

#[tokio::test]
async fn test_expired_entries_are_not_restored() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, "data_cache").await;
    cache
        .set("short", json!(1), SetOptions::ttl(Duration::from_millis(50)))
        .await;
    cache.set("long", json!(2), SetOptions::default()).await;
    cache.flush().await.unwrap();
    drop(cache);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let reopened = open(&dir, "data_cache").await;

    assert_eq!(reopened.len().await, 1);
    assert_eq!(reopened.get("short").await, None);
    assert_eq!(reopened.get("long").await, Some(json!(2)));
}

#[tokio::test]
async fn test_debounced_writer_persists_without_flush() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    let cache = open(&dir, "component_cache").await;

    for i in 0..5 {
        cache.set(format!("k{}", i), json!(i), SetOptions::default()).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let blob = storage.read("component_cache").await.unwrap().unwrap();
    let entries = decode::<Value>(&blob).unwrap();
    assert_eq!(entries.len(), 5);
}

#[tokio::test]
async fn test_namespaces_use_separate_slots() {
    let dir = TempDir::new().unwrap();
    let a = open(&dir, "component_cache").await;
    let b = open(&dir, "image_cache").await;
    a.set("shared_key", json!("a"), SetOptions::default()).await;
    b.set("shared_key", json!("b"), SetOptions::default()).await;
    a.flush().await.unwrap();
    b.flush().await.unwrap();
    drop(a);
    drop(b);

    assert_eq!(open(&dir, "component_cache").await.get("shared_key").await, Some(json!("a")));
    assert_eq!(open(&dir, "image_cache").await.get("shared_key").await, Some(json!("b")));
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    std::fs::write(storage.path_for("data_cache"), "{not json").unwrap();

    let cache = open(&dir, "data_cache").await;

    assert!(cache.is_empty().await);
    cache.set("k", json!(1), SetOptions::default()).await;
    assert_eq!(cache.get("k").await, Some(json!(1)));
}

#[tokio::test]
async fn test_destroy_flushes_and_keeps_slot() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, "image_cache").await;
    cache.set("/img/a.png", json!("/img/a.png"), SetOptions::default()).await;

    cache.destroy().await;
    assert!(cache.is_empty().await);

    let reopened = open(&dir, "image_cache").await;
    assert_eq!(reopened.get("/img/a.png").await, Some(json!("/img/a.png")));
}

#[tokio::test]
async fn test_unpersisted_cache_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()));
    let cache: ResourceCache<Value> =
        ResourceCache::open(config("scratch").with_persistence(false), storage.clone()).await;

    cache.set("k", json!(1), SetOptions::default()).await;
    cache.flush().await.unwrap();

    assert_eq!(storage.read("scratch").await.unwrap(), None);
}

#[tokio::test]
async fn test_flush_after_destroy_keeps_snapshot() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, "data_cache").await;
    cache.set("k", json!(1), SetOptions::default()).await;

    cache.destroy().await;
    cache.destroy().await;
    cache.flush().await.unwrap();

    let reopened = open(&dir, "data_cache").await;
    assert_eq!(reopened.get("k").await, Some(json!(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_flush_races_debounced_writer() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, "data_cache").await;

    for round in 0..20 {
        cache.set(format!("k{}", round), json!(round), SetOptions::default()).await;
        let other = cache.clone();
        let background = tokio::spawn(async move { other.flush().await });
        cache.flush().await.unwrap();
        background.await.unwrap().unwrap();
    }
    // Let any pending debounced write land after the last flush
    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(cache);

    let reopened = open(&dir, "data_cache").await;
    assert_eq!(reopened.len().await, 20);
}

#[tokio::test]
async fn test_remove_clears_slot() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, "image_cache").await;
    cache.set("/img/a.png", json!("/img/a.png"), SetOptions::default()).await;
    cache.destroy().await;

    let storage = FileStorage::new(dir.path());
    storage.remove("image_cache").await.unwrap();

    assert!(open(&dir, "image_cache").await.is_empty().await);
}
