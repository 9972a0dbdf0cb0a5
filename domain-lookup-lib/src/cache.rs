//! Async key-value cache with per-entry TTL.
//!
//! Components never inherit caching behaviour; they hold a [`SharedCache`]
//! handle and wrap their work in [`remember`] or [`remember_with_hit_info`].
//! Values are stored as JSON so any serde type can be cached, the same way
//! an external string-keyed store (Redis, memcached) would hold them.

use crate::error::LookupError;
use crate::types::Cached;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Storage backend for cached values.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live (non-expired) value.
    async fn get(&self, key: &str) -> Result<Option<Value>, LookupError>;

    /// Store a value for `ttl`.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), LookupError>;

    /// Remove a value, returning whether a live entry existed.
    async fn delete(&self, key: &str) -> Result<bool, LookupError>;
}

/// Shared handle passed to every component that caches.
pub type SharedCache = Arc<dyn CacheStore>;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// In-process cache. Expired entries are dropped lazily when touched.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning a [`SharedCache`].
    pub fn shared() -> SharedCache {
        Arc::new(Self::new())
    }

    /// Number of stored entries, expired ones included until they are touched.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, LookupError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), LookupError> {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, LookupError> {
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired()))
    }
}

/// Return the cached value for `key`, or run `producer`, cache its result and return it.
///
/// Producer errors are returned unchanged and nothing is cached.
pub async fn remember<T, F, Fut>(
    cache: &dyn CacheStore,
    key: &str,
    ttl: Duration,
    producer: F,
) -> Result<T, LookupError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, LookupError>>,
{
    if let Some(cached) = cache.get(key).await? {
        match serde_json::from_value::<T>(cached) {
            Ok(value) => return Ok(value),
            Err(e) => debug!(key, error = %e, "Discarding undecodable cache entry"),
        }
    }

    let value = producer().await?;
    cache.set(key, encode(key, &value)?, ttl).await?;
    Ok(value)
}

/// Like [`remember`], but for optional values and reporting whether the value came from the cache.
///
/// A cached `None` is returned as `None`; hit visibility only applies to
/// present values.
pub async fn remember_with_hit_info<T, F, Fut>(
    cache: &dyn CacheStore,
    key: &str,
    ttl: Duration,
    producer: F,
) -> Result<Option<Cached<T>>, LookupError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, LookupError>>,
{
    if let Some(cached) = cache.get(key).await? {
        match serde_json::from_value::<Option<T>>(cached) {
            Ok(value) => return Ok(value.map(Cached::hit)),
            Err(e) => debug!(key, error = %e, "Discarding undecodable cache entry"),
        }
    }

    let value = producer().await?;
    cache.set(key, encode(key, &value)?, ttl).await?;
    Ok(value.map(Cached::fresh))
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, LookupError> {
    serde_json::to_value(value)
        .map_err(|e| LookupError::cache(key, format!("Value cannot be stored: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache
            .set("k", Value::from("v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(Value::from("v")));
        assert!(cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_dropped() {
        let cache = MemoryCache::new();
        cache
            .set("k", Value::from(1), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_remember_runs_producer_once() {
        let cache = MemoryCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value: u32 = remember(&cache, "answer", Duration::from_secs(60), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remember_does_not_cache_errors() {
        let cache = MemoryCache::new();
        let result: Result<u32, _> = remember(&cache, "k", Duration::from_secs(60), || async {
            Err(LookupError::internal("boom"))
        })
        .await;
        tokio_test::assert_err!(result);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_hit_info_first_miss_then_hit() {
        let cache = MemoryCache::new();
        let produce = || async { Ok(Some("record".to_string())) };

        let first = remember_with_hit_info(&cache, "k", Duration::from_secs(60), produce)
            .await
            .unwrap()
            .unwrap();
        assert!(!first.is_cached);

        let second = remember_with_hit_info(&cache, "k", Duration::from_secs(60), produce)
            .await
            .unwrap()
            .unwrap();
        assert!(second.is_cached);
        assert_eq!(second.value, "record");
    }

    #[tokio::test]
    async fn test_hit_info_caches_none() {
        let cache = MemoryCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..2 {
            let value: Option<Cached<String>> =
                remember_with_hit_info(&cache, "missing", Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
            assert!(value.is_none());
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    struct UnavailableCache;

    #[async_trait]
    impl CacheStore for UnavailableCache {
        async fn get(&self, key: &str) -> Result<Option<Value>, LookupError> {
            Err(LookupError::cache(key, "backend unavailable"))
        }

        async fn set(&self, key: &str, _value: Value, _ttl: Duration) -> Result<(), LookupError> {
            Err(LookupError::cache(key, "backend unavailable"))
        }

        async fn delete(&self, key: &str) -> Result<bool, LookupError> {
            Err(LookupError::cache(key, "backend unavailable"))
        }
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_without_running_producer() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<u32, _> =
            remember(&UnavailableCache, "k", Duration::from_secs(60), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;

        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, LookupError::CacheError { ref key, .. } if key == "k"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unstorable_value_is_a_cache_error() {
        let cache = MemoryCache::new();
        let result: Result<HashMap<Vec<u8>, u8>, _> =
            remember(&cache, "bytes", Duration::from_secs(60), || async {
                Ok(HashMap::from([(vec![1u8, 2], 3u8)]))
            })
            .await;

        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, LookupError::CacheError { .. }));
        assert!(cache.is_empty().await);
    }
}
