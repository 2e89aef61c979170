//! Timed cache for expensive lookups
//!
//! Entries expire after a per-entry TTL. The cache is bounded; when full,
//! the oldest inserted entry is evicted. The lock is only held for lookup
//! and insert, so concurrent misses for the same key may both compute.

use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry<V> {
    inserted_at: Instant,
    ttl: Duration,
    value: V,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

pub struct TimedCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
}

impl<V: Clone> TimedCache<V> {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fresh value for `key`, if any. Expired entries are dropped.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        // peek leaves recency untouched so eviction stays insertion-ordered
        let now = Instant::now();
        match entries.peek(key).map(|entry| entry.is_fresh(now)) {
            Some(true) => entries.peek(key).map(|entry| entry.value.clone()),
            Some(false) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: impl Into<String>, ttl: Duration, value: V) {
        let entry = CacheEntry {
            inserted_at: Instant::now(),
            ttl,
            value,
        };
        self.entries.lock().await.put(key.into(), entry);
    }

    /// Cached value for `key`, or the result of `compute`.
    ///
    /// Returns the value and whether it was a cache hit. Only `Ok` results
    /// are stored.
    pub async fn get_or_try_compute<E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok((value, true));
        }

        let value = compute().await?;
        self.insert(key, ttl, value.clone()).await;
        Ok((value, false))
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
