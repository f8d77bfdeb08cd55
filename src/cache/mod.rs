//! Generic TTL cache with single-flight population.
//!
//! Values are stored as `Arc<V>` so readers share one immutable copy; a refresh
//! replaces the entry wholesale. Expiry is checked lazily on read, and
//! [`TtlCache::purge_expired`] (optionally driven by [`TtlCache::spawn_sweeper`])
//! reclaims memory held by dead entries.

use dashmap::DashMap;
use std::convert::Infallible;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent key → value store with per-entry expiry.
///
/// Clone-cheap; clones share the same storage.
pub struct TtlCache<K, V> {
    name: &'static str,
    entries: Arc<DashMap<K, CacheEntry<V>>>,
    /// key → producer gate; only the holder of a key's gate runs its producer.
    inflight: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: self.entries.clone(),
            inflight: self.inflight.clone(),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache; `name` only labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(DashMap::new()),
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Return the value for `key` if present and unexpired.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let entry = self.entries.get(key)?;
        entry
            .is_fresh(Instant::now())
            .then(|| entry.value.clone())
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        value
    }

    /// Return the cached value, or run `producer` once and cache its output.
    pub async fn get_or_create<F, Fut>(&self, key: K, ttl: Duration, producer: F) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let result = self
            .get_or_try_create(key, ttl, || async {
                Ok::<V, Infallible>(producer().await)
            })
            .await;
        match result {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_create`](Self::get_or_create), but only `Ok` values are
    /// cached; an `Err` is handed back and the next caller tries again.
    ///
    /// Concurrent callers on the same missing key are coalesced: one runs the
    /// producer, the rest wait and then read its result.
    pub async fn get_or_try_create<F, Fut, E>(
        &self,
        key: K,
        ttl: Duration,
        producer: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result: Result<Arc<V>, E> = async {
            let _held = gate.lock().await;
            // Whoever held the gate before us may have filled the entry.
            if let Some(value) = self.get(&key) {
                trace!(cache = self.name, "coalesced with in-flight producer");
                return Ok(value);
            }
            match producer().await {
                Ok(value) => Ok(self.set(key.clone(), value, ttl)),
                Err(err) => Err(err),
            }
        }
        .await;

        drop(gate);
        self.inflight
            .remove_if(&key, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry and any idle producer gates. Returns the
    /// number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        // Gates abandoned by cancelled producers are only referenced by the map.
        self.inflight.retain(|_, gate| Arc::strong_count(gate) > 1);
        before.saturating_sub(self.entries.len())
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Spawn a background task that purges expired entries every `interval`
    /// until `cancel` fires.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            debug!(cache = cache.name, removed, remaining = cache.len(), "purged expired entries");
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn get_respects_expiry() {
        let cache: TtlCache<&str, u32> = TtlCache::new("test");
        cache.set("a", 1, TTL);
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get(&"a").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&"a").is_none());
        // Still physically stored until purged.
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn get_or_create_produces_once_per_window() {
        let cache: TtlCache<&str, u32> = TtlCache::new("test");
        let calls = AtomicU32::new(0);
        let produce = || async { calls.fetch_add(1, Ordering::SeqCst) + 10 };

        assert_eq!(*cache.get_or_create("k", TTL, produce).await, 10);
        assert_eq!(*cache.get_or_create("k", TTL, produce).await, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(TTL).await;
        assert_eq!(*cache.get_or_create("k", TTL, produce).await, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_production_is_not_cached() {
        let cache: TtlCache<u32, String> = TtlCache::new("test");
        let first: Result<_, &str> = cache
            .get_or_try_create(1, TTL, || async { Err("upstream down") })
            .await;
        assert_eq!(first.unwrap_err(), "upstream down");
        assert!(cache.is_empty());

        let second: Result<_, &str> = cache
            .get_or_try_create(1, TTL, || async { Ok("fresh".to_string()) })
            .await;
        assert_eq!(second.unwrap().as_str(), "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_are_coalesced() {
        let cache: TtlCache<u32, u32> = TtlCache::new("test");
        let calls = AtomicU32::new(0);

        let make = || {
            cache.get_or_create(7, TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                42
            })
        };
        let results = futures::future::join_all((0..10).map(|_| make())).await;

        assert!(results.iter().all(|v| **v == 42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache: TtlCache<u32, u32> = TtlCache::new("test");
        cache.set(1, 1, Duration::from_secs(5));
        cache.set(2, 2, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&2).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_in_background() {
        let cache: TtlCache<u32, u32> = TtlCache::new("test");
        cache.set(1, 1, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cache.spawn_sweeper(Duration::from_secs(5), cancel.clone());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(cache.is_empty());
        cancel.cancel();
    }
}
