//! Small cache capability: bounded size, per-entry TTL, fallible store.
//!
//! The store is fallible so a remote backing (or an injected failure in
//! tests) can degrade without taking the caller down; the in-process LRU
//! implementation itself never fails.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Bounded key/value store with TTL semantics.
pub trait CacheStore<K, V>: Send + Sync {
    /// A hit that has outlived the TTL is a miss (and is evicted).
    fn get(&self, key: &K) -> Result<Option<V>, CacheError>;
    fn put(&self, key: K, value: V) -> Result<(), CacheError>;
    fn invalidate(&self, key: &K) -> Result<(), CacheError>;
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-process LRU store with per-entry expiry.
pub struct LruTtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V> LruTtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped above zero");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, Entry<V>>> {
        // Recover the guard on poisoning; the map stays coherent.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<K, V> CacheStore<K, V> for LruTtlCache<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        let mut entries = self.lock();
        let expired = matches!(
            entries.peek(key),
            Some(entry) if entry.expires_at <= Instant::now()
        );
        if expired {
            entries.pop(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    fn put(&self, key: K, value: V) -> Result<(), CacheError> {
        let mut entries = self.lock();
        entries.put(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    fn invalidate(&self, key: &K) -> Result<(), CacheError> {
        self.lock().pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl_miss_after() {
        let cache: LruTtlCache<String, bool> =
            LruTtlCache::new(4, Duration::from_millis(30));
        cache.put("a".into(), true).unwrap();
        assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(true));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);
    }

    #[test]
    fn least_recently_used_is_evicted_when_full() {
        let cache: LruTtlCache<u32, u32> = LruTtlCache::new(2, Duration::from_secs(60));
        cache.put(1, 10).unwrap();
        cache.put(2, 20).unwrap();
        cache.get(&1).unwrap(); // touch 1, making 2 the LRU entry
        cache.put(3, 30).unwrap();

        assert_eq!(cache.get(&1).unwrap(), Some(10));
        assert_eq!(cache.get(&2).unwrap(), None);
        assert_eq!(cache.get(&3).unwrap(), Some(30));
    }

    #[test]
    fn invalidate_removes_the_entry() {
        let cache: LruTtlCache<String, bool> = LruTtlCache::new(4, Duration::from_secs(60));
        cache.put("gambling.example".into(), true).unwrap();
        cache.invalidate(&"gambling.example".to_string()).unwrap();
        assert_eq!(cache.get(&"gambling.example".to_string()).unwrap(), None);
    }
}
