//! Bounded in-memory cache with per-entry time-to-live.
//!
//! One instance is constructed per process and handed to consumers by
//! reference (`Arc<Cache<..>>`). Entries expire `ttl` after insertion;
//! expired entries are never returned and are dropped by [`Cache::sweep_expired`],
//! which [`Cache::insert`] runs after every insert. Capacity is enforced with
//! LRU eviction.
//!
//! Lock poisoning fails open: a poisoned lock behaves like an empty cache.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// TTL + LRU cache keyed by `K`.
pub struct Cache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a live entry, refreshing its LRU position.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Store `value` and sweep expired entries.
    pub fn insert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                CacheEntry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
        self.sweep_expired();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            tracing::trace!(removed = expired.len(), "Cache sweep");
        }
        expired.len()
    }

    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of stored entries, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_live_entry() {
        let cache: Cache<String, u32> = Cache::new(4, Duration::from_secs(60));
        cache.insert("a".into(), 1);
        assert_eq!(cache.get(&"a".into()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache: Cache<String, u32> = Cache::new(4, Duration::from_secs(60));
        cache.insert("a".into(), 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&"a".into()), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_expired_entries() {
        let cache: Cache<String, u32> = Cache::new(4, Duration::from_secs(60));
        cache.insert("old".into(), 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.insert("new".into(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".into()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recent() {
        let cache: Cache<u32, u32> = Cache::new(2, Duration::from_secs(60));
        cache.insert(1, 1);
        cache.insert(2, 2);
        assert_eq!(cache.get(&1), Some(1));
        cache.insert(3, 3);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.get(&3), Some(3));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache: Cache<u32, u32> = Cache::new(0, Duration::from_secs(60));
        cache.insert(1, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache: Cache<u32, u32> = Cache::new(4, Duration::from_secs(60));
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
        cache.clear();
        assert!(cache.is_empty());
    }
}
