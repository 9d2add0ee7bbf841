//! TTL cache service for the read path
//!
//! An injectable, typed cache rather than ambient global state. Expired
//! entries are kept until overwritten: the read path serves them as stale
//! fallbacks when the backing store is unreachable.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Typed key/value cache with a fixed time-to-live
pub struct CacheService<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Hash + Eq + Clone, V: Clone> CacheService<K, V> {
    /// Create a cache with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a value that is still within its TTL
    pub async fn get_fresh(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Get the last stored value regardless of expiry, for stale fallback
    pub async fn get_any(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value, replacing any previous entry for the key.
    /// Concurrent writers for the same key are tolerated; last writer wins.
    pub async fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_hit_within_ttl() {
        let cache = CacheService::new(Duration::from_secs(60));
        cache.insert("k", 41).await;
        assert_eq!(cache.get_fresh(&"k").await, Some(41));
        assert_eq!(cache.get_any(&"k").await, Some(41));
    }

    #[tokio::test]
    async fn test_expired_entry_still_served_as_stale() {
        let cache = CacheService::new(Duration::ZERO);
        cache.insert("k", 41).await;
        assert_eq!(cache.get_fresh(&"k").await, None);
        assert_eq!(cache.get_any(&"k").await, Some(41));
    }

    #[tokio::test]
    async fn test_miss_on_unknown_key() {
        let cache: CacheService<&str, i32> = CacheService::new(Duration::from_secs(60));
        assert_eq!(cache.get_fresh(&"k").await, None);
        assert_eq!(cache.get_any(&"k").await, None);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = CacheService::new(Duration::from_secs(60));
        cache.insert("k", 1).await;
        cache.insert("k", 2).await;
        assert_eq!(cache.get_fresh(&"k").await, Some(2));
    }
}
