//! Bounded in-memory cache tier with lazy TTL expiry
//!
//! Entries are evicted oldest-insertion-first once the size bound is hit.
//! Expiry is evaluated on access; an expired entry is treated as absent
//! even while physically present.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: String,
    inserted_at: DateTime<Utc>,
}

pub struct MemoryCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(ttl: StdDuration, max_entries: usize) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1)),
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a fresh entry's payload; expired entries are dropped on read.
    pub async fn get(&self, key: &str) -> Option<String> {
        let now = Utc::now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if now - entry.inserted_at <= self.ttl => {
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but is stale; drop it under the write lock.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if now - entry.inserted_at > self.ttl {
                entries.remove(key);
            }
        }
        None
    }

    /// Insert or overwrite, evicting oldest-insertion entries past the bound.
    pub async fn put(&self, key: &str, payload: String) {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) {
            while entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            key.to_string(),
            MemoryEntry {
                payload,
                inserted_at: Utc::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = MemoryCache::new(StdDuration::from_secs(60), 10);
        cache.put("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let cache = MemoryCache::new(StdDuration::from_millis(10), 10);
        cache.put("k", "v".to_string()).await;
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        assert!(cache.get("k").await.is_none());
        // The stale entry was swept on read
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn evicts_oldest_insertion_first() {
        let cache = MemoryCache::new(StdDuration::from_secs(60), 2);
        cache.put("a", "1".to_string()).await;
        tokio::time::sleep(StdDuration::from_millis(5)).await;
        cache.put("b", "2".to_string()).await;
        tokio::time::sleep(StdDuration::from_millis(5)).await;
        cache.put("c", "3".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn overwrite_does_not_grow_the_cache() {
        let cache = MemoryCache::new(StdDuration::from_secs(60), 2);
        cache.put("a", "1".to_string()).await;
        cache.put("b", "2".to_string()).await;
        cache.put("a", "updated".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await.as_deref(), Some("updated"));
        assert_eq!(cache.get("b").await.as_deref(), Some("2"));
    }
}
