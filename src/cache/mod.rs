//! Two-tier result cache
//!
//! Tier 1 is a bounded in-memory TTL map; tier 2 is a persistent SQLite
//! store with its own TTL. Reads check memory first and promote persistent
//! hits; writes populate both tiers. Persistent-tier failures degrade to
//! cache-miss behavior and never fail the surrounding enrichment.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::{PersistentCacheStats, SqliteCache};

use crate::config::CacheConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Statistics for both cache tiers
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    pub memory: MemoryTierStats,
    pub persistent: PersistentTierStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryTierStats {
    pub enabled: bool,
    pub size: usize,
    pub max_entries: usize,
    pub ttl_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistentTierStats {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub ttl_hours: f64,
    #[serde(flatten)]
    pub stats: Option<PersistentCacheStats>,
}

pub struct TwoTierCache {
    memory: MemoryCache,
    memory_ttl: Duration,
    max_entries: usize,
    persistent: Option<SqliteCache>,
    persistent_ttl: Duration,
}

impl TwoTierCache {
    /// Build both tiers from configuration.
    ///
    /// A persistent tier that fails to open is logged and dropped; the
    /// cache then runs memory-only.
    pub fn from_config(config: &CacheConfig) -> Self {
        let memory_ttl = Duration::from_secs(config.ttl_hours * 3600);
        let persistent_ttl = Duration::from_secs(config.persistent.ttl_hours * 3600);

        let persistent = if config.persistent.enabled {
            match SqliteCache::open(&config.persistent.path, persistent_ttl) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(path = ?config.persistent.path, error = %e,
                          "Failed to open persistent cache, running memory-only");
                    None
                }
            }
        } else {
            None
        };

        Self::new(memory_ttl, config.max_entries, persistent)
    }

    pub fn new(memory_ttl: Duration, max_entries: usize, persistent: Option<SqliteCache>) -> Self {
        let persistent_ttl = persistent.as_ref().map(|p| p.ttl()).unwrap_or(Duration::ZERO);
        Self {
            memory: MemoryCache::new(memory_ttl, max_entries),
            memory_ttl,
            max_entries,
            persistent,
            persistent_ttl,
        }
    }

    /// Read path: memory tier, then persistent tier with promotion.
    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(payload) = self.memory.get(key).await {
            return Some(payload);
        }

        let persistent = self.persistent.as_ref()?;
        match persistent.get(key) {
            Ok(Some(payload)) => {
                // Promote so the next read stays off disk
                self.memory.put(key, payload.clone()).await;
                Some(payload)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Persistent cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write path: both tiers, idempotent overwrite.
    pub async fn put(&self, key: &str, payload: &str) {
        self.memory.put(key, payload.to_string()).await;

        if let Some(persistent) = &self.persistent {
            if let Err(e) = persistent.put(key, payload) {
                warn!(key, error = %e, "Persistent cache write failed");
            }
        }
    }

    /// Drop every memory-tier entry; the persistent tier is untouched.
    pub async fn clear_memory(&self) {
        self.memory.clear().await;
    }

    pub async fn statistics(&self) -> CacheStatistics {
        let persistent_stats = self.persistent.as_ref().and_then(|p| match p.statistics() {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "Failed to read persistent cache statistics");
                None
            }
        });

        CacheStatistics {
            memory: MemoryTierStats {
                enabled: true,
                size: self.memory.len().await,
                max_entries: self.max_entries,
                ttl_hours: self.memory_ttl.as_secs_f64() / 3600.0,
            },
            persistent: PersistentTierStats {
                enabled: self.persistent.is_some(),
                path: self.persistent.as_ref().map(|p| p.path().to_path_buf()),
                ttl_hours: self.persistent_ttl.as_secs_f64() / 3600.0,
                stats: persistent_stats,
            },
        }
    }
}
