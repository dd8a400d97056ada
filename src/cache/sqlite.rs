//! Persistent SQLite cache tier
//!
//! Survives process restarts and carries its own TTL, independent of the
//! memory tier. Expiry is lazy: stale rows are dropped when read. Callers
//! must treat every error here as a cache miss.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Operational statistics for the persistent tier
#[derive(Debug, Clone, Serialize)]
pub struct PersistentCacheStats {
    pub total_entries: u64,
    pub expired_entries: u64,
    pub valid_entries: u64,
    pub database_size_bytes: u64,
}

pub struct SqliteCache {
    ttl: Duration,
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path, ttl: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS enrichment_cache (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                inserted_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_enrichment_cache_inserted_at
             ON enrichment_cache (inserted_at)",
            [],
        )?;

        Ok(Self {
            ttl,
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    fn cutoff(&self) -> i64 {
        chrono::Utc::now().timestamp() - self.ttl.as_secs() as i64
    }

    /// Fetch a fresh payload; a stale row is deleted and reads as absent.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| crate::error::EnrichmentError::cache("sqlite cache lock poisoned"))?;

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT payload, inserted_at FROM enrichment_cache WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((payload, inserted_at)) if inserted_at >= self.cutoff() => Ok(Some(payload)),
            Some(_) => {
                conn.execute(
                    "DELETE FROM enrichment_cache WHERE cache_key = ?1",
                    params![key],
                )?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Insert or overwrite, stamped with the write time.
    pub fn put(&self, key: &str, payload: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| crate::error::EnrichmentError::cache("sqlite cache lock poisoned"))?;
        conn.execute(
            "INSERT OR REPLACE INTO enrichment_cache (cache_key, payload, inserted_at)
             VALUES (?1, ?2, ?3)",
            params![key, payload, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Entry counts and on-disk footprint for operational visibility.
    pub fn statistics(&self) -> Result<PersistentCacheStats> {
        let cutoff = self.cutoff();
        let conn = self.conn.lock().map_err(|_| crate::error::EnrichmentError::cache("sqlite cache lock poisoned"))?;

        let total: u64 =
            conn.query_row("SELECT COUNT(*) FROM enrichment_cache", [], |row| row.get(0))?;
        let expired: u64 = conn.query_row(
            "SELECT COUNT(*) FROM enrichment_cache WHERE inserted_at < ?1",
            params![cutoff],
            |row| row.get(0),
        )?;

        let database_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(PersistentCacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total - expired,
            database_size_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
