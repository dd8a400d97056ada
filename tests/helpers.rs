//! Shared test fixtures: scriptable sources, recording sinks, manager wiring

#![allow(dead_code)]

use async_trait::async_trait;
use siem_threat_enrichment::cache::{SqliteCache, TwoTierCache};
use siem_threat_enrichment::config::Config;
use siem_threat_enrichment::enrichment::EnrichmentManager;
use siem_threat_enrichment::error::Result;
use siem_threat_enrichment::models::{SourceId, SourceOutcome, SourceReport};
use siem_threat_enrichment::rate_limit::RateLimiter;
use siem_threat_enrichment::sources::{ReputationSource, SourceRegistry};
use siem_threat_enrichment::writeback::{EnrichmentDocument, WriteBackSink};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A source that returns a canned outcome and counts its calls
pub struct MockSource {
    id: SourceId,
    confidence: f64,
    outcome: Mutex<SourceOutcome>,
    pub calls: AtomicUsize,
}

impl MockSource {
    pub fn new(id: SourceId, confidence: f64, outcome: SourceOutcome) -> Self {
        Self {
            id,
            confidence,
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
        }
    }

    /// DShield-shaped source reporting the given reputation score
    pub fn reporting(reputation: Option<f64>) -> Self {
        Self::new(
            SourceId::Dshield,
            0.8,
            SourceOutcome::Data(SourceReport {
                reputation_score: reputation,
                ..SourceReport::default()
            }),
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReputationSource for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn client_type(&self) -> &'static str {
        "MockSource"
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    async fn ip_reputation(&self, _ip: IpAddr) -> Result<SourceOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.lock().unwrap().clone())
    }
}

/// Write-back sink that records every indexed document
#[derive(Default)]
pub struct RecordingSink {
    pub writes: Mutex<Vec<(String, String, EnrichmentDocument)>>,
}

impl RecordingSink {
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl WriteBackSink for RecordingSink {
    async fn index(&self, index: &str, id: &str, document: &EnrichmentDocument) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((index.to_string(), id.to_string(), document.clone()));
        Ok(())
    }
}

/// Write-back sink that always fails
pub struct FailingSink;

#[async_trait]
impl WriteBackSink for FailingSink {
    async fn index(&self, _index: &str, _id: &str, _doc: &EnrichmentDocument) -> Result<()> {
        Err(siem_threat_enrichment::error::EnrichmentError::WriteBack(
            "sink unavailable".to_string(),
        ))
    }
}

/// Builder for a fully in-process manager
pub struct ManagerBuilder {
    config: Config,
    sources: Vec<Arc<dyn ReputationSource>>,
    limits: HashMap<SourceId, u32>,
    cache: Option<Arc<TwoTierCache>>,
    sink: Option<Arc<dyn WriteBackSink>>,
}

impl ManagerBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.cache.persistent.enabled = false;
        config.writeback.enabled = false;
        Self {
            config,
            sources: Vec::new(),
            limits: HashMap::new(),
            cache: None,
            sink: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn ReputationSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn rate_limit(mut self, id: SourceId, per_minute: u32) -> Self {
        self.limits.insert(id, per_minute);
        self
    }

    pub fn cache(mut self, cache: Arc<TwoTierCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn WriteBackSink>) -> Self {
        self.config.writeback.enabled = true;
        self.sink = Some(sink);
        self
    }

    pub fn writeback_disabled(mut self) -> Self {
        self.config.writeback.enabled = false;
        self
    }

    pub fn build(self) -> EnrichmentManager {
        let mut registry = SourceRegistry::empty();
        for source in self.sources {
            registry.register(source);
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(TwoTierCache::new(Duration::from_secs(3600), 100, None)));

        EnrichmentManager::new(
            self.config,
            registry,
            Arc::new(RateLimiter::new(self.limits)),
            cache,
            self.sink,
        )
    }
}

/// Memory-only two-tier cache with the given memory TTL
pub fn memory_cache(ttl: Duration) -> Arc<TwoTierCache> {
    Arc::new(TwoTierCache::new(ttl, 100, None))
}

/// Two-tier cache backed by a SQLite file inside `dir`
pub fn persistent_cache(dir: &tempfile::TempDir, memory_ttl: Duration) -> Arc<TwoTierCache> {
    let sqlite = SqliteCache::open(&dir.path().join("cache.sqlite3"), Duration::from_secs(3600))
        .expect("open sqlite cache");
    Arc::new(TwoTierCache::new(memory_ttl, 100, Some(sqlite)))
}
