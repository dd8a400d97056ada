//! Enrichment orchestrator
//!
//! Drives concurrent source queries for one indicator, merges per-source
//! outcomes into a single confidence-weighted verdict, populates both cache
//! tiers, and best-effort indexes the result into the write-back sink.

use crate::cache::{CacheStatistics, TwoTierCache};
use crate::config::Config;
use crate::correlation::CorrelationEngine;
use crate::error::{EnrichmentError, Result};
use crate::indicators;
use crate::models::{
    CorrelationResult, DomainIntelligence, EnrichmentResult, SourceId, SourceOutcome,
};
use crate::rate_limit::{RateLimitSnapshot, RateLimiter};
use crate::sources::SourceRegistry;
use crate::writeback::{self, ElasticsearchSink, EnrichmentDocument, WriteBackSink};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-source status for observability, not enforcement
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub enabled: bool,
    pub client_type: Option<String>,
    pub confidence_weight: f64,
    pub rate_limit_tracker: RateLimitSnapshot,
}

pub struct EnrichmentManager {
    config: Config,
    registry: SourceRegistry,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<TwoTierCache>,
    correlation: CorrelationEngine,
    writeback: Option<Arc<dyn WriteBackSink>>,
}

impl EnrichmentManager {
    /// Explicit construction from parts; nothing here touches global state.
    pub fn new(
        config: Config,
        registry: SourceRegistry,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<TwoTierCache>,
        writeback: Option<Arc<dyn WriteBackSink>>,
    ) -> Self {
        let correlation = CorrelationEngine::new(cache.clone(), config.correlation.clone());
        Self {
            config,
            registry,
            rate_limiter,
            cache,
            correlation,
            writeback,
        }
    }

    /// Wire the manager from configuration alone.
    pub fn from_config(config: Config) -> Result<Self> {
        let registry = SourceRegistry::from_config(&config)?;

        let mut limits = HashMap::new();
        for (name, source_config) in &config.sources {
            if let Ok(id) = name.parse::<SourceId>() {
                limits.insert(id, source_config.rate_limit_requests_per_minute);
            }
        }
        let rate_limiter = Arc::new(RateLimiter::new(limits));
        let cache = Arc::new(TwoTierCache::from_config(&config.cache));

        let writeback: Option<Arc<dyn WriteBackSink>> = if config.writeback.enabled {
            Some(Arc::new(ElasticsearchSink::new(&config.writeback.url)?))
        } else {
            None
        };

        Ok(Self::new(config, registry, rate_limiter, cache, writeback))
    }

    /// Enrich one IP address across every registered source.
    pub async fn enrich_ip(&self, ip: &str) -> Result<EnrichmentResult> {
        // Validation happens before any cache or source access
        let mut result = EnrichmentResult::new(ip)?;
        let cache_key = result.ip_address.to_string();

        if let Some(payload) = self.cache.get(&cache_key).await {
            match serde_json::from_str::<EnrichmentResult>(&payload) {
                Ok(mut cached) => {
                    debug!(ip = %cache_key, "Returning cached enrichment result");
                    cached.cache_hit = true;
                    return Ok(cached);
                }
                Err(e) => {
                    warn!(ip = %cache_key, error = %e, "Discarding undecodable cache entry");
                }
            }
        }

        if self.registry.is_empty() {
            return Err(EnrichmentError::NoSourcesAvailable);
        }

        let outcomes = self.query_sources(result.ip_address).await;
        let raw_contributions = self.aggregate(&mut result, outcomes)?;

        match serde_json::to_string(&result) {
            Ok(payload) => self.cache.put(&cache_key, &payload).await,
            Err(e) => warn!(ip = %cache_key, error = %e, "Failed to serialize result for cache"),
        }

        self.write_back(&result, raw_contributions).await;

        Ok(result)
    }

    /// Enrich a batch of IP addresses concurrently.
    ///
    /// Each address is enriched independently; one bad input never spoils
    /// the batch. Results come back in input order.
    pub async fn enrich_ips_batch(
        &self,
        ips: &[String],
    ) -> Vec<(String, Result<EnrichmentResult>)> {
        let calls = ips.iter().map(|ip| async move {
            let result = self.enrich_ip(ip).await;
            (ip.clone(), result)
        });
        join_all(calls).await
    }

    /// Enrich one domain name.
    ///
    /// No domain-capable sources exist yet; the call validates the domain
    /// and returns an empty-sources result.
    pub async fn enrich_domain(&self, domain: &str) -> Result<DomainIntelligence> {
        let result = DomainIntelligence::new(domain)?;
        debug!(domain, "Domain enrichment requested; no domain sources registered");
        Ok(result)
    }

    /// Correlate a set of indicators; see [`CorrelationEngine`].
    pub async fn correlate_indicators(&self, indicators: &[String]) -> Result<CorrelationResult> {
        self.correlation.correlate(indicators).await
    }

    pub fn get_available_sources(&self) -> Vec<SourceId> {
        self.registry.available_sources()
    }

    /// Status of every configured source, keyed by source id
    pub async fn get_source_status(&self) -> BTreeMap<String, SourceStatus> {
        let mut status = BTreeMap::new();

        for (name, source_config) in &self.config.sources {
            let Ok(id) = name.parse::<SourceId>() else {
                continue;
            };

            status.insert(
                id.to_string(),
                SourceStatus {
                    enabled: source_config.enabled,
                    client_type: self
                        .registry
                        .get(id)
                        .map(|client| client.client_type().to_string()),
                    confidence_weight: source_config.confidence_weight,
                    rate_limit_tracker: self.rate_limiter.snapshot(id).await,
                },
            );
        }

        status
    }

    pub async fn get_cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics().await
    }

    /// Fan out to the registered sources concurrently.
    ///
    /// Each call is rate-limit-checked at the point of issue and bounded by
    /// the request timeout; refusals and failures come back as `Failed` so
    /// the join never aborts the enrichment.
    async fn query_sources(
        &self,
        ip: std::net::IpAddr,
    ) -> Vec<(SourceId, f64, SourceOutcome)> {
        let timeout = self.config.request_timeout();
        let max_sources = self.config.correlation.max_sources_per_query as usize;

        let calls = self.registry.iter().take(max_sources).map(|(id, client)| {
            let id = *id;
            let client = client.clone();
            let rate_limiter = self.rate_limiter.clone();
            async move {
                let confidence = client.confidence();

                if let Err(e) = rate_limiter.check(id).await {
                    return (id, confidence, SourceOutcome::Failed(e.to_string()));
                }

                match tokio::time::timeout(timeout, client.ip_reputation(ip)).await {
                    Ok(Ok(outcome)) => (id, confidence, outcome),
                    Ok(Err(e)) => (id, confidence, SourceOutcome::Failed(e.to_string())),
                    Err(_) => (
                        id,
                        confidence,
                        SourceOutcome::Failed(format!(
                            "timed out after {}s",
                            timeout.as_secs()
                        )),
                    ),
                }
            }
        });

        join_all(calls).await
    }

    /// Merge per-source outcomes into the result.
    ///
    /// Weighted combination: each contributing source's threat score is
    /// `100 - reputation`, weighted by that source's confidence. A source
    /// with no usable score still counts toward the aggregate confidence —
    /// a missing score is not evidence of safety and never becomes zero.
    /// Returns the raw per-source contributions for write-back.
    fn aggregate(
        &self,
        result: &mut EnrichmentResult,
        outcomes: Vec<(SourceId, f64, SourceOutcome)>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        let mut raw_contributions = HashMap::new();
        let mut labels: Vec<String> = Vec::new();

        let mut score_acc = 0.0;
        let mut score_weight = 0.0;
        let mut confidence_acc = 0.0;
        let mut confidence_weight = 0.0;

        for (id, confidence, outcome) in outcomes {
            match outcome {
                SourceOutcome::Data(report) => {
                    result.sources_queried.push(id);
                    confidence_acc += confidence * confidence;
                    confidence_weight += confidence;

                    if let Some(reputation) = report.reputation_score {
                        let threat = (100.0 - reputation).clamp(0.0, 100.0);
                        score_acc += confidence * threat;
                        score_weight += confidence;
                    }

                    labels.extend(report.attack_types.iter().cloned());
                    labels.extend(report.tags.iter().cloned());

                    if let Some(country) = &report.country {
                        result
                            .geographic_data
                            .entry("country".to_string())
                            .or_insert_with(|| country.clone());
                    }
                    if let Some(asn) = &report.asn {
                        result
                            .network_data
                            .entry("asn".to_string())
                            .or_insert_with(|| asn.clone());
                    }
                    if let Some(org) = &report.organization {
                        result
                            .network_data
                            .entry("organization".to_string())
                            .or_insert_with(|| org.clone());
                    }

                    raw_contributions.insert(id.to_string(), report.raw);
                }
                SourceOutcome::NoData => {
                    result.sources_queried.push(id);
                    confidence_acc += confidence * confidence;
                    confidence_weight += confidence;
                    raw_contributions.insert(id.to_string(), serde_json::Value::Null);
                }
                SourceOutcome::Failed(reason) => {
                    warn!(source = %id, reason = %reason, "Source excluded from enrichment");
                }
            }
        }

        if score_weight > 0.0 {
            result.overall_threat_score = Some(score_acc / score_weight);
        }
        if confidence_weight > 0.0 {
            result.confidence_score = confidence_acc / confidence_weight;
        }

        result.threat_indicators = indicators::deduplicate(&labels);
        result.query_timestamp = Utc::now();
        result.validate()?;

        info!(
            ip = %result.ip_address,
            threat_score = ?result.overall_threat_score,
            confidence = result.confidence_score,
            sources = result.sources_queried.len(),
            "Enrichment aggregated"
        );

        Ok(raw_contributions)
    }

    /// Best-effort write-back; failures are logged and swallowed.
    async fn write_back(
        &self,
        result: &EnrichmentResult,
        raw_contributions: HashMap<String, serde_json::Value>,
    ) {
        if !self.config.writeback.enabled {
            return;
        }
        let Some(sink) = &self.writeback else {
            return;
        };

        let now = Utc::now();
        let document = EnrichmentDocument::from_result(result, raw_contributions, now);
        let index = writeback::index_name(&self.config.writeback.index_prefix, now);
        let id = writeback::document_id(&document.indicator, now);

        if let Err(e) = sink.index(&index, &id, &document).await {
            warn!(index = %index, id = %id, error = %e, "Write-back failed; enrichment unaffected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceReport;
    use crate::sources::ReputationSource;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scriptable in-process source for orchestrator tests
    struct MockSource {
        id: SourceId,
        confidence: f64,
        outcome: Mutex<SourceOutcome>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn new(id: SourceId, confidence: f64, outcome: SourceOutcome) -> Self {
            Self {
                id,
                confidence,
                outcome: Mutex::new(outcome),
                calls: AtomicUsize::new(0),
            }
        }

        fn reporting(reputation: Option<f64>) -> Self {
            Self::new(
                SourceId::Dshield,
                0.8,
                SourceOutcome::Data(SourceReport {
                    reputation_score: reputation,
                    ..SourceReport::default()
                }),
            )
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

        async fn ip_reputation(&self, _ip: IpAddr) -> crate::error::Result<SourceOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.lock().unwrap().clone())
        }
    }

    fn manager_with(sources: Vec<Arc<dyn ReputationSource>>) -> EnrichmentManager {
        let mut config = Config::default();
        config.cache.persistent.enabled = false;
        config.writeback.enabled = false;

        let mut registry = SourceRegistry::empty();
        for source in sources {
            registry.register(source);
        }

        let rate_limiter = Arc::new(RateLimiter::new(HashMap::new()));
        let cache = Arc::new(TwoTierCache::new(Duration::from_secs(3600), 100, None));
        EnrichmentManager::new(config, registry, rate_limiter, cache, None)
    }

    #[tokio::test]
    async fn threat_score_is_inverted_reputation() {
        let manager = manager_with(vec![Arc::new(MockSource::reporting(Some(85.0)))]);
        let result = manager.enrich_ip("8.8.8.8").await.unwrap();

        assert!((result.overall_threat_score.unwrap() - 15.0).abs() < 1e-9);
        assert!((result.confidence_score - 0.8).abs() < 1e-9);
        assert_eq!(result.sources_queried, vec![SourceId::Dshield]);
        assert!(!result.cache_hit);
    }

    #[tokio::test]
    async fn missing_reputation_leaves_score_unset() {
        let manager = manager_with(vec![Arc::new(MockSource::reporting(None))]);
        let result = manager.enrich_ip("203.0.113.1").await.unwrap();

        assert_eq!(result.overall_threat_score, None);
        assert!((result.confidence_score - 0.8).abs() < 1e-9);
        assert_eq!(result.sources_queried, vec![SourceId::Dshield]);
    }

    #[tokio::test]
    async fn invalid_ip_rejected_before_any_source_call() {
        let source = Arc::new(MockSource::reporting(Some(50.0)));
        let manager = manager_with(vec![source.clone()]);

        let err = manager.enrich_ip("invalid_ip").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::InvalidInput(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_sources_is_a_request_failure() {
        let manager = manager_with(vec![]);
        let err = manager.enrich_ip("8.8.8.8").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::NoSourcesAvailable));
    }

    #[tokio::test]
    async fn second_call_hits_the_cache() {
        let source = Arc::new(MockSource::reporting(Some(50.0)));
        let manager = manager_with(vec![source.clone()]);

        let first = manager.enrich_ip("192.0.2.1").await.unwrap();
        assert!(!first.cache_hit);

        let second = manager.enrich_ip("192.0.2.1").await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.overall_threat_score, first.overall_threat_score);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_source_is_omitted_not_fatal() {
        let good = Arc::new(MockSource::reporting(Some(40.0)));
        let bad = Arc::new(MockSource::new(
            SourceId::Virustotal,
            0.9,
            SourceOutcome::Failed("connection refused".to_string()),
        ));
        let manager = manager_with(vec![good, bad]);

        let result = manager.enrich_ip("198.51.100.7").await.unwrap();
        assert_eq!(result.sources_queried, vec![SourceId::Dshield]);
        assert!((result.overall_threat_score.unwrap() - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn multiple_sources_combine_with_confidence_weights() {
        let a = Arc::new(MockSource::new(
            SourceId::Dshield,
            0.8,
            SourceOutcome::Data(SourceReport {
                reputation_score: Some(80.0), // threat 20
                ..SourceReport::default()
            }),
        ));
        let b = Arc::new(MockSource::new(
            SourceId::Virustotal,
            0.4,
            SourceOutcome::Data(SourceReport {
                reputation_score: Some(20.0), // threat 80
                ..SourceReport::default()
            }),
        ));
        let manager = manager_with(vec![a, b]);

        let result = manager.enrich_ip("198.51.100.8").await.unwrap();
        // (0.8*20 + 0.4*80) / 1.2 = 40
        let score = result.overall_threat_score.unwrap();
        assert!((score - 40.0).abs() < 1e-9);
        // Confidence-weighted average of (0.8, 0.4): (0.64 + 0.16) / 1.2
        assert!((result.confidence_score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.sources_queried.len(), 2);
    }

    #[tokio::test]
    async fn geo_and_network_fields_are_first_writer_wins() {
        let a = Arc::new(MockSource::new(
            SourceId::Dshield,
            0.8,
            SourceOutcome::Data(SourceReport {
                reputation_score: Some(85.0),
                country: Some("US".to_string()),
                asn: Some("AS15169".to_string()),
                organization: Some("Google LLC".to_string()),
                attack_types: vec!["port_scan".to_string(), "brute_force".to_string()],
                tags: vec!["malicious".to_string(), "scanner".to_string()],
                ..SourceReport::default()
            }),
        ));
        let b = Arc::new(MockSource::new(
            SourceId::Virustotal,
            0.9,
            SourceOutcome::Data(SourceReport {
                country: Some("DE".to_string()),
                ..SourceReport::default()
            }),
        ));
        let manager = manager_with(vec![a, b]);

        let result = manager.enrich_ip("8.8.4.4").await.unwrap();
        // Registry order is SourceId order; dshield writes first
        assert_eq!(result.geographic_data.get("country").unwrap(), "US");
        assert_eq!(result.network_data.get("asn").unwrap(), "AS15169");
        assert_eq!(result.network_data.get("organization").unwrap(), "Google LLC");
        assert!(!result.threat_indicators.is_empty());
    }

    #[tokio::test]
    async fn rate_limited_source_is_skipped() {
        let mut limits = HashMap::new();
        limits.insert(SourceId::Dshield, 0u32);

        let mut config = Config::default();
        config.cache.persistent.enabled = false;

        let mut registry = SourceRegistry::empty();
        registry.register(Arc::new(MockSource::reporting(Some(50.0))));

        let manager = EnrichmentManager::new(
            config,
            registry,
            Arc::new(RateLimiter::new(limits)),
            Arc::new(TwoTierCache::new(Duration::from_secs(3600), 100, None)),
            None,
        );

        let result = manager.enrich_ip("192.0.2.55").await.unwrap();
        assert!(result.sources_queried.is_empty());
        assert_eq!(result.overall_threat_score, None);
    }

    #[tokio::test]
    async fn domain_enrichment_is_a_validated_stub() {
        let manager = manager_with(vec![Arc::new(MockSource::reporting(Some(50.0)))]);

        let result = manager.enrich_domain("example.com").await.unwrap();
        assert_eq!(result.domain, "example.com");
        assert!(result.sources_queried.is_empty());

        assert!(manager.enrich_domain("").await.is_err());
        assert!(manager.enrich_domain("nodots").await.is_err());
    }

    #[tokio::test]
    async fn source_status_reports_configured_sources() {
        let manager = manager_with(vec![Arc::new(MockSource::reporting(Some(50.0)))]);
        let status = manager.get_source_status().await;

        let dshield = status.get("dshield").unwrap();
        assert!(dshield.enabled);
        assert_eq!(dshield.client_type.as_deref(), Some("MockSource"));
        assert_eq!(dshield.confidence_weight, 0.8);
        assert_eq!(dshield.rate_limit_tracker.requests_in_window, 0);
    }
}
