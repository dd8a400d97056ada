//! Correlation engine
//!
//! Classifies and deduplicates a set of indicators, then surfaces
//! relationships: shared classification category, shared network
//! infrastructure (from previously cached enrichments), and repeated
//! occurrence. CPU-bound and single-pass; it reads the enrichment cache but
//! never triggers new source calls.
//!
//! Relationship strengths: shared ASN 0.9, repeated indicator 0.6, shared
//! country 0.5, shared category 0.4. The aggregate confidence is the mean
//! relationship strength scaled by the fraction of indicators participating
//! in at least one relationship.

use crate::cache::TwoTierCache;
use crate::config::CorrelationConfig;
use crate::error::{EnrichmentError, Result};
use crate::indicators;
use crate::models::{
    CorrelationResult, EnrichmentResult, IndicatorKind, Relationship, RelationshipKind,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const STRENGTH_SHARED_ASN: f64 = 0.9;
const STRENGTH_REPEATED: f64 = 0.6;
const STRENGTH_SHARED_COUNTRY: f64 = 0.5;
const STRENGTH_SHARED_CATEGORY: f64 = 0.4;

pub struct CorrelationEngine {
    cache: Arc<TwoTierCache>,
    config: CorrelationConfig,
}

impl CorrelationEngine {
    pub fn new(cache: Arc<TwoTierCache>, config: CorrelationConfig) -> Self {
        Self { cache, config }
    }

    /// Correlate a set of indicators.
    ///
    /// The returned `indicators` list echoes the input verbatim; the result
    /// always carries a correlation id, a relationship list (possibly
    /// empty), and a confidence score in [0, 1].
    pub async fn correlate(&self, input: &[String]) -> Result<CorrelationResult> {
        if input.is_empty() {
            return Err(EnrichmentError::invalid_input(
                "Indicators list cannot be empty",
            ));
        }

        let correlation_id = Uuid::new_v4();
        let deduplicated = indicators::deduplicate(input);

        let mut correlations: HashMap<String, Vec<_>> = HashMap::new();
        for indicator in &deduplicated {
            correlations
                .entry(indicator.kind.as_str().to_string())
                .or_default()
                .push(indicator.clone());
        }

        let mut relationships = Vec::new();

        // Shared classification category
        for (kind, group) in &correlations {
            if group.len() >= 2 {
                relationships.push(Relationship {
                    kind: RelationshipKind::SharedCategory,
                    indicators: group.iter().map(|i| i.indicator.clone()).collect(),
                    detail: format!("{} indicators classified as {}", group.len(), kind),
                    strength: STRENGTH_SHARED_CATEGORY,
                });
            }
        }

        // Repeated occurrence inside the input set
        for indicator in &deduplicated {
            if indicator.count >= 2 {
                relationships.push(Relationship {
                    kind: RelationshipKind::RepeatedIndicator,
                    indicators: vec![indicator.indicator.clone()],
                    detail: format!("seen {} times in the input set", indicator.count),
                    strength: STRENGTH_REPEATED,
                });
            }
        }

        // Shared infrastructure across previously enriched IPs
        let ip_indicators: Vec<&str> = deduplicated
            .iter()
            .filter(|i| i.kind == IndicatorKind::IpAddress)
            .map(|i| i.indicator.as_str())
            .collect();
        relationships.extend(self.infrastructure_relationships(&ip_indicators).await);

        let confidence_score = Self::aggregate_confidence(&deduplicated, &relationships);

        info!(
            %correlation_id,
            indicators = input.len(),
            relationships = relationships.len(),
            confidence = confidence_score,
            strong = confidence_score >= self.config.confidence_threshold,
            "Correlation computed"
        );

        Ok(CorrelationResult {
            correlation_id,
            indicators: input.to_vec(),
            correlations,
            relationships,
            confidence_score,
        })
    }

    /// Group cached enrichments by shared ASN and country.
    ///
    /// Only IPs that were enriched earlier participate; cache misses are
    /// silently skipped.
    async fn infrastructure_relationships(&self, ips: &[&str]) -> Vec<Relationship> {
        let mut by_asn: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut by_country: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for raw_ip in ips {
            let Ok(ip) = raw_ip.parse::<IpAddr>() else {
                continue;
            };

            let Some(payload) = self.cache.get(&ip.to_string()).await else {
                continue;
            };
            let Ok(cached) = serde_json::from_str::<EnrichmentResult>(&payload) else {
                debug!(ip = %ip, "Skipping undecodable cached enrichment");
                continue;
            };

            if let Some(asn) = cached.network_data.get("asn") {
                by_asn.entry(asn.clone()).or_default().push(raw_ip.to_string());
            }
            if let Some(country) = cached.geographic_data.get("country") {
                by_country
                    .entry(country.clone())
                    .or_default()
                    .push(raw_ip.to_string());
            }
        }

        let mut relationships = Vec::new();

        for (asn, members) in by_asn {
            if members.len() >= 2 {
                relationships.push(Relationship {
                    kind: RelationshipKind::SharedAsn,
                    indicators: members,
                    detail: format!("shared ASN {}", asn),
                    strength: STRENGTH_SHARED_ASN,
                });
            }
        }

        for (country, members) in by_country {
            if members.len() >= 2 {
                relationships.push(Relationship {
                    kind: RelationshipKind::SharedCountry,
                    indicators: members,
                    detail: format!("shared country {}", country),
                    strength: STRENGTH_SHARED_COUNTRY,
                });
            }
        }

        relationships
    }

    /// Mean relationship strength, scaled by the fraction of deduplicated
    /// indicators that participate in at least one relationship.
    fn aggregate_confidence(
        deduplicated: &[crate::models::ThreatIndicator],
        relationships: &[Relationship],
    ) -> f64 {
        if relationships.is_empty() || deduplicated.is_empty() {
            return 0.0;
        }

        let strength_sum: f64 = relationships.iter().map(|r| r.strength).sum();
        let mean_strength = strength_sum / relationships.len() as f64;

        let participating: HashSet<&str> = relationships
            .iter()
            .flat_map(|r| r.indicators.iter().map(String::as_str))
            .collect();
        let coverage = participating.len() as f64 / deduplicated.len() as f64;

        (mean_strength * coverage).clamp(0.0, 1.0)
    }
}
