//! Data model for enrichment results, source reports, and correlation output

use crate::error::{EnrichmentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// Identifiers of the threat intelligence sources known to the platform.
///
/// Only DShield currently ships a client implementation; the remaining
/// sources are recognized in configuration and status reporting but are
/// never registered until a client lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Dshield,
    Virustotal,
    Shodan,
    Abuseipdb,
    Alienvault,
    Threatfox,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Dshield => "dshield",
            SourceId::Virustotal => "virustotal",
            SourceId::Shodan => "shodan",
            SourceId::Abuseipdb => "abuseipdb",
            SourceId::Alienvault => "alienvault",
            SourceId::Threatfox => "threatfox",
        }
    }

    pub fn all() -> &'static [SourceId] {
        &[
            SourceId::Dshield,
            SourceId::Virustotal,
            SourceId::Shodan,
            SourceId::Abuseipdb,
            SourceId::Alienvault,
            SourceId::Threatfox,
        ]
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dshield" => Ok(SourceId::Dshield),
            "virustotal" => Ok(SourceId::Virustotal),
            "shodan" => Ok(SourceId::Shodan),
            "abuseipdb" => Ok(SourceId::Abuseipdb),
            "alienvault" => Ok(SourceId::Alienvault),
            "threatfox" => Ok(SourceId::Threatfox),
            other => Err(EnrichmentError::invalid_input(format!(
                "Unknown source identifier: {}",
                other
            ))),
        }
    }
}

/// Threat level bucketing derived from a source reputation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl ThreatLevel {
    /// High at reputation >= 80, medium at >= 50, else low
    pub fn from_reputation(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= 80.0 => ThreatLevel::High,
            Some(s) if s >= 50.0 => ThreatLevel::Medium,
            Some(_) => ThreatLevel::Low,
            None => ThreatLevel::Unknown,
        }
    }
}

/// Normalized payload returned by a source client for one indicator.
///
/// Any field may be absent; absence must never be treated as a zero score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceReport {
    pub reputation_score: Option<f64>,
    pub country: Option<String>,
    pub asn: Option<String>,
    pub organization: Option<String>,
    #[serde(default)]
    pub attack_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl SourceReport {
    pub fn threat_level(&self) -> ThreatLevel {
        ThreatLevel::from_reputation(self.reputation_score)
    }

    /// True when the report carries nothing usable for aggregation
    pub fn is_empty(&self) -> bool {
        self.reputation_score.is_none()
            && self.country.is_none()
            && self.asn.is_none()
            && self.organization.is_none()
            && self.attack_types.is_empty()
            && self.tags.is_empty()
    }
}

/// Outcome of a single source call, kept explicit so aggregation can tell
/// "no score available" apart from "score is zero" and from hard failure.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// The source answered with usable fields
    Data(SourceReport),
    /// The source answered but knows nothing about the indicator
    NoData,
    /// The call failed (transport error, timeout, non-2xx)
    Failed(String),
}

/// Classification tag assigned to a raw indicator string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    IpAddress,
    Domain,
    Hash,
    Cve,
    Generic,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::IpAddress => "ip_address",
            IndicatorKind::Domain => "domain",
            IndicatorKind::Hash => "hash",
            IndicatorKind::Cve => "cve",
            IndicatorKind::Generic => "generic",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deduplicated indicator label with its classification and occurrence count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatIndicator {
    pub indicator: String,
    pub kind: IndicatorKind,
    pub count: usize,
}

/// Aggregated enrichment verdict for one IP address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub ip_address: IpAddr,
    /// Weighted threat score in [0, 100]; None when no source yielded a
    /// usable reputation score — a missing score is not evidence of safety
    pub overall_threat_score: Option<f64>,
    /// Weighted-average confidence of the sources that responded, in [0, 1]
    pub confidence_score: f64,
    pub sources_queried: Vec<SourceId>,
    pub threat_indicators: Vec<ThreatIndicator>,
    pub geographic_data: HashMap<String, String>,
    pub network_data: HashMap<String, String>,
    pub query_timestamp: DateTime<Utc>,
    pub cache_hit: bool,
}

impl EnrichmentResult {
    /// Construct an empty result for a validated IP address string.
    ///
    /// Fails with `InvalidInput` when the string does not parse as an
    /// IPv4/IPv6 address; this runs before any cache or source access.
    pub fn new(ip: &str) -> Result<Self> {
        let ip_address: IpAddr = ip
            .parse()
            .map_err(|_| EnrichmentError::invalid_input(format!("Invalid IP address: {}", ip)))?;

        Ok(Self {
            ip_address,
            overall_threat_score: None,
            confidence_score: 0.0,
            sources_queried: Vec::new(),
            threat_indicators: Vec::new(),
            geographic_data: HashMap::new(),
            network_data: HashMap::new(),
            query_timestamp: Utc::now(),
            cache_hit: false,
        })
    }

    /// Enforce the numeric invariants on score fields
    pub fn validate(&self) -> Result<()> {
        if let Some(score) = self.overall_threat_score {
            if !(0.0..=100.0).contains(&score) {
                return Err(EnrichmentError::invalid_input(
                    "Overall threat score must be between 0 and 100",
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(EnrichmentError::invalid_input(
                "Confidence score must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Enrichment verdict for one domain name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainIntelligence {
    pub domain: String,
    pub threat_score: Option<f64>,
    pub reputation_score: Option<f64>,
    pub sources_queried: Vec<SourceId>,
    pub query_timestamp: DateTime<Utc>,
    pub cache_hit: bool,
}

impl DomainIntelligence {
    /// Construct an empty result for a validated domain name.
    ///
    /// A domain must be non-empty and contain at least one dot.
    pub fn new(domain: &str) -> Result<Self> {
        if domain.is_empty() || !domain.contains('.') {
            return Err(EnrichmentError::invalid_input(format!(
                "Invalid domain: {}",
                domain
            )));
        }

        Ok(Self {
            domain: domain.to_string(),
            threat_score: None,
            reputation_score: None,
            sources_queried: Vec::new(),
            query_timestamp: Utc::now(),
            cache_hit: false,
        })
    }

    pub fn validate(&self) -> Result<()> {
        for score in [self.threat_score, self.reputation_score].into_iter().flatten() {
            if !(0.0..=100.0).contains(&score) {
                return Err(EnrichmentError::invalid_input(
                    "Score must be between 0 and 100",
                ));
            }
        }
        Ok(())
    }
}

/// Kinds of relationships the correlation engine surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    SharedCategory,
    SharedAsn,
    SharedCountry,
    RepeatedIndicator,
}

/// A single relationship between two or more indicators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    /// Canonical (deduplicated) indicator values participating
    pub indicators: Vec<String>,
    /// Human-readable detail, e.g. the shared ASN
    pub detail: String,
    /// Heuristic strength in [0, 1]
    pub strength: f64,
}

/// Result of correlating a set of indicators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub correlation_id: Uuid,
    /// The input list verbatim, not deduplicated
    pub indicators: Vec<String>,
    /// Deduplicated groups keyed by classification tag
    pub correlations: HashMap<String, Vec<ThreatIndicator>>,
    pub relationships: Vec<Relationship>,
    pub confidence_score: f64,
}
