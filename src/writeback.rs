//! Best-effort write-back of enrichment results into a searchable store
//!
//! One document per enrichment, indexed under `{prefix}-YYYY.MM` and
//! addressed by `{indicator}_{unix_ts}` so successive writes for the same
//! indicator stay distinct. Enrichment correctness never depends on this
//! sink: every failure here is logged by the caller and swallowed.

use crate::error::{EnrichmentError, Result};
use crate::models::EnrichmentResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Document shape written to the sink
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentDocument {
    pub indicator: String,
    /// `ip` or `domain`
    pub indicator_type: String,
    /// Raw per-source contributions, keyed by source id
    pub sources: HashMap<String, serde_json::Value>,
    /// ISO-8601 write timestamp
    pub timestamp: String,
    pub threat_score: Option<f64>,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub geo: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub network: HashMap<String, String>,
}

impl EnrichmentDocument {
    pub fn from_result(
        result: &EnrichmentResult,
        raw_contributions: HashMap<String, serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            indicator: result.ip_address.to_string(),
            indicator_type: "ip".to_string(),
            sources: raw_contributions,
            timestamp: at.to_rfc3339(),
            threat_score: result.overall_threat_score,
            confidence_score: result.confidence_score,
            tags: result
                .threat_indicators
                .iter()
                .map(|i| i.indicator.clone())
                .collect(),
            geo: result.geographic_data.clone(),
            network: result.network_data.clone(),
        }
    }
}

/// Index name for a write at `at`: `{prefix}-YYYY.MM`
pub fn index_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", prefix, at.format("%Y.%m"))
}

/// Document id for a write at `at`: `{indicator}_{unix_ts}`
pub fn document_id(indicator: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", indicator, at.timestamp())
}

/// Sink that indexes enrichment documents, one call per enrichment
#[async_trait]
pub trait WriteBackSink: Send + Sync {
    async fn index(&self, index: &str, id: &str, document: &EnrichmentDocument) -> Result<()>;
}

/// Elasticsearch-compatible HTTP sink
pub struct ElasticsearchSink {
    http: reqwest::Client,
    base_url: String,
}

impl ElasticsearchSink {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WriteBackSink for ElasticsearchSink {
    async fn index(&self, index: &str, id: &str, document: &EnrichmentDocument) -> Result<()> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let response = self.http.put(&url).json(document).send().await?;

        if !response.status().is_success() {
            return Err(EnrichmentError::WriteBack(format!(
                "Index request returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
