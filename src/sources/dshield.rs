//! DShield threat intelligence client
//!
//! Queries the DShield IP reputation API. A 404 means the IP is unknown to
//! DShield and maps to `NoData`, as does any other non-success status; only
//! transport-level failures surface as errors.

use crate::config::{HttpConfig, SourceConfig};
use crate::error::Result;
use crate::models::{SourceId, SourceOutcome, SourceReport};
use crate::sources::ReputationSource;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use std::net::IpAddr;
use tracing::{debug, info, warn};

pub struct DshieldClient {
    http: reqwest::Client,
    base_url: String,
    confidence: f64,
}

impl DshieldClient {
    pub fn new(config: &SourceConfig, http_config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(agent) = HeaderValue::from_str(&http_config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        if let Some(api_key) = &config.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(http_config.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            confidence: config.confidence_weight,
        })
    }

    /// Map the DShield response body onto the uniform report shape.
    ///
    /// Absent fields stay `None`/empty; a missing `reputation` key must not
    /// become a zero score.
    fn parse_report(data: &serde_json::Value) -> SourceReport {
        let mut report = SourceReport {
            raw: data.clone(),
            ..SourceReport::default()
        };

        report.reputation_score = data.get("reputation").and_then(value_as_f64);
        report.country = data.get("country").and_then(value_as_string);
        report.asn = data.get("as").and_then(value_as_string);
        report.organization = data.get("org").and_then(value_as_string);
        report.attack_types = data
            .get("attacks")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(value_as_string).collect())
            .unwrap_or_default();
        report.tags = data
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(value_as_string).collect())
            .unwrap_or_default();

        report
    }
}

#[async_trait]
impl ReputationSource for DshieldClient {
    fn id(&self) -> SourceId {
        SourceId::Dshield
    }

    fn client_type(&self) -> &'static str {
        "DshieldClient"
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    async fn ip_reputation(&self, ip: IpAddr) -> Result<SourceOutcome> {
        let url = format!("{}/ip/{}", self.base_url, ip);
        debug!(%ip, "Querying DShield IP reputation");

        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let data: serde_json::Value = response.json().await?;
                let report = Self::parse_report(&data);
                info!(%ip, reputation_score = ?report.reputation_score,
                      "DShield reputation retrieved");
                if report.is_empty() {
                    Ok(SourceOutcome::NoData)
                } else {
                    Ok(SourceOutcome::Data(report))
                }
            }
            StatusCode::NOT_FOUND => {
                debug!(%ip, "IP not found in DShield database");
                Ok(SourceOutcome::NoData)
            }
            status => {
                warn!(%ip, %status, "DShield API returned non-success status");
                Ok(SourceOutcome::NoData)
            }
        }
    }
}

fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
