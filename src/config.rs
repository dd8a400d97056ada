//! Configuration module for the threat enrichment service
//! Handles source enablement, rate limits, cache tiers, and write-back settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the enrichment service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-source client configuration, keyed by source identifier
    pub sources: BTreeMap<String, SourceConfig>,
    /// Correlation engine settings
    pub correlation: CorrelationConfig,
    /// Two-tier cache settings
    pub cache: CacheConfig,
    /// Best-effort write-back sink settings
    pub writeback: WriteBackConfig,
    /// Outbound HTTP settings shared by source clients
    pub http: HttpConfig,
}

/// Configuration for a single intelligence source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Whether this source participates in enrichment
    pub enabled: bool,
    /// Maximum requests per trailing one-minute window
    pub rate_limit_requests_per_minute: u32,
    /// Base URL of the source API
    pub base_url: String,
    /// Optional API key, sent as a bearer token when present
    pub api_key: Option<String>,
    /// Default confidence weight for scores reported by this source
    pub confidence_weight: f64,
}

/// Correlation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Minimum aggregate confidence for a correlation to be considered strong
    pub confidence_threshold: f64,
    /// Maximum number of sources consulted per enrichment query
    pub max_sources_per_query: u32,
}

/// Two-tier cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memory-tier TTL in hours
    pub ttl_hours: u64,
    /// Maximum number of entries held in the memory tier
    pub max_entries: usize,
    /// Persistent tier settings
    pub persistent: PersistentCacheConfig,
}

/// Persistent (SQLite) cache tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentCacheConfig {
    /// Whether the persistent tier is enabled
    pub enabled: bool,
    /// Persistent-tier TTL in hours, independent of the memory tier
    pub ttl_hours: u64,
    /// Path of the SQLite database file
    pub path: PathBuf,
}

/// Write-back sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteBackConfig {
    /// Whether enrichment results are indexed into the sink
    pub enabled: bool,
    /// Base URL of the target store
    pub url: String,
    /// Index name prefix; the write month is appended as `{prefix}-YYYY.MM`
    pub index_prefix: String,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Overall per-source request timeout in seconds
    pub request_timeout_secs: u64,
    /// User-Agent header sent to source APIs
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut sources = BTreeMap::new();
        sources.insert("dshield".to_string(), SourceConfig::default());
        Self {
            sources,
            correlation: CorrelationConfig::default(),
            cache: CacheConfig::default(),
            writeback: WriteBackConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_requests_per_minute: 60,
            base_url: "https://dshield.org/api".to_string(),
            api_key: None,
            confidence_weight: 0.8,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_sources_per_query: 3,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 1,
            max_entries: 1000,
            persistent: PersistentCacheConfig::default(),
        }
    }
}

impl Default for PersistentCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24,
            path: PathBuf::from("enrichment_cache.sqlite3"),
        }
    }
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:9200".to_string(),
            index_prefix: "enrichment-intel".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: "siem-threat-enrichment/0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("DSHIELD_API_URL") {
            if let Some(dshield) = config.sources.get_mut("dshield") {
                dshield.base_url = url;
            }
        }

        if let Ok(key) = std::env::var("DSHIELD_API_KEY") {
            if let Some(dshield) = config.sources.get_mut("dshield") {
                dshield.api_key = Some(key);
            }
        }

        if let Ok(path) = std::env::var("ENRICHMENT_CACHE_PATH") {
            config.cache.persistent.path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("WRITEBACK_URL") {
            config.writeback.url = url;
            config.writeback.enabled = true;
        }

        if let Ok(timeout) = std::env::var("ENRICHMENT_REQUEST_TIMEOUT_SECS") {
            config.http.request_timeout_secs = timeout
                .parse()
                .context("Invalid ENRICHMENT_REQUEST_TIMEOUT_SECS")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, source) in &self.sources {
            if source.enabled && source.rate_limit_requests_per_minute == 0 {
                return Err(anyhow::anyhow!(
                    "Source '{}' is enabled with a zero rate limit",
                    name
                ));
            }
            if !(0.0..=1.0).contains(&source.confidence_weight) {
                return Err(anyhow::anyhow!(
                    "Source '{}' confidence_weight must be between 0 and 1",
                    name
                ));
            }
            if source.enabled && source.base_url.is_empty() {
                return Err(anyhow::anyhow!("Source '{}' base_url cannot be empty", name));
            }
        }

        if !(0.0..=1.0).contains(&self.correlation.confidence_threshold) {
            return Err(anyhow::anyhow!(
                "Correlation confidence_threshold must be between 0 and 1"
            ));
        }

        if self.correlation.max_sources_per_query == 0 {
            return Err(anyhow::anyhow!("max_sources_per_query cannot be 0"));
        }

        if self.cache.max_entries == 0 {
            return Err(anyhow::anyhow!("Cache max_entries cannot be 0"));
        }

        if self.cache.ttl_hours == 0 {
            return Err(anyhow::anyhow!("Cache ttl_hours cannot be 0"));
        }

        if self.cache.persistent.enabled && self.cache.persistent.ttl_hours == 0 {
            return Err(anyhow::anyhow!("Persistent cache ttl_hours cannot be 0"));
        }

        if self.writeback.enabled {
            if self.writeback.url.is_empty() {
                return Err(anyhow::anyhow!("Write-back url cannot be empty"));
            }
            if self.writeback.index_prefix.is_empty() {
                return Err(anyhow::anyhow!("Write-back index_prefix cannot be empty"));
            }
        }

        if self.http.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout cannot be 0"));
        }

        Ok(())
    }

    /// Get the memory-tier TTL as a Duration
    pub fn memory_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_hours * 3600)
    }

    /// Get the persistent-tier TTL as a Duration
    pub fn persistent_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.persistent.ttl_hours * 3600)
    }

    /// Get the per-source request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}
