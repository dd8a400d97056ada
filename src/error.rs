use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnrichmentError>;

/// Error taxonomy for the enrichment core.
///
/// Only `InvalidInput` and `NoSourcesAvailable` surface to callers as
/// request-level failures. Everything else degrades gracefully: failed
/// sources are dropped from `sources_queried`, cache-tier errors become
/// misses, and write-back errors are logged and swallowed.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No threat intelligence sources available")]
    NoSourcesAvailable,

    #[error("Rate limit exceeded for source: {source_name}")]
    RateLimitExceeded { source_name: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Write-back error: {0}")]
    WriteBack(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnrichmentError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        EnrichmentError::InvalidInput(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        EnrichmentError::Cache(msg.into())
    }

    /// True for the two variants that are allowed to reach the caller.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            EnrichmentError::InvalidInput(_) | EnrichmentError::NoSourcesAvailable
        )
    }
}
