//! Per-source sliding-window rate limiting
//!
//! Each source keeps an ordered list of request timestamps inside a trailing
//! one-minute window. A check prunes expired timestamps, refuses the call
//! when the window is full (without recording the attempt), and records the
//! timestamp otherwise. Checks run immediately before each network call so
//! concurrent enrichments sharing a source serialize against the same limit.

use crate::error::{EnrichmentError, Result};
use crate::models::SourceId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

const WINDOW_SECS: i64 = 60;

/// Observability snapshot of one source's tracker
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub limit_per_minute: u32,
    pub window_secs: i64,
    pub requests_in_window: usize,
    pub remaining: u32,
}

pub struct RateLimiter {
    limits: HashMap<SourceId, u32>,
    trackers: Mutex<HashMap<SourceId, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(limits: HashMap<SourceId, u32>) -> Self {
        Self {
            limits,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    fn limit_for(&self, source: SourceId) -> u32 {
        self.limits.get(&source).copied().unwrap_or(60)
    }

    /// Gate one outbound call to `source`.
    ///
    /// Prunes timestamps older than the window, then either refuses with
    /// `RateLimitExceeded` (tracker untouched) or records the call time.
    pub async fn check(&self, source: SourceId) -> Result<()> {
        let limit = self.limit_for(source);
        let now = Utc::now();
        let cutoff = now - Duration::seconds(WINDOW_SECS);

        let mut trackers = self.trackers.lock().await;
        let tracker = trackers.entry(source).or_default();
        tracker.retain(|t| *t > cutoff);

        if tracker.len() >= limit as usize {
            warn!(source = %source, limit, "Rate limit exceeded");
            return Err(EnrichmentError::RateLimitExceeded {
                source_name: source.to_string(),
            });
        }

        tracker.push(now);
        Ok(())
    }

    /// Current tracker state for one source, for status reporting only
    pub async fn snapshot(&self, source: SourceId) -> RateLimitSnapshot {
        let limit = self.limit_for(source);
        let cutoff = Utc::now() - Duration::seconds(WINDOW_SECS);

        let trackers = self.trackers.lock().await;
        let in_window = trackers
            .get(&source)
            .map(|t| t.iter().filter(|ts| **ts > cutoff).count())
            .unwrap_or(0);

        RateLimitSnapshot {
            limit_per_minute: limit,
            window_secs: WINDOW_SECS,
            requests_in_window: in_window,
            remaining: limit.saturating_sub(in_window as u32),
        }
    }
}
