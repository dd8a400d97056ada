//! SIEM Threat Enrichment
//!
//! Multi-source threat intelligence enrichment and correlation core for the
//! SIEM platform. Enriches security indicators (IP addresses, domains) with
//! reputation data from independent intelligence sources, merges per-source
//! scores into one confidence-weighted verdict, and correlates indicator
//! sets to find relationships.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   miss   ┌──────────────┐   gated   ┌────────────────┐
//! │ Two-Tier   │─────────▶│  Enrichment  │──────────▶│ Source Client  │
//! │   Cache    │◀─────────│ Orchestrator │◀──────────│    Registry    │
//! └────────────┘  write   └──────┬───────┘  reports  └────────────────┘
//!       ▲                        │                   ┌────────────────┐
//!       │ reads                  └──── best-effort ─▶│ Write-back Sink│
//! ┌─────┴──────┐                                     └────────────────┘
//! │Correlation │   per-source gating by the sliding-window Rate Limiter
//! │   Engine   │
//! └────────────┘
//! ```
//!
//! Enrichment fans out to every registered source concurrently; a failed or
//! rate-limited source is dropped from the verdict, never fatal. Only
//! invalid input and an empty source registry surface as errors.

pub mod cache;
pub mod config;
pub mod correlation;
pub mod enrichment;
pub mod error;
pub mod indicators;
pub mod models;
pub mod rate_limit;
pub mod sources;
pub mod writeback;

pub use config::Config;
pub use enrichment::EnrichmentManager;
pub use error::{EnrichmentError, Result};
pub use models::{
    CorrelationResult, DomainIntelligence, EnrichmentResult, SourceId, ThreatIndicator,
};
