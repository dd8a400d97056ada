//! Indicator classification and deduplication
//!
//! Classification is a cheap, order-sensitive set of structural tests, not
//! exhaustive parsing: IP address, 32-char hex hash, CVE id, hostname-shaped
//! domain, generic fallback.

use crate::models::{IndicatorKind, ThreatIndicator};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::net::IpAddr;

static HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9A-Fa-f])([0-9A-Fa-f]{32})(?:[^0-9A-Fa-f]|$)").unwrap());

static CVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,}\b").unwrap());

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9_-]*[A-Za-z0-9])?)+$")
        .unwrap()
});

/// Classify a raw indicator string.
///
/// The tests run in a fixed order; the first match wins.
pub fn classify(indicator: &str) -> IndicatorKind {
    let trimmed = indicator.trim();

    if trimmed.parse::<IpAddr>().is_ok() {
        return IndicatorKind::IpAddress;
    }

    if HASH_RE.is_match(trimmed) {
        return IndicatorKind::Hash;
    }

    if CVE_RE.is_match(trimmed) {
        return IndicatorKind::Cve;
    }

    if trimmed.contains('.') && HOSTNAME_RE.is_match(trimmed) {
        return IndicatorKind::Domain;
    }

    IndicatorKind::Generic
}

/// Collapse case-insensitive duplicates into groups with occurrence counts.
///
/// Indicators are grouped by lower-cased value; the lower-cased value is the
/// canonical representative and the count covers all case variants. Group
/// order follows first occurrence in the input.
pub fn deduplicate(indicators: &[String]) -> Vec<ThreatIndicator> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for indicator in indicators {
        let key = indicator.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let entry = counts.entry(key.clone()).or_insert(0);
        if *entry == 0 {
            order.push(key);
        }
        *entry += 1;
    }

    order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            let kind = classify(&value);
            ThreatIndicator {
                indicator: value,
                kind,
                count,
            }
        })
        .collect()
}
