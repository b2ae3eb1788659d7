//! Cache validity evaluation
//!
//! Decides whether the cached response may be served for the current
//! effective parameters or a fresh fetch is required. Parameter drift
//! invalidates the cache regardless of age; an unchanged parameter set is
//! served from cache until the validity window elapses.

use chrono::{DateTime, Utc};

use super::CacheEntry;

/// Outcome of evaluating the cache against the effective parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The cached payload matches and is still fresh; skip the network
    Reuse,
    /// Fetch from the service (no cache, parameter drift, or expired)
    Refetch,
}

/// Evaluates whether the cached entry can satisfy the current request
///
/// `now` is injected by the caller so the decision table is deterministic
/// under test.
pub fn evaluate(
    fingerprint: &str,
    cache: Option<&CacheEntry>,
    now: DateTime<Utc>,
    cache_duration_hours: f64,
) -> Decision {
    let Some(entry) = cache else {
        return Decision::Refetch;
    };
    if entry.parameter_fingerprint != fingerprint {
        return Decision::Refetch;
    }
    let age_seconds = (now - entry.fetched_at).num_seconds() as f64;
    if age_seconds > cache_duration_hours * 3600.0 {
        return Decision::Refetch;
    }
    Decision::Reuse
}
