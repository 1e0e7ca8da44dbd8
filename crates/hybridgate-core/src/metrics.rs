use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::category::RequestCategory;
use crate::keys::RequestId;
use crate::record::RecordSource;

/// Process-wide request counters.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    validation_failures: AtomicU64,
    hybrid_responses: AtomicU64,
    rate_limit_fallbacks: AtomicU64,
    circuit_fallbacks: AtomicU64,
    upstream_errors: AtomicU64,
    system_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub validation_failures: u64,
    pub hybrid_responses: u64,
    pub rate_limit_fallbacks: u64,
    pub circuit_fallbacks: u64,
    pub upstream_errors: u64,
    pub system_errors: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        bump(&self.requests);
    }

    pub fn record_cache_hit(&self) {
        bump(&self.cache_hits);
    }

    pub fn record_validation_failure(&self) {
        bump(&self.validation_failures);
    }

    pub fn record_hybrid(&self) {
        bump(&self.hybrid_responses);
    }

    pub fn record_rate_limit_fallback(&self) {
        bump(&self.rate_limit_fallbacks);
    }

    pub fn record_circuit_fallback(&self) {
        bump(&self.circuit_fallbacks);
    }

    pub fn record_upstream_error(&self) {
        bump(&self.upstream_errors);
    }

    pub fn record_system_error(&self) {
        bump(&self.system_errors);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            hybrid_responses: self.hybrid_responses.load(Ordering::Relaxed),
            rate_limit_fallbacks: self.rate_limit_fallbacks.load(Ordering::Relaxed),
            circuit_fallbacks: self.circuit_fallbacks.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            system_errors: self.system_errors.load(Ordering::Relaxed),
        }
    }
}

/// One handled request, as written to the usage journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub request_id: RequestId,
    pub category: RequestCategory,
    pub started_at: String,
    pub status_code: u16,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RecordSource>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = GatewayMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_cache_hit();
        metrics.record_upstream_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.upstream_errors, 1);
        assert_eq!(snapshot.system_errors, 0);
    }
}
