//! Enrichment decision, premium fetch and merge.
//!
//! ```text
//! baseline ──▶ enabled? ──▶ quota? ──▶ breaker? ──▶ fetch fields ──▶ overlay ──▶ score
//!                 │            │           │              │
//!                 └────────────┴───────────┴──────────────┴──▶ baseline only
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::category::RequestCategory;
use crate::circuit_breaker::CircuitBreaker;
use crate::confidence;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::providers::PremiumProvider;
use crate::rate_limiter::RateLimiter;
use crate::record::{BasicInfo, DataFreshness, FusedRecord, PremiumDocument, RecordSource};
use crate::request::{EnrichmentField, LookupRequest};

/// Why the record is, or is not, enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentStatus {
    /// Enrichment disabled or no fields named.
    NotRequested,
    /// The named category has no quota left in its window.
    RateLimited { category: RequestCategory },
    /// The breaker refused the call.
    CircuitOpen,
    /// A premium call failed or timed out; the breaker has been told.
    UpstreamFailed {
        kind: ProviderErrorKind,
        message: String,
    },
    /// All calls succeeded but the provider had no document for any field.
    /// The record stays baseline-only; the calls still count against quota.
    NoPremiumData,
    /// All calls succeeded. `fields` lists the documents actually merged.
    Enriched { fields: Vec<EnrichmentField> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutcome {
    pub record: FusedRecord,
    pub status: EnrichmentStatus,
}

/// Merges baseline records with guarded premium sub-documents.
///
/// The engine only reads the rate limiter; counting a completed enrichment is
/// the orchestrator's job, so a logical request is counted once.
#[derive(Debug, Clone)]
pub struct DataFusionEngine {
    premium: Arc<dyn PremiumProvider>,
    rate_limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    call_timeout: Duration,
}

impl DataFusionEngine {
    pub fn new(
        premium: Arc<dyn PremiumProvider>,
        rate_limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            premium,
            rate_limiter,
            breaker,
            call_timeout,
        }
    }

    pub fn fuse_baseline(&self, request: &LookupRequest, basic_info: BasicInfo) -> FusedRecord {
        let mut record = FusedRecord::baseline(request.target_key.clone(), basic_info);
        record.confidence_score = confidence::score(&record);
        record
    }

    pub async fn fuse(
        &self,
        category: RequestCategory,
        request: &LookupRequest,
        basic_info: BasicInfo,
    ) -> FusionOutcome {
        let baseline = self.fuse_baseline(request, basic_info);

        if !request.enrichment.enabled || request.enrichment.fields.is_empty() {
            return FusionOutcome {
                record: baseline,
                status: EnrichmentStatus::NotRequested,
            };
        }

        for gate in [RequestCategory::Premium, category] {
            if !self.rate_limiter.allow(gate) {
                return FusionOutcome {
                    record: baseline,
                    status: EnrichmentStatus::RateLimited { category: gate },
                };
            }
        }

        let Some(permit) = self.breaker.try_acquire() else {
            warn!(target_key = %request.target_key, "circuit open, skipping enrichment");
            return FusionOutcome {
                record: baseline,
                status: EnrichmentStatus::CircuitOpen,
            };
        };

        let mut documents = Vec::with_capacity(request.enrichment.fields.len());
        for field in &request.enrichment.fields {
            match self.fetch_field(*field, request).await {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => debug!(field = %field, "premium provider returned no document"),
                Err(error) => {
                    permit.fail();
                    warn!(
                        field = %field,
                        kind = error.kind().as_str(),
                        error = %error,
                        "premium enrichment failed"
                    );
                    return FusionOutcome {
                        record: baseline,
                        status: EnrichmentStatus::UpstreamFailed {
                            kind: error.kind(),
                            message: error.to_string(),
                        },
                    };
                }
            }
        }
        permit.succeed();

        if documents.is_empty() {
            debug!(target_key = %request.target_key, "no premium documents to merge");
            return FusionOutcome {
                record: baseline,
                status: EnrichmentStatus::NoPremiumData,
            };
        }

        let mut record = baseline;
        let mut fields = Vec::with_capacity(documents.len());
        for document in documents {
            fields.push(document.field());
            record.overlay(document);
        }
        record.source = RecordSource::Hybrid;
        record.data_freshness = DataFreshness::Current;
        record.confidence_score = confidence::score(&record);

        FusionOutcome {
            record,
            status: EnrichmentStatus::Enriched { fields },
        }
    }

    async fn fetch_field(
        &self,
        field: EnrichmentField,
        request: &LookupRequest,
    ) -> Result<Option<PremiumDocument>, ProviderError> {
        match tokio::time::timeout(self.call_timeout, self.premium.fetch(field, request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(format!(
                "{field} call exceeded {}ms",
                self.call_timeout.as_millis()
            ))),
        }
    }
}
