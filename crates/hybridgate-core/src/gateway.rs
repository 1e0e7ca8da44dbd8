//! Request orchestration: cache, validation, baseline, fusion, accounting.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cache::{CacheEntry, CacheStore, InMemoryCacheStore, ResponseCache};
use crate::category::RequestCategory;
use crate::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::clock::{format_rfc3339, Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::confidence;
use crate::envelope::{
    ErrorResponse, GatewayReply, GatewayResponse, PremiumUsage, ResponseMetadata,
};
use crate::error::{GatewayError, ValidationErrors};
use crate::fusion::{DataFusionEngine, EnrichmentStatus, FusionOutcome};
use crate::journal::UsageJournal;
use crate::keys::{payload_hash, CacheKey, RequestId};
use crate::metrics::{GatewayMetrics, MetricsSnapshot, RequestMetrics};
use crate::providers::{
    BaselineProvider, HttpPremiumProvider, MockBaselineProvider, PremiumProvider,
    SimulatedPremiumProvider,
};
use crate::rate_limiter::{CategoryUsage, InMemoryUsageStore, RateLimiter, UsageStore};
use crate::record::{DataFreshness, RecordSource};
use crate::request::LookupRequest;
use crate::validator::RequestValidator;
use crate::worker_pool::BlockingPool;

/// Quota and breaker state, as served by `GET /usage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub premium: PremiumUsage,
    pub categories: Vec<CategoryUsage>,
    pub circuit: CircuitSnapshot,
    pub cache_entries: usize,
}

/// Builder for [`Gateway`].
///
/// Anything not supplied falls back to the in-memory, offline default:
/// system clock, mock baseline, in-memory stores, and the simulated premium
/// provider unless `premium.base_url` is configured.
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    clock: Option<Arc<dyn Clock>>,
    baseline: Option<Arc<dyn BaselineProvider>>,
    premium: Option<Arc<dyn PremiumProvider>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    usage_store: Option<Arc<dyn UsageStore>>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_baseline(mut self, baseline: Arc<dyn BaselineProvider>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn with_premium(mut self, premium: Arc<dyn PremiumProvider>) -> Self {
        self.premium = Some(premium);
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn with_usage_store(mut self, store: Arc<dyn UsageStore>) -> Self {
        self.usage_store = Some(store);
        self
    }

    pub fn build(self) -> Gateway {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let premium = self.premium.unwrap_or_else(|| premium_from_config(&config));
        let baseline = self
            .baseline
            .unwrap_or_else(|| Arc::new(MockBaselineProvider::new()));

        let usage_store = self
            .usage_store
            .unwrap_or_else(|| Arc::new(InMemoryUsageStore::new()));
        let rate_limiter = Arc::new(RateLimiter::with_store(
            config.rate_limits,
            usage_store,
            Arc::clone(&clock),
        ));
        let breaker = Arc::new(CircuitBreaker::new(
            config.circuit_breaker,
            Arc::clone(&clock),
        ));

        let cache_store = self
            .cache_store
            .unwrap_or_else(|| Arc::new(InMemoryCacheStore::new()));
        let cache = ResponseCache::with_store(cache_store, config.cache.ttl(), Arc::clone(&clock));

        let fusion = DataFusionEngine::new(
            Arc::clone(&premium),
            Arc::clone(&rate_limiter),
            Arc::clone(&breaker),
            config.premium.timeout(),
        );

        let journal = config.usage_journal.as_ref().map(|path| {
            UsageJournal::new(path.clone(), BlockingPool::new(config.worker_pool_size))
        });

        info!(
            baseline = baseline.name(),
            premium = premium.name(),
            cache_ttl_secs = config.cache.ttl_secs,
            journal = journal.is_some(),
            "gateway ready"
        );

        Gateway {
            validator: RequestValidator::new(),
            baseline,
            fusion,
            rate_limiter,
            breaker,
            cache,
            metrics: GatewayMetrics::new(),
            journal,
            clock,
            config,
        }
    }
}

fn premium_from_config(config: &GatewayConfig) -> Arc<dyn PremiumProvider> {
    match config.premium.base_url.as_deref() {
        Some(base_url) if config.premium.is_live() => Arc::new(HttpPremiumProvider::new(
            base_url,
            config.premium.api_key.clone(),
            config.premium.timeout(),
        )),
        _ => Arc::new(SimulatedPremiumProvider::new()),
    }
}

/// The gateway orchestrator.
///
/// One [`Gateway::handle`] call walks these steps strictly in order:
///
/// 1. derive the request id and cache key from the raw payload
/// 2. serve a live cache entry immediately, marked `cache_hit`
/// 3. validate, answering `400` with every field error
/// 4. fetch the baseline record
/// 5. fuse premium sub-documents when enrichment is asked for and allowed
/// 6. count the enrichment once against the premium and category quotas
/// 7. cache and return the `200` response
///
/// Only validation (`400`) and system faults (`500`) produce a non-200 reply.
#[derive(Debug)]
pub struct Gateway {
    validator: RequestValidator,
    baseline: Arc<dyn BaselineProvider>,
    fusion: DataFusionEngine,
    rate_limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    cache: ResponseCache,
    metrics: GatewayMetrics,
    journal: Option<UsageJournal>,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Starts the periodic cache sweep if one is configured.
    pub fn spawn_cache_sweeper(&self) -> Option<JoinHandle<()>> {
        let interval = self.config.cache.sweep_interval()?;
        if self.cache.is_disabled() {
            return None;
        }
        Some(self.cache.spawn_sweeper(interval))
    }

    pub fn usage(&self) -> UsageReport {
        let premium = self.rate_limiter.usage(RequestCategory::Premium);
        let month = premium
            .period
            .month()
            .unwrap_or_else(|| u8::from(self.clock.now().month()));

        UsageReport {
            premium: PremiumUsage {
                month,
                total_calls: premium.calls,
                remaining: premium.remaining,
            },
            categories: RequestCategory::ALL
                .into_iter()
                .filter(|category| category.is_inbound())
                .map(|category| self.rate_limiter.usage(category))
                .collect(),
            circuit: self.breaker.snapshot(),
            cache_entries: self.cache.len(),
        }
    }

    /// Parses `category`, answering `400` on an unknown name.
    pub fn resolve_category(
        &self,
        category: &str,
        payload: &Value,
    ) -> Result<RequestCategory, Box<GatewayReply>> {
        category.parse::<RequestCategory>().map_err(|unknown| {
            let now = self.clock.now();
            let request_id = RequestId::labelled(category, &payload_hash(payload), now);
            let mut errors = ValidationErrors::new();
            errors.add("category", unknown.to_string());

            self.metrics.record_request();
            self.metrics.record_validation_failure();
            warn!(request_id = %request_id, category, "unknown request category");

            Box::new(GatewayReply::Failure(ErrorResponse::validation(
                request_id, errors, now,
            )))
        })
    }

    /// [`Gateway::handle`] for a category given by name.
    pub async fn handle_str(&self, category: &str, payload: &Value) -> GatewayReply {
        match self.resolve_category(category, payload) {
            Ok(category) => self.handle(category, payload).await,
            Err(reply) => *reply,
        }
    }

    /// Runs [`Gateway::handle`] on its own task.
    ///
    /// Dropping the returned future leaves the task running, so an in-flight
    /// premium call still completes and populates the cache.
    pub async fn spawn_handle(self: Arc<Self>, category: RequestCategory, payload: Value) -> GatewayReply {
        let request_id = RequestId::derive(category, &payload, self.clock.now());
        let gateway = Arc::clone(&self);
        let task = tokio::spawn(async move { gateway.handle(category, &payload).await });

        match task.await {
            Ok(reply) => reply,
            Err(join_error) => {
                let failure = GatewayError::Task(join_error.to_string());
                self.metrics.record_system_error();
                error!(request_id = %request_id, error = %failure, "request task aborted");
                GatewayReply::Failure(ErrorResponse::system(
                    request_id,
                    failure.to_string(),
                    self.clock.now(),
                ))
            }
        }
    }

    pub async fn handle(&self, category: RequestCategory, payload: &Value) -> GatewayReply {
        let started_at = self.clock.now();
        let hash = payload_hash(payload);
        let request_id = RequestId::from_hash(category, &hash, started_at);
        let cache_key = CacheKey::from_hash(category, &hash);

        let span = info_span!("lookup", request_id = %request_id, category = %category);
        self.handle_keyed(category, payload, request_id, cache_key, started_at)
            .instrument(span)
            .await
    }

    async fn handle_keyed(
        &self,
        category: RequestCategory,
        payload: &Value,
        request_id: RequestId,
        cache_key: CacheKey,
        started_at: OffsetDateTime,
    ) -> GatewayReply {
        let timer = Instant::now();
        self.metrics.record_request();

        if let Some(entry) = self.cache.get(&cache_key) {
            debug!(cache_key = %cache_key, "cache hit");
            self.metrics.record_cache_hit();
            let response = from_cache(entry, request_id, elapsed_ms(timer));
            self.journal(RequestMetrics {
                request_id: response.metadata.request_correlation_id.clone(),
                category,
                started_at: format_rfc3339(started_at),
                status_code: 200,
                cache_hit: true,
                source: response.data.first().map(|record| record.source),
                latency_ms: response.metadata.latency_ms,
                error: None,
            });
            return GatewayReply::Success(response);
        }

        let request = match self.validate(category, payload) {
            Ok(request) => request,
            Err(errors) => {
                self.metrics.record_validation_failure();
                info!(fields = ?errors.fields().collect::<Vec<_>>(), "request rejected");
                let reply = ErrorResponse::validation(request_id.clone(), errors, self.clock.now());
                self.journal_failure(&request_id, category, started_at, 400, timer, &reply);
                return GatewayReply::Failure(reply);
            }
        };

        let basic_info = match self.baseline.fetch(&request).await {
            Ok(basic_info) => basic_info,
            Err(source) => {
                let failure = GatewayError::Baseline(source);
                self.metrics.record_system_error();
                error!(error = %failure, "baseline lookup failed");
                let reply =
                    ErrorResponse::system(request_id.clone(), failure.to_string(), self.clock.now());
                self.journal_failure(&request_id, category, started_at, 500, timer, &reply);
                return GatewayReply::Failure(reply);
            }
        };

        let outcome = self.fusion.fuse(category, &request, basic_info).await;
        let response = self.respond(category, &request, outcome, request_id, timer);

        self.cache.put(cache_key, response.clone());
        self.journal(RequestMetrics {
            request_id: response.metadata.request_correlation_id.clone(),
            category,
            started_at: format_rfc3339(started_at),
            status_code: 200,
            cache_hit: false,
            source: response.data.first().map(|record| record.source),
            latency_ms: response.metadata.latency_ms,
            error: response.metadata.enrichment_error.clone(),
        });

        GatewayReply::Success(response)
    }

    fn validate(
        &self,
        category: RequestCategory,
        payload: &Value,
    ) -> Result<LookupRequest, ValidationErrors> {
        let validated = self.validator.validate(payload);
        if category.is_inbound() {
            return validated;
        }

        let mut errors = validated.err().unwrap_or_default();
        errors.add(
            "category",
            format!("Category '{category}' is internal and cannot be requested"),
        );
        Err(errors)
    }

    fn respond(
        &self,
        category: RequestCategory,
        request: &LookupRequest,
        outcome: FusionOutcome,
        request_id: RequestId,
        timer: Instant,
    ) -> GatewayResponse {
        let mut metadata = ResponseMetadata::new(request_id);
        metadata.data_sources.push(String::from(RecordSource::Mock.as_str()));

        match outcome.status {
            EnrichmentStatus::NotRequested => {}
            EnrichmentStatus::RateLimited { category: gate } => {
                self.metrics.record_rate_limit_fallback();
                info!(gate = %gate, target_key = %request.target_key, "quota exhausted, serving baseline");
                metadata.rate_limit_fallback = Some(true);
            }
            EnrichmentStatus::CircuitOpen => {
                self.metrics.record_circuit_fallback();
                metadata.circuit_open_fallback = Some(true);
            }
            EnrichmentStatus::UpstreamFailed { kind, message } => {
                self.metrics.record_upstream_error();
                warn!(kind = kind.as_str(), error = %message, "enrichment failed, serving baseline");
                metadata.enrichment_error = Some(message);
            }
            EnrichmentStatus::NoPremiumData => {
                metadata.premium_usage = Some(self.count_enrichment(category));
                info!(target_key = %request.target_key, "premium had no data, serving baseline");
            }
            EnrichmentStatus::Enriched { fields } => {
                let usage = self.count_enrichment(category);
                self.metrics.record_hybrid();
                metadata
                    .data_sources
                    .push(String::from(RecordSource::Premium.as_str()));
                debug!(fields = fields.len(), remaining = usage.remaining, "record enriched");
                metadata.premium_usage = Some(usage);
                metadata.premium_fields = fields;
            }
        }

        metadata.latency_ms = elapsed_ms(timer);
        GatewayResponse {
            data: vec![outcome.record],
            metadata,
        }
    }

    /// Counts one logical premium call against the monthly and category quotas.
    fn count_enrichment(&self, category: RequestCategory) -> PremiumUsage {
        let premium = self.rate_limiter.record(RequestCategory::Premium);
        self.rate_limiter.record(category);
        PremiumUsage {
            month: premium
                .period
                .month()
                .unwrap_or_else(|| u8::from(self.clock.now().month())),
            total_calls: premium.calls,
            remaining: premium.remaining,
        }
    }

    fn journal_failure(
        &self,
        request_id: &RequestId,
        category: RequestCategory,
        started_at: OffsetDateTime,
        status_code: u16,
        timer: Instant,
        reply: &ErrorResponse,
    ) {
        self.journal(RequestMetrics {
            request_id: request_id.clone(),
            category,
            started_at: format_rfc3339(started_at),
            status_code,
            cache_hit: false,
            source: None,
            latency_ms: elapsed_ms(timer),
            error: Some(reply.error.message.clone()),
        });
    }

    fn journal(&self, entry: RequestMetrics) {
        if let Some(journal) = &self.journal {
            // Fire and forget; failures are logged by the journal itself.
            drop(journal.record(&entry));
        }
    }
}

/// Rewrites a stored response for the current request.
fn from_cache(entry: CacheEntry, request_id: RequestId, latency_ms: u64) -> GatewayResponse {
    let mut response = entry.response;
    for record in &mut response.data {
        record.data_freshness = DataFreshness::Cached;
        record.confidence_score = confidence::score(record);
    }

    let metadata = &mut response.metadata;
    metadata.request_correlation_id = request_id;
    metadata.cache_hit = true;
    metadata.cache_time = Some(format_rfc3339(entry.created_at));
    metadata.premium_usage = None;
    metadata.latency_ms = latency_ms;
    response
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ProviderError;
    use crate::providers::ProviderFuture;
    use crate::record::BasicInfo;
    use serde_json::json;
    use std::time::Duration;
    use time::macros::datetime;

    #[derive(Debug)]
    struct BrokenBaseline;

    impl BaselineProvider for BrokenBaseline {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn fetch<'a>(&'a self, _request: &'a LookupRequest) -> ProviderFuture<'a, BasicInfo> {
            Box::pin(async { Err(ProviderError::internal("baseline store offline")) })
        }
    }

    #[derive(Debug)]
    struct EmptyPremium;

    impl PremiumProvider for EmptyPremium {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn fetch<'a>(
            &'a self,
            _field: crate::request::EnrichmentField,
            _request: &'a LookupRequest,
        ) -> ProviderFuture<'a, Option<crate::record::PremiumDocument>> {
            Box::pin(async { Ok(None) })
        }
    }

    fn gateway() -> (Gateway, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-14 08:30:00 UTC)));
        let gateway = Gateway::builder(GatewayConfig::default())
            .with_clock(clock.clone())
            .build();
        (gateway, clock)
    }

    fn enriched_payload() -> Value {
        json!({
            "target_key": "90210",
            "data_source": { "enrichment": { "enabled": true, "fields": ["tax_data", "valuation"] } }
        })
    }

    #[tokio::test]
    async fn enriched_request_counts_both_quotas_once() {
        let (gateway, _) = gateway();

        let reply = gateway
            .handle(RequestCategory::PropertySearch, &enriched_payload())
            .await;
        let response = reply.success().expect("200");

        assert_eq!(response.data[0].source, RecordSource::Hybrid);
        assert_eq!(response.metadata.data_sources, vec!["mock", "premium"]);
        let usage = response.metadata.premium_usage.expect("usage reported");
        assert_eq!((usage.month, usage.total_calls, usage.remaining), (10, 1, 399));
        assert_eq!(
            gateway.rate_limiter().usage(RequestCategory::PropertySearch).calls,
            1
        );
    }

    #[tokio::test]
    async fn premium_without_documents_is_reported_as_baseline() {
        let gateway = Gateway::builder(GatewayConfig::default())
            .with_clock(Arc::new(ManualClock::new(datetime!(2026-10-14 08:30:00 UTC))))
            .with_premium(Arc::new(EmptyPremium))
            .build();

        let reply = gateway
            .handle(RequestCategory::PropertySearch, &enriched_payload())
            .await;
        let response = reply.success().expect("200");

        let record = &response.data[0];
        assert_eq!(record.source, RecordSource::Mock);
        assert_eq!(record.data_freshness, DataFreshness::Simulated);
        assert_eq!(record.confidence_score, 0.30);
        assert_eq!(response.metadata.data_sources, vec!["mock"]);
        assert!(response.metadata.premium_fields.is_empty());
        let usage = response.metadata.premium_usage.expect("calls were made");
        assert_eq!(usage.total_calls, 1);
        assert_eq!(gateway.metrics().hybrid_responses, 0);
    }

    #[tokio::test]
    async fn enabled_flag_without_fields_serves_baseline() {
        let (gateway, _) = gateway();
        let payload = json!({
            "target_key": "90210",
            "data_source": { "enrichment": { "enabled": true, "fields": [] } }
        });

        let reply = gateway.handle(RequestCategory::PropertySearch, &payload).await;
        let response = reply.success().expect("200");
        assert_eq!(response.data[0].source, RecordSource::Mock);
        assert!(response.metadata.premium_usage.is_none());
        assert_eq!(gateway.rate_limiter().usage(RequestCategory::Premium).calls, 0);
    }

    #[tokio::test]
    async fn cache_hit_is_retagged_for_the_new_request() {
        let (gateway, clock) = gateway();
        let first = gateway
            .handle(RequestCategory::PropertySearch, &enriched_payload())
            .await;
        let first = first.success().expect("200").clone();

        clock.advance(Duration::from_secs(60));
        let second = gateway
            .handle(RequestCategory::PropertySearch, &enriched_payload())
            .await;
        let second = second.success().expect("200");

        assert!(second.metadata.cache_hit);
        assert_eq!(second.metadata.cache_time.as_deref(), Some("2026-10-14T08:30:00Z"));
        assert_ne!(
            second.metadata.request_correlation_id,
            first.metadata.request_correlation_id
        );
        assert!(second.metadata.premium_usage.is_none());
        assert_eq!(second.data[0].data_freshness, DataFreshness::Cached);
        assert!(second.data[0].confidence_score <= first.data[0].confidence_score);
        assert_eq!(gateway.rate_limiter().usage(RequestCategory::Premium).calls, 1);
    }

    #[tokio::test]
    async fn premium_category_is_not_routable() {
        let (gateway, _) = gateway();
        let reply = gateway
            .handle(RequestCategory::Premium, &json!({ "target_key": "90210" }))
            .await;

        assert_eq!(reply.status().as_u16(), 400);
        let failure = reply.failure().expect("error envelope");
        let errors = failure.validation_errors.as_ref().expect("errors");
        assert!(errors.field("category").is_some());
    }

    #[tokio::test]
    async fn unknown_category_name_is_a_validation_error() {
        let (gateway, _) = gateway();
        let reply = gateway
            .handle_str("lottery_numbers", &json!({ "target_key": "90210" }))
            .await;

        assert_eq!(reply.status().as_u16(), 400);
        let failure = reply.failure().expect("error envelope");
        assert!(failure.metadata.request_id.as_str().starts_with("lottery_numbers_"));
        assert_eq!(gateway.metrics().validation_failures, 1);
    }

    #[tokio::test]
    async fn baseline_failure_is_a_system_error() {
        let gateway = Gateway::builder(GatewayConfig::default())
            .with_baseline(Arc::new(BrokenBaseline))
            .build();

        let reply = gateway
            .handle(RequestCategory::PropertySearch, &json!({ "target_key": "90210" }))
            .await;
        assert_eq!(reply.status().as_u16(), 500);
        let body = reply.to_json().expect("serializes");
        assert_eq!(body["metadata"]["error_type"], "system_error");
        assert!(gateway.cache().is_empty());
    }

    #[tokio::test]
    async fn usage_report_lists_inbound_categories() {
        let (gateway, _) = gateway();
        gateway
            .handle(RequestCategory::MarketAnalysis, &enriched_payload())
            .await;

        let report = gateway.usage();
        assert_eq!(report.premium.total_calls, 1);
        assert_eq!(report.categories.len(), 8);
        let market = report
            .categories
            .iter()
            .find(|usage| usage.category == RequestCategory::MarketAnalysis)
            .expect("market analysis listed");
        assert_eq!((market.calls, market.remaining), (1, 49));
        assert_eq!(report.cache_entries, 1);
    }

    #[tokio::test]
    async fn spawned_handling_returns_the_same_reply_shape() {
        let (gateway, _) = gateway();
        let gateway = Arc::new(gateway);

        let reply = Arc::clone(&gateway)
            .spawn_handle(RequestCategory::LeadScoring, json!({ "target_key": "75201" }))
            .await;
        assert_eq!(reply.status().as_u16(), 200);
        assert_eq!(gateway.metrics().requests, 1);
    }
}
