//! # Hybridgate Core
//!
//! A resilient lookup gateway that answers every request from a cheap,
//! always-available baseline provider and, when asked and allowed, overlays
//! sub-documents from a metered premium provider.
//!
//! ## Overview
//!
//! - **Validation** of inbound lookup payloads, collecting every field error
//! - **Quota rationing** per category over calendar hours and months
//! - **Circuit breaking** around the premium provider
//! - **Response caching** keyed by payload content with a fixed TTL
//! - **Data fusion** of baseline and premium data with a confidence score
//! - **Orchestration** that degrades to baseline data instead of failing
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL response cache over a pluggable store |
//! | [`category`] | Request categories and their quota periods |
//! | [`circuit_breaker`] | Premium provider circuit breaker |
//! | [`clock`] | Clock abstraction for windows and timers |
//! | [`confidence`] | Confidence scoring of fused records |
//! | [`config`] | Layered gateway configuration |
//! | [`envelope`] | Response and error envelopes |
//! | [`error`] | Core error types |
//! | [`fusion`] | Enrichment decision and merge |
//! | [`gateway`] | Request orchestrator |
//! | [`http_client`] | HTTP client abstraction |
//! | [`journal`] | NDJSON usage journal |
//! | [`keys`] | Cache keys and request ids |
//! | [`metrics`] | Request counters |
//! | [`providers`] | Baseline and premium providers |
//! | [`rate_limiter`] | Calendar-window quota counters |
//! | [`record`] | Fused record model |
//! | [`request`] | Validated lookup request |
//! | [`validator`] | Inbound payload validation |
//! | [`worker_pool`] | Bounded pool for blocking work |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hybridgate_core::{Gateway, GatewayConfig, RequestCategory};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::builder(GatewayConfig::load(None)?).build();
//!
//!     let payload = json!({
//!         "target_key": "90210",
//!         "data_source": { "enrichment": { "enabled": true, "fields": ["tax_data"] } }
//!     });
//!     let reply = gateway.handle(RequestCategory::PropertySearch, &payload).await;
//!
//!     println!("{} {}", reply.status().as_u16(), reply.to_json()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │     Gateway     │────▶│  Response Cache  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Baseline (mock) │     │   Rate Limiter   │
//! └────────┬────────┘     └────────▲─────────┘
//!          │                       │
//!          ▼                       │
//! ┌─────────────────┐     ┌────────┴─────────┐
//! │  Fusion Engine  │────▶│ Circuit Breaker  │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ Premium Provider │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Only validation and system faults reach the caller as errors. Quota
//! exhaustion, an open breaker and premium failures all fall back to the
//! baseline record with a flag in the response metadata:
//!
//! ```rust
//! use hybridgate_core::{ProviderError, ProviderErrorKind};
//!
//! fn describe(error: &ProviderError) -> &'static str {
//!     match error.kind() {
//!         ProviderErrorKind::Timeout => "premium call timed out",
//!         ProviderErrorKind::Status if error.retryable() => "premium provider busy",
//!         _ => "premium provider failed",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The premium API key is read from environment variables only
//! - It is never serialized and never logged

pub mod cache;
pub mod category;
pub mod circuit_breaker;
pub mod clock;
pub mod confidence;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fusion;
pub mod gateway;
pub mod http_client;
pub mod journal;
pub mod keys;
pub mod metrics;
pub mod providers;
pub mod rate_limiter;
pub mod record;
pub mod request;
pub mod validator;
pub mod worker_pool;

// Re-export commonly used types at crate root for convenience

// Caching
pub use cache::{CacheEntry, CacheStore, InMemoryCacheStore, ResponseCache};

// Categories
pub use category::{RatePeriod, RequestCategory, UnknownCategory};

// Circuit breaker
pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};

// Clock
pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use config::{CacheConfig, GatewayConfig, PremiumConfig};

// Envelope types
pub use envelope::{
    ErrorResponse, ErrorType, GatewayReply, GatewayResponse, PremiumUsage, ReplyStatus,
    ResponseMetadata,
};

// Error types
pub use error::{ConfigError, GatewayError, ProviderError, ProviderErrorKind, ValidationErrors};

// Fusion
pub use fusion::{DataFusionEngine, EnrichmentStatus, FusionOutcome};

// Orchestrator
pub use gateway::{Gateway, GatewayBuilder, UsageReport};

// HTTP client types
pub use http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Keys
pub use keys::{CacheKey, RequestId};

// Metrics and journal
pub use journal::UsageJournal;
pub use metrics::{GatewayMetrics, MetricsSnapshot, RequestMetrics};

// Providers
pub use providers::{
    BaselineProvider, HttpPremiumProvider, MockBaselineProvider, PremiumProvider, ProviderFuture,
    SimulatedPremiumProvider,
};

// Rate limiting
pub use rate_limiter::{CategoryUsage, InMemoryUsageStore, PeriodKey, RateLimiter, RateLimits, UsageStore};

// Records and requests
pub use record::{DataFreshness, FusedRecord, PremiumDocument, RecordSource};
pub use request::{EnrichmentDirective, EnrichmentField, Filters, LookupRequest};
pub use validator::RequestValidator;

// Worker pool
pub use worker_pool::{BlockingPool, JobError, JobTicket};
