//! Upstream data provider contracts.
//!
//! | Provider | Trait | Notes |
//! |----------|-------|-------|
//! | [`MockBaselineProvider`] | [`BaselineProvider`] | Deterministic, always available |
//! | [`SimulatedPremiumProvider`] | [`PremiumProvider`] | Offline stand-in for the metered provider |
//! | [`HttpPremiumProvider`] | [`PremiumProvider`] | Real metered provider over HTTP |

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderError;
use crate::record::{BasicInfo, PremiumDocument};
use crate::request::{EnrichmentField, LookupRequest};

mod baseline;
mod http;
mod premium;

pub use baseline::{MockBaselineProvider, PriceTier};
pub use http::{HttpPremiumProvider, PremiumEndpoint};
pub use premium::SimulatedPremiumProvider;

/// Boxed future returned by provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Low-cost provider every lookup starts from.
pub trait BaselineProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn fetch<'a>(&'a self, request: &'a LookupRequest) -> ProviderFuture<'a, BasicInfo>;
}

/// Metered provider of premium sub-documents.
///
/// `Ok(None)` means the provider answered but has nothing for `field`; that is
/// a successful call, not a failure.
pub trait PremiumProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn fetch<'a>(
        &'a self,
        field: EnrichmentField,
        request: &'a LookupRequest,
    ) -> ProviderFuture<'a, Option<PremiumDocument>>;
}
