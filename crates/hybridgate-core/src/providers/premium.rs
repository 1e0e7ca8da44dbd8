use std::time::Duration;

use super::{PremiumProvider, ProviderFuture};
use crate::record::{
    ForeclosureData, PremiumDocument, PriceRange, SaleTransaction, SalesHistory, TaxData,
    TitleData, Valuation,
};
use crate::request::{EnrichmentField, LookupRequest};

/// Offline stand-in for the metered provider with fixed, realistic documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedPremiumProvider {
    latency: Duration,
}

impl SimulatedPremiumProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay to every call.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn document(field: EnrichmentField) -> PremiumDocument {
        match field {
            EnrichmentField::TaxData => PremiumDocument::Tax(TaxData {
                assessed_value: Some(720_000.0),
                tax_amount: Some(7_200.0),
                tax_year: Some(2024),
                assessment_date: Some(String::from("2024-01-15")),
            }),
            EnrichmentField::TitleData => PremiumDocument::Title(TitleData {
                ownership_type: Some(String::from("fee simple")),
                last_transfer_date: Some(String::from("2022-01-15")),
                legal_description: Some(String::from("Lot 7, Block 3")),
                encumbrances: Vec::new(),
            }),
            EnrichmentField::Foreclosure => PremiumDocument::Foreclosure(ForeclosureData {
                status: Some(String::from("none")),
                last_check_date: Some(String::from("2025-03-15")),
                foreclosure_history: Vec::new(),
            }),
            EnrichmentField::SalesHistory => PremiumDocument::SalesHistory(SalesHistory {
                transactions: vec![SaleTransaction {
                    date: String::from("2022-01-15"),
                    price: 680_000.0,
                    kind: String::from("sale"),
                }],
            }),
            EnrichmentField::Valuation => PremiumDocument::Valuation(Valuation {
                estimated_value: Some(750_000.0),
                confidence_score: Some(0.92),
                last_updated: Some(String::from("2025-03-15")),
                price_range: Some(PriceRange {
                    low: 720_000.0,
                    high: 780_000.0,
                }),
            }),
        }
    }
}

impl PremiumProvider for SimulatedPremiumProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn fetch<'a>(
        &'a self,
        field: EnrichmentField,
        _request: &'a LookupRequest,
    ) -> ProviderFuture<'a, Option<PremiumDocument>> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(Some(Self::document(field)))
        })
    }
}
