use serde::Serialize;

use super::{BaselineProvider, ProviderFuture};
use crate::record::BasicInfo;
use crate::request::LookupRequest;

const LUXURY_MARKETS: [&str; 4] = ["37215", "30305", "75225", "90210"];
const HIGH_MARKETS: [&str; 2] = ["37203", "75201"];
const STREETS: [&str; 5] = ["Main St", "Cedar Ln", "Pine Rd", "Maple Dr", "Elm St"];

/// Market price tier for a target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Luxury,
    High,
    Moderate,
}

impl PriceTier {
    pub fn for_target(target_key: &str) -> Self {
        if LUXURY_MARKETS.contains(&target_key) {
            Self::Luxury
        } else if HIGH_MARKETS.contains(&target_key) {
            Self::High
        } else {
            Self::Moderate
        }
    }

    const fn median_price(self) -> f64 {
        match self {
            Self::Luxury => 1_200_000.0,
            Self::High => 650_000.0,
            Self::Moderate => 350_000.0,
        }
    }

    /// Cumulative percentages for single family, townhouse, condo.
    const fn type_mix(self) -> [(u32, &'static str); 3] {
        match self {
            Self::Luxury => [(70, "single_family"), (90, "townhouse"), (100, "condo")],
            Self::High => [(50, "single_family"), (80, "townhouse"), (100, "condo")],
            Self::Moderate => [(40, "single_family"), (70, "townhouse"), (100, "condo")],
        }
    }

    const fn rooms(self) -> (u32, f32, u32) {
        match self {
            Self::Luxury => (5, 4.5, 4_200),
            Self::High => (4, 3.0, 2_500),
            Self::Moderate => (3, 2.0, 1_600),
        }
    }
}

/// Location-aware synthetic baseline.
///
/// Output depends only on the request, so identical lookups always produce
/// identical records.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockBaselineProvider;

impl MockBaselineProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, request: &LookupRequest) -> BasicInfo {
        let target = request.target_key.as_str();
        let tier = PriceTier::for_target(target);
        let seed = seed(target);

        let roll = seed % 100;
        let property_type = tier
            .type_mix()
            .into_iter()
            .find(|(threshold, _)| roll < *threshold)
            .map_or("single_family", |(_, kind)| kind);

        // +/-10% around the tier median.
        let spread = f64::from(seed % 21) - 10.0;
        let price = tier.median_price() * (1.0 + spread / 100.0);
        let (beds, baths, square_feet) = tier.rooms();
        let number = 1000 + ((seed % 9000) * 437) % 9000;
        let street = STREETS[(seed as usize) % STREETS.len()];

        BasicInfo {
            address: Some(format!("{number} {street}")),
            zip_code: Some(request.target_key.clone()),
            property_type: Some(property_type.to_owned()),
            beds: Some(beds),
            baths: Some(baths),
            square_feet: Some(square_feet),
            year_built: Some(1950 + (seed % 70) as u16),
            price: Some(request.filters.clamp(price.round())),
        }
    }
}

fn seed(target_key: &str) -> u32 {
    target_key
        .bytes()
        .fold(0u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(u32::from(byte)))
}

impl BaselineProvider for MockBaselineProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn fetch<'a>(&'a self, request: &'a LookupRequest) -> ProviderFuture<'a, BasicInfo> {
        Box::pin(async move { Ok(self.generate(request)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_market_table() {
        assert_eq!(PriceTier::for_target("37215"), PriceTier::Luxury);
        assert_eq!(PriceTier::for_target("75201"), PriceTier::High);
        assert_eq!(PriceTier::for_target("12345"), PriceTier::Moderate);
    }

    #[test]
    fn output_is_deterministic_and_complete() {
        let provider = MockBaselineProvider::new();
        let request = LookupRequest::new("90210");

        let first = provider.generate(&request);
        let second = provider.generate(&request);

        assert_eq!(first, second);
        assert_eq!(first.zip_code.as_deref(), Some("90210"));
        assert!(first.address.is_some());
        assert!(first.property_type.is_some());
        assert_eq!(first.beds, Some(5));
    }

    #[test]
    fn price_is_clamped_into_filters() {
        let provider = MockBaselineProvider::new();

        let capped =
            provider.generate(&LookupRequest::new("90210").with_filters(0.0, Some(500_000.0)));
        assert_eq!(capped.price, Some(500_000.0));

        let floored =
            provider.generate(&LookupRequest::new("12345").with_filters(2_000_000.0, None));
        assert_eq!(floored.price, Some(2_000_000.0));
    }

    #[test]
    fn unfiltered_price_stays_near_tier_median() {
        let info = MockBaselineProvider::new().generate(&LookupRequest::new("37215"));
        let price = info.price.expect("price");
        assert!((1_080_000.0..=1_320_000.0).contains(&price), "{price}");
    }

    #[tokio::test]
    async fn fetch_never_fails() {
        let provider = MockBaselineProvider::new();
        let request = LookupRequest::new("30308");
        assert!(provider.fetch(&request).await.is_ok());
        assert_eq!(provider.name(), "mock");
    }
}
