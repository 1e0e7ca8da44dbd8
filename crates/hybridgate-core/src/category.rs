use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Request categories tracked by the rate limiter.
///
/// [`RequestCategory::Premium`] is the metered premium provider itself and is
/// counted per calendar month; every other category is counted per calendar hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    PropertySearch,
    MarketAnalysis,
    LeadScoring,
    DealAnalysis,
    #[serde(rename = "attom_api")]
    Premium,
    TaxAssessment,
    PublicRecords,
    Foreclosure,
    TitleSearch,
}

/// Calendar period a category's counter is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePeriod {
    Hour,
    Month,
}

impl RequestCategory {
    pub const ALL: [Self; 9] = [
        Self::PropertySearch,
        Self::MarketAnalysis,
        Self::LeadScoring,
        Self::DealAnalysis,
        Self::Premium,
        Self::TaxAssessment,
        Self::PublicRecords,
        Self::Foreclosure,
        Self::TitleSearch,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PropertySearch => "property_search",
            Self::MarketAnalysis => "market_analysis",
            Self::LeadScoring => "lead_scoring",
            Self::DealAnalysis => "deal_analysis",
            Self::Premium => "attom_api",
            Self::TaxAssessment => "tax_assessment",
            Self::PublicRecords => "public_records",
            Self::Foreclosure => "foreclosure",
            Self::TitleSearch => "title_search",
        }
    }

    pub const fn period(self) -> RatePeriod {
        match self {
            Self::Premium => RatePeriod::Month,
            _ => RatePeriod::Hour,
        }
    }

    /// Default call cap per period.
    pub const fn default_cap(self) -> u32 {
        match self {
            Self::PropertySearch => 100,
            Self::MarketAnalysis => 50,
            Self::LeadScoring => 200,
            Self::DealAnalysis => 150,
            Self::Premium => 400,
            Self::TaxAssessment => 200,
            Self::PublicRecords => 150,
            Self::Foreclosure => 100,
            Self::TitleSearch => 200,
        }
    }

    /// Whether callers may submit lookups under this category.
    pub const fn is_inbound(self) -> bool {
        !matches!(self, Self::Premium)
    }
}

impl Display for RequestCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request category '{value}'")]
pub struct UnknownCategory {
    pub value: String,
}

impl FromStr for RequestCategory {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or(UnknownCategory { value: normalized })
    }
}
