//! Validated lookup requests.
//!
//! Inbound payloads arrive as raw JSON and are turned into a [`LookupRequest`]
//! by [`crate::validator::RequestValidator`]; nothing else constructs one from
//! untrusted input.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Premium sub-resources a lookup may ask to have merged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentField {
    TaxData,
    TitleData,
    Foreclosure,
    SalesHistory,
    Valuation,
}

impl EnrichmentField {
    pub const ALL: [Self; 5] = [
        Self::TaxData,
        Self::TitleData,
        Self::Foreclosure,
        Self::SalesHistory,
        Self::Valuation,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaxData => "tax_data",
            Self::TitleData => "title_data",
            Self::Foreclosure => "foreclosure",
            Self::SalesHistory => "sales_history",
            Self::Valuation => "valuation",
        }
    }
}

impl Display for EnrichmentField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichmentField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| value.to_owned())
    }
}

/// Numeric value range a lookup is constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub min_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            min_value: 0.0,
            max_value: None,
        }
    }
}

impl Filters {
    /// Clamps `value` into the range.
    pub fn clamp(&self, value: f64) -> f64 {
        let lower = value.max(self.min_value);
        match self.max_value {
            Some(max) => lower.min(max),
            None => lower,
        }
    }
}

/// Which premium fields to fetch, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentDirective {
    pub enabled: bool,
    #[serde(default)]
    pub fields: Vec<EnrichmentField>,
}

impl EnrichmentDirective {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled directive; duplicate fields are dropped, first occurrence wins.
    pub fn fields(fields: impl IntoIterator<Item = EnrichmentField>) -> Self {
        let mut unique = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self {
            enabled: true,
            fields: unique,
        }
    }

    pub fn requests(&self, field: EnrichmentField) -> bool {
        self.enabled && self.fields.contains(&field)
    }
}

/// A validated lookup against one target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub target_key: String,
    pub filters: Filters,
    pub enrichment: EnrichmentDirective,
}

impl LookupRequest {
    pub fn new(target_key: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            filters: Filters::default(),
            enrichment: EnrichmentDirective::disabled(),
        }
    }

    pub fn with_filters(mut self, min_value: f64, max_value: Option<f64>) -> Self {
        self.filters = Filters {
            min_value,
            max_value,
        };
        self
    }

    pub fn with_enrichment(mut self, fields: impl IntoIterator<Item = EnrichmentField>) -> Self {
        self.enrichment = EnrichmentDirective::fields(fields);
        self
    }

    /// Renders the request in the inbound wire shape.
    pub fn to_payload(&self) -> Value {
        let mut filters = json!({ "min_value": self.filters.min_value });
        if let Some(max_value) = self.filters.max_value {
            filters["max_value"] = json!(max_value);
        }

        json!({
            "target_key": self.target_key,
            "filters": filters,
            "data_source": {
                "enrichment": {
                    "enabled": self.enrichment.enabled,
                    "fields": self.enrichment.fields,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_dedupes_fields() {
        let directive = EnrichmentDirective::fields([
            EnrichmentField::TaxData,
            EnrichmentField::Valuation,
            EnrichmentField::TaxData,
        ]);
        assert_eq!(
            directive.fields,
            vec![EnrichmentField::TaxData, EnrichmentField::Valuation]
        );
        assert!(directive.requests(EnrichmentField::Valuation));
        assert!(!directive.requests(EnrichmentField::TitleData));
    }

    #[test]
    fn filters_clamp_into_range() {
        let filters = Filters {
            min_value: 500_000.0,
            max_value: Some(900_000.0),
        };
        assert_eq!(filters.clamp(1_200_000.0), 900_000.0);
        assert_eq!(filters.clamp(100_000.0), 500_000.0);
        assert_eq!(filters.clamp(750_000.0), 750_000.0);
    }

    #[test]
    fn payload_uses_inbound_shape() {
        let payload = LookupRequest::new("90210")
            .with_filters(100.0, Some(200.0))
            .with_enrichment([EnrichmentField::TaxData])
            .to_payload();

        assert_eq!(payload["target_key"], "90210");
        assert_eq!(payload["filters"]["max_value"], 200.0);
        assert_eq!(payload["data_source"]["enrichment"]["enabled"], true);
        assert_eq!(payload["data_source"]["enrichment"]["fields"][0], "tax_data");
    }
}
