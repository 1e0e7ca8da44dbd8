//! Fused record model.
//!
//! A [`FusedRecord`] carries the baseline answer plus one explicit optional
//! slot per premium sub-document, so field-presence checks in
//! [`crate::confidence`] are checked by the compiler rather than by key lookups.

use serde::{Deserialize, Serialize};

use crate::request::EnrichmentField;

/// Where the record's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Baseline provider only.
    Mock,
    /// Premium provider only.
    Premium,
    /// Baseline overlaid with premium sub-documents.
    Hybrid,
}

impl RecordSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Premium => "premium",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshness {
    /// Premium data fetched during this request.
    Current,
    /// Served from the response cache.
    Cached,
    /// Synthesized by the baseline provider.
    Simulated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baths: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessed_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transfer_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_description: Option<String>,
    pub encumbrances: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeclosureData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_date: Option<String>,
    pub foreclosure_history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleTransaction {
    pub date: String,
    pub price: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesHistory {
    pub transactions: Vec<SaleTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Valuation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

/// One premium sub-document, tagged by the enrichment field it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum PremiumDocument {
    Tax(TaxData),
    Title(TitleData),
    Foreclosure(ForeclosureData),
    SalesHistory(SalesHistory),
    Valuation(Valuation),
}

impl PremiumDocument {
    pub const fn field(&self) -> EnrichmentField {
        match self {
            Self::Tax(_) => EnrichmentField::TaxData,
            Self::Title(_) => EnrichmentField::TitleData,
            Self::Foreclosure(_) => EnrichmentField::Foreclosure,
            Self::SalesHistory(_) => EnrichmentField::SalesHistory,
            Self::Valuation(_) => EnrichmentField::Valuation,
        }
    }

    /// Decodes a provider JSON body into the sub-document for `field`.
    pub fn from_json(field: EnrichmentField, body: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match field {
            EnrichmentField::TaxData => Self::Tax(serde_json::from_value(body)?),
            EnrichmentField::TitleData => Self::Title(serde_json::from_value(body)?),
            EnrichmentField::Foreclosure => Self::Foreclosure(serde_json::from_value(body)?),
            EnrichmentField::SalesHistory => Self::SalesHistory(serde_json::from_value(body)?),
            EnrichmentField::Valuation => Self::Valuation(serde_json::from_value(body)?),
        })
    }
}

/// Baseline record plus any premium sub-documents merged onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRecord {
    pub target_key: String,
    pub source: RecordSource,
    pub data_freshness: DataFreshness,
    pub confidence_score: f64,
    pub basic_info: BasicInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_data: Option<TaxData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_data: Option<TitleData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreclosure: Option<ForeclosureData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_history: Option<SalesHistory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation: Option<Valuation>,
}

impl FusedRecord {
    /// A baseline-only record; the score is filled in by the fusion engine.
    pub fn baseline(target_key: impl Into<String>, basic_info: BasicInfo) -> Self {
        Self {
            target_key: target_key.into(),
            source: RecordSource::Mock,
            data_freshness: DataFreshness::Simulated,
            confidence_score: 0.0,
            basic_info,
            tax_data: None,
            title_data: None,
            foreclosure: None,
            sales_history: None,
            valuation: None,
        }
    }

    /// Puts `document` into its slot, replacing any previous value.
    pub fn overlay(&mut self, document: PremiumDocument) {
        match document {
            PremiumDocument::Tax(tax) => self.tax_data = Some(tax),
            PremiumDocument::Title(title) => self.title_data = Some(title),
            PremiumDocument::Foreclosure(foreclosure) => self.foreclosure = Some(foreclosure),
            PremiumDocument::SalesHistory(sales) => self.sales_history = Some(sales),
            PremiumDocument::Valuation(valuation) => self.valuation = Some(valuation),
        }
    }

    pub fn has(&self, field: EnrichmentField) -> bool {
        match field {
            EnrichmentField::TaxData => self.tax_data.is_some(),
            EnrichmentField::TitleData => self.title_data.is_some(),
            EnrichmentField::Foreclosure => self.foreclosure.is_some(),
            EnrichmentField::SalesHistory => self.sales_history.is_some(),
            EnrichmentField::Valuation => self.valuation.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_fills_only_the_matching_slot() {
        let mut record = FusedRecord::baseline("90210", BasicInfo::default());
        record.overlay(PremiumDocument::Valuation(Valuation {
            estimated_value: Some(750_000.0),
            ..Valuation::default()
        }));

        assert!(record.has(EnrichmentField::Valuation));
        assert!(!record.has(EnrichmentField::TaxData));
        assert_eq!(
            record.valuation.as_ref().and_then(|v| v.estimated_value),
            Some(750_000.0)
        );
    }

    #[test]
    fn absent_sub_documents_are_omitted_from_json() {
        let record = FusedRecord::baseline("90210", BasicInfo::default());
        let json = serde_json::to_value(&record).expect("serializes");

        assert_eq!(json["source"], "mock");
        assert_eq!(json["data_freshness"], "simulated");
        assert!(json.get("tax_data").is_none());
        assert!(json.get("valuation").is_none());
    }

    #[test]
    fn decodes_provider_body_for_field() {
        let document = PremiumDocument::from_json(
            EnrichmentField::SalesHistory,
            serde_json::json!({
                "transactions": [{ "date": "2022-01-15", "price": 680000.0, "type": "sale" }]
            }),
        )
        .expect("decodes");

        assert_eq!(document.field(), EnrichmentField::SalesHistory);
        let PremiumDocument::SalesHistory(history) = document else {
            panic!("expected sales history");
        };
        assert_eq!(history.transactions[0].kind, "sale");
    }
}
