//! Confidence scoring for fused records.
//!
//! The score is a weighted completeness sum over five categories followed by a
//! fixed sequence of boosts. Each boost applies to the running score, so the
//! order in [`score`] changes the output and must stay as written.

use crate::record::{DataFreshness, FusedRecord, RecordSource};

/// Scored field categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCategory {
    BasicInfo,
    TaxData,
    TitleData,
    Foreclosure,
    Valuation,
}

impl ScoreCategory {
    pub const ALL: [Self; 5] = [
        Self::BasicInfo,
        Self::TaxData,
        Self::TitleData,
        Self::Foreclosure,
        Self::Valuation,
    ];

    pub const fn weight(self) -> f64 {
        match self {
            Self::BasicInfo => 0.30,
            Self::TaxData => 0.20,
            Self::TitleData => 0.15,
            Self::Foreclosure => 0.15,
            Self::Valuation => 0.20,
        }
    }

    pub const fn critical(self) -> bool {
        matches!(self, Self::BasicInfo | Self::TaxData | Self::Valuation)
    }

    pub const fn required_fields(self) -> usize {
        match self {
            Self::BasicInfo => 5,
            Self::TaxData => 3,
            Self::TitleData | Self::Foreclosure | Self::Valuation => 2,
        }
    }

    /// Count of required fields present on `record` for this category.
    pub fn fields_present(self, record: &FusedRecord) -> usize {
        match self {
            Self::BasicInfo => {
                let info = &record.basic_info;
                count([
                    info.address.is_some(),
                    info.zip_code.is_some(),
                    info.property_type.is_some(),
                    info.beds.is_some(),
                    info.baths.is_some(),
                ])
            }
            Self::TaxData => record.tax_data.as_ref().map_or(0, |tax| {
                count([
                    tax.assessed_value.is_some(),
                    tax.tax_amount.is_some(),
                    tax.tax_year.is_some(),
                ])
            }),
            Self::TitleData => record.title_data.as_ref().map_or(0, |title| {
                count([
                    title.ownership_type.is_some(),
                    title.last_transfer_date.is_some(),
                ])
            }),
            Self::Foreclosure => record.foreclosure.as_ref().map_or(0, |foreclosure| {
                count([
                    foreclosure.status.is_some(),
                    foreclosure.last_check_date.is_some(),
                ])
            }),
            Self::Valuation => record.valuation.as_ref().map_or(0, |valuation| {
                count([
                    valuation.estimated_value.is_some(),
                    valuation.confidence_score.is_some(),
                ])
            }),
        }
    }

    fn score(self, record: &FusedRecord) -> f64 {
        let present = self.fields_present(record) as f64;
        let required = self.required_fields() as f64;
        (present / required) * self.weight()
    }
}

fn count<const N: usize>(flags: [bool; N]) -> usize {
    flags.into_iter().filter(|present| *present).count()
}

/// Per-category breakdown behind a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub category_scores: [f64; 5],
    pub critical_complete: bool,
}

impl ScoreBreakdown {
    pub fn of(record: &FusedRecord) -> Self {
        let mut category_scores = [0.0; 5];
        let mut critical_complete = true;

        for (slot, category) in category_scores.iter_mut().zip(ScoreCategory::ALL) {
            *slot = category.score(record);
            if category.critical() && category.fields_present(record) < category.required_fields()
            {
                critical_complete = false;
            }
        }

        Self {
            category_scores,
            critical_complete,
        }
    }

    pub fn base_score(&self) -> f64 {
        self.category_scores.iter().sum()
    }

    pub fn category(&self, category: ScoreCategory) -> f64 {
        let index = ScoreCategory::ALL
            .iter()
            .position(|candidate| *candidate == category)
            .unwrap_or_default();
        self.category_scores[index]
    }
}

/// Confidence score in `[0, 0.98]`, rounded to two decimals.
pub fn score(record: &FusedRecord) -> f64 {
    let breakdown = ScoreBreakdown::of(record);
    let mut score = breakdown.base_score();

    match record.source {
        RecordSource::Hybrid if breakdown.critical_complete => score = (score + 0.40).min(0.98),
        RecordSource::Hybrid => score = (score + 0.30).min(0.95),
        RecordSource::Premium => score = (score + 0.20).min(0.95),
        RecordSource::Mock => {}
    }

    if record.data_freshness == DataFreshness::Current {
        score = (score + 0.10).min(0.98);
    }

    let quality = [
        ScoreCategory::BasicInfo,
        ScoreCategory::TaxData,
        ScoreCategory::Valuation,
    ]
    .into_iter()
    .all(|category| breakdown.category(category) > 0.0);
    if quality {
        score = (score + 0.10).min(0.98);
    }

    if record.source == RecordSource::Hybrid && breakdown.critical_complete {
        score = score.max(0.95);
    }

    round2(score)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
