//! Calendar-window call counting per request category.
//!
//! The premium category is bucketed by calendar month, every other category by
//! calendar hour. A counter belongs to exactly one `(category, period)` pair;
//! when the period changes the old counter is replaced wholesale by a fresh one
//! rather than being zeroed in place.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::category::{RatePeriod, RequestCategory};
use crate::clock::Clock;

/// Identifies one calendar bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodKey {
    Month { year: i32, month: u8 },
    Hour { year: i32, ordinal: u16, hour: u8 },
}

impl PeriodKey {
    pub fn for_category(category: RequestCategory, at: OffsetDateTime) -> Self {
        match category.period() {
            RatePeriod::Month => Self::Month {
                year: at.year(),
                month: u8::from(at.month()),
            },
            RatePeriod::Hour => Self::Hour {
                year: at.year(),
                ordinal: at.ordinal(),
                hour: at.hour(),
            },
        }
    }

    /// Calendar month number (1-12) of the bucket.
    pub fn month(self) -> Option<u8> {
        match self {
            Self::Month { month, .. } => Some(month),
            Self::Hour { .. } => None,
        }
    }
}

/// Counter for one `(category, period)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub period: PeriodKey,
    pub count: u32,
}

/// Backing store for window counters.
///
/// The in-memory store is enough for a single instance; a shared deployment can
/// put the same contract in front of an external store.
pub trait UsageStore: Send + Sync + Debug {
    /// Calls recorded for `category` in `period`; zero if none yet.
    fn count(&self, category: RequestCategory, period: PeriodKey) -> u32;

    /// Records one call and returns the new count for `period`.
    fn increment(&self, category: RequestCategory, period: PeriodKey) -> u32;
}

/// One mutex per category; categories never contend with each other.
#[derive(Debug)]
pub struct InMemoryUsageStore {
    windows: HashMap<RequestCategory, Mutex<Option<RateWindow>>>,
}

impl Default for InMemoryUsageStore {
    fn default() -> Self {
        Self {
            windows: RequestCategory::ALL
                .into_iter()
                .map(|category| (category, Mutex::new(None)))
                .collect(),
        }
    }
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for InMemoryUsageStore {
    fn count(&self, category: RequestCategory, period: PeriodKey) -> u32 {
        let Some(slot) = self.windows.get(&category) else {
            return 0;
        };
        let window = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match *window {
            Some(window) if window.period == period => window.count,
            _ => 0,
        }
    }

    fn increment(&self, category: RequestCategory, period: PeriodKey) -> u32 {
        let Some(slot) = self.windows.get(&category) else {
            return 0;
        };
        let mut window = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let current = match *window {
            Some(existing) if existing.period == period => existing,
            previous => {
                if let Some(previous) = previous {
                    debug!(
                        category = %category,
                        abandoned_count = previous.count,
                        "rate window rolled over"
                    );
                }
                RateWindow { period, count: 0 }
            }
        };

        let next = RateWindow {
            period,
            count: current.count.saturating_add(1),
        };
        *window = Some(next);
        next.count
    }
}

/// Per-period call caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Monthly cap on the premium provider.
    pub premium_monthly: u32,
    pub property_search: u32,
    pub market_analysis: u32,
    pub lead_scoring: u32,
    pub deal_analysis: u32,
    pub tax_assessment: u32,
    pub public_records: u32,
    pub foreclosure: u32,
    pub title_search: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            premium_monthly: RequestCategory::Premium.default_cap(),
            property_search: RequestCategory::PropertySearch.default_cap(),
            market_analysis: RequestCategory::MarketAnalysis.default_cap(),
            lead_scoring: RequestCategory::LeadScoring.default_cap(),
            deal_analysis: RequestCategory::DealAnalysis.default_cap(),
            tax_assessment: RequestCategory::TaxAssessment.default_cap(),
            public_records: RequestCategory::PublicRecords.default_cap(),
            foreclosure: RequestCategory::Foreclosure.default_cap(),
            title_search: RequestCategory::TitleSearch.default_cap(),
        }
    }
}

impl RateLimits {
    pub const fn cap(&self, category: RequestCategory) -> u32 {
        match category {
            RequestCategory::Premium => self.premium_monthly,
            RequestCategory::PropertySearch => self.property_search,
            RequestCategory::MarketAnalysis => self.market_analysis,
            RequestCategory::LeadScoring => self.lead_scoring,
            RequestCategory::DealAnalysis => self.deal_analysis,
            RequestCategory::TaxAssessment => self.tax_assessment,
            RequestCategory::PublicRecords => self.public_records,
            RequestCategory::Foreclosure => self.foreclosure,
            RequestCategory::TitleSearch => self.title_search,
        }
    }
}

/// Usage of one category in its current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    pub category: RequestCategory,
    pub period: PeriodKey,
    pub calls: u32,
    pub cap: u32,
    pub remaining: u32,
}

/// Quota gate consulted before, and updated after, each premium call.
///
/// Callers check [`RateLimiter::allow`] before doing work and call
/// [`RateLimiter::record`] only once the work actually happened.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limits: RateLimits,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(limits, Arc::new(InMemoryUsageStore::new()), clock)
    }

    pub fn with_store(
        limits: RateLimits,
        store: Arc<dyn UsageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limits,
            store,
            clock,
        }
    }

    pub const fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Whether one more call fits in the category's current window. No side effects.
    pub fn allow(&self, category: RequestCategory) -> bool {
        let usage = self.usage(category);
        let allowed = usage.calls < usage.cap;
        if !allowed {
            warn!(
                category = %category,
                calls = usage.calls,
                cap = usage.cap,
                "rate limit reached"
            );
        }
        allowed
    }

    /// Counts one completed call and returns the usage after it.
    pub fn record(&self, category: RequestCategory) -> CategoryUsage {
        let period = PeriodKey::for_category(category, self.clock.now());
        let calls = self.store.increment(category, period);
        let cap = self.limits.cap(category);
        CategoryUsage {
            category,
            period,
            calls,
            cap,
            remaining: cap.saturating_sub(calls),
        }
    }

    pub fn usage(&self, category: RequestCategory) -> CategoryUsage {
        let period = PeriodKey::for_category(category, self.clock.now());
        let calls = self.store.count(category, period);
        let cap = self.limits.cap(category);
        CategoryUsage {
            category,
            period,
            calls,
            cap,
            remaining: cap.saturating_sub(calls),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;
    use time::macros::datetime;

    fn limiter_at(start: OffsetDateTime) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (RateLimiter::new(RateLimits::default(), clock.clone()), clock)
    }

    #[test]
    fn premium_allows_until_monthly_cap() {
        let (limiter, _clock) = limiter_at(datetime!(2026-10-01 00:00:00 UTC));

        for n in 0..400 {
            assert!(limiter.allow(RequestCategory::Premium), "call {n} should fit");
            limiter.record(RequestCategory::Premium);
        }

        assert!(!limiter.allow(RequestCategory::Premium));
        assert_eq!(limiter.usage(RequestCategory::Premium).remaining, 0);
    }

    #[test]
    fn premium_window_rolls_over_on_calendar_month() {
        let (limiter, clock) = limiter_at(datetime!(2026-10-31 23:00:00 UTC));
        for _ in 0..400 {
            limiter.record(RequestCategory::Premium);
        }
        assert!(!limiter.allow(RequestCategory::Premium));

        clock.advance(Duration::from_secs(59 * 60));
        assert!(!limiter.allow(RequestCategory::Premium), "still October");

        clock.advance(Duration::from_secs(60));
        assert!(limiter.allow(RequestCategory::Premium));
        assert_eq!(limiter.usage(RequestCategory::Premium).calls, 0);
        assert_eq!(limiter.record(RequestCategory::Premium).calls, 1);
    }

    #[test]
    fn same_month_next_year_is_a_new_window() {
        let (limiter, clock) = limiter_at(datetime!(2026-01-15 12:00:00 UTC));
        limiter.record(RequestCategory::Premium);
        clock.set(datetime!(2027-01-15 12:00:00 UTC));
        assert_eq!(limiter.usage(RequestCategory::Premium).calls, 0);
    }

    #[test]
    fn hourly_categories_reset_on_the_hour() {
        let (limiter, clock) = limiter_at(datetime!(2026-10-14 10:15:00 UTC));
        for _ in 0..50 {
            limiter.record(RequestCategory::MarketAnalysis);
        }
        assert!(!limiter.allow(RequestCategory::MarketAnalysis));
        assert!(limiter.allow(RequestCategory::LeadScoring));

        clock.advance(Duration::from_secs(45 * 60));
        assert!(limiter.allow(RequestCategory::MarketAnalysis));
    }

    #[test]
    fn allow_has_no_side_effects() {
        let (limiter, _clock) = limiter_at(datetime!(2026-10-14 10:15:00 UTC));
        for _ in 0..10 {
            assert!(limiter.allow(RequestCategory::Premium));
        }
        assert_eq!(limiter.usage(RequestCategory::Premium).calls, 0);
    }

    #[test]
    fn period_key_exposes_month_number() {
        let key = PeriodKey::for_category(
            RequestCategory::Premium,
            datetime!(2026-10-14 10:15:00 UTC),
        );
        assert_eq!(key.month(), Some(10));
        let hourly = PeriodKey::for_category(
            RequestCategory::TitleSearch,
            datetime!(2026-10-14 10:15:00 UTC),
        );
        assert_eq!(hourly.month(), None);
    }
}
