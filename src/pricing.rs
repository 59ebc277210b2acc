//! Revenue pricing policies for sales-point keys.
//!
//! A redeemed key contributes revenue under exactly one policy per call:
//! - [`PricingPolicy::ActualPrice`]: the `price_paid` recorded on the key
//!   (keys without one contribute 0)
//! - [`PricingPolicy::EstimatedByDuration`]: a fixed price looked up from the
//!   key's duration, ignoring `price_paid`
//!
//! The two can disagree when prices change over time, so callers choose
//! explicitly instead of falling back from one to the other.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Price per day applied to durations missing from the table.
pub const DEFAULT_PER_DAY_PRICE: i64 = 15;

/// Estimated sale price by key duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationPriceTable {
    prices: BTreeMap<i64, i64>,
    per_day: i64,
}

impl DurationPriceTable {
    pub fn new(prices: BTreeMap<i64, i64>, per_day: i64) -> Self {
        Self { prices, per_day }
    }

    pub fn price_for(&self, duration_days: i64) -> i64 {
        self.prices
            .get(&duration_days)
            .copied()
            .unwrap_or_else(|| duration_days.saturating_mul(self.per_day))
    }
}

impl Default for DurationPriceTable {
    fn default() -> Self {
        let prices = [30, 60, 90, 180, 365]
            .into_iter()
            .map(|days| (days, 1000))
            .collect();
        Self::new(prices, DEFAULT_PER_DAY_PRICE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PricingPolicy {
    #[default]
    ActualPrice,
    EstimatedByDuration(DurationPriceTable),
}

impl PricingPolicy {
    /// Revenue attributed to one redeemed key.
    pub fn key_revenue(&self, price_paid: Option<i64>, duration_days: i64) -> i64 {
        match self {
            Self::ActualPrice => price_paid.unwrap_or(0),
            Self::EstimatedByDuration(table) => table.price_for(duration_days),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ActualPrice => "actual",
            Self::EstimatedByDuration(_) => "estimated",
        }
    }
}

impl FromStr for PricingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actual" | "actual_price" => Ok(Self::ActualPrice),
            "estimated" | "estimated_by_duration" => {
                Ok(Self::EstimatedByDuration(DurationPriceTable::default()))
            }
            other => Err(format!("unknown pricing policy: {}", other)),
        }
    }
}
