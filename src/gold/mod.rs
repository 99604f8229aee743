//! Gold rate collaborator
//!
//! Golden insects are worth a share of the current gold price. The round only
//! ever reads the last cached rate; fetching happens in the background.

mod cache;
mod feed;

pub use cache::{FixedGoldSource, GoldRateCache, GoldRateSource};
#[cfg(feature = "gold_feed")]
pub use feed::CbrGoldFeed;
pub use feed::{metals_url, parse_metals_xml, FeedError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::constants::gold;

/// A gold price snapshot (currency per kg)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldRate {
    pub value: f64,
    pub label: String,
    pub fetched_at: DateTime<Utc>,
}

impl GoldRate {
    pub fn new(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Rate used when nothing has been fetched yet
    pub fn fallback() -> Self {
        Self::new(gold::DEFAULT_RATE, gold::DEFAULT_LABEL)
    }

    /// Points a golden insect is worth at this rate
    pub fn points_value(&self) -> i64 {
        if !self.value.is_finite() || self.value <= 0.0 {
            return 0;
        }
        (self.value / gold::RATE_PER_POINT).floor() as i64
    }

    /// Full value with thousands separators, e.g. `7,500,000.00`
    pub fn formatted_value(&self) -> String {
        let fixed = format!("{:.2}", self.value.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let sign = if self.value < 0.0 { "-" } else { "" };
        format!("{sign}{grouped}.{frac_part}")
    }

    /// Compact form: `7.5M` or `750.0K`
    pub fn short_value(&self) -> String {
        let thousands = self.value / 1000.0;
        if thousands >= 1000.0 {
            format!("{:.1}M", thousands / 1000.0)
        } else {
            format!("{:.1}K", thousands)
        }
    }

    /// Millions with one decimal, for the rate widget
    pub fn widget_value(&self) -> String {
        format!("{:.1}", self.value / 1_000_000.0)
    }
}

impl Default for GoldRate {
    fn default() -> Self {
        Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_value() {
        assert_eq!(GoldRate::new(7_500_000.0, "Gold").points_value(), 750);
        assert_eq!(GoldRate::new(9_999.0, "Gold").points_value(), 0);
        assert_eq!(GoldRate::new(12_345_678.9, "Gold").points_value(), 1234);
        assert_eq!(GoldRate::new(f64::NAN, "Gold").points_value(), 0);
    }

    #[test]
    fn test_fallback() {
        let rate = GoldRate::fallback();
        assert_eq!(rate.value, 7_500_000.0);
        assert_eq!(rate.points_value(), 750);
    }

    #[test]
    fn test_formatting() {
        let rate = GoldRate::new(7_500_000.0, "Gold");
        assert_eq!(rate.formatted_value(), "7,500,000.00");
        assert_eq!(rate.short_value(), "7.5M");
        assert_eq!(rate.widget_value(), "7.5");

        let small = GoldRate::new(750_000.0, "Gold");
        assert_eq!(small.short_value(), "750.0K");
        assert_eq!(GoldRate::new(999.5, "Gold").formatted_value(), "999.50");
    }
}
