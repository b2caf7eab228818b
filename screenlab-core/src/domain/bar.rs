//! Bar: one trading day for one instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar plus previous close, reported change and turnover.
///
/// `pre_close` and `pct_change` come from the data store and may be absent.
/// Prices are in quote currency, `amount` (turnover) in the same currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub instrument: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub pre_close: Option<f64>,
    #[serde(default)]
    pub pct_change: Option<f64>,
    pub volume: f64,
    #[serde(default)]
    pub amount: f64,
}

impl Bar {
    /// Returns true if any OHLC or volume field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    /// Day change in percent.
    ///
    /// Uses the stored change when present, otherwise derives it from the
    /// previous close. `None` when neither is usable (missing or zero previous close).
    pub fn change_pct(&self) -> Option<f64> {
        if let Some(pct) = self.pct_change.filter(|p| p.is_finite()) {
            return Some(pct);
        }
        match self.pre_close {
            Some(prev) if prev != 0.0 && prev.is_finite() => Some((self.close / prev - 1.0) * 100.0),
            _ => None,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Lower shadow (min(open, close) - low) as a fraction of the day's range.
    ///
    /// `None` for a zero-range bar.
    pub fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        if range <= 0.0 || !range.is_finite() {
            return None;
        }
        Some((self.open.min(self.close) - self.low) / range)
    }
}
