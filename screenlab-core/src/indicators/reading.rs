//! Tagged indicator outcome.
//!
//! Every indicator value is either a defined number, missing because the
//! window is shorter than the indicator needs, or undefined because an input
//! was missing or a denominator was zero. Gates and scorers consume these as
//! ordinary data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Value(f64),
    InsufficientData,
    Undefined,
}

impl Reading {
    /// Wrap a raw number; non-finite values become `Undefined`.
    pub fn of(value: f64) -> Self {
        if value.is_finite() {
            Reading::Value(value)
        } else {
            Reading::Undefined
        }
    }

    /// `num / den`, undefined when the denominator is zero or non-finite.
    pub fn ratio(num: Reading, den: Reading) -> Self {
        num.zip(den, |n, d| if d == 0.0 { f64::NAN } else { n / d })
    }

    /// `(num / den - 1) * 100`, undefined when the denominator is zero.
    pub fn pct_change(current: Reading, previous: Reading) -> Self {
        Self::ratio(current, previous).map(|r| (r - 1.0) * 100.0)
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Reading::Value(_))
    }

    pub fn is_insufficient(self) -> bool {
        matches!(self, Reading::InsufficientData)
    }

    /// Apply `f` to a defined value. Non-finite results become `Undefined`.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Reading::Value(v) => Reading::of(f(v)),
            other => other,
        }
    }

    /// Combine two readings. Insufficient data dominates undefined.
    pub fn zip(self, other: Reading, f: impl FnOnce(f64, f64) -> f64) -> Self {
        match (self, other) {
            (Reading::Value(a), Reading::Value(b)) => Reading::of(f(a, b)),
            (Reading::InsufficientData, _) | (_, Reading::InsufficientData) => {
                Reading::InsufficientData
            }
            _ => Reading::Undefined,
        }
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Reading::Undefined, Reading::of)
    }
}
