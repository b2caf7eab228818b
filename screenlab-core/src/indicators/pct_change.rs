//! Percent change of close over N bars.
//!
//! pct[t] = (close[t] / close[t-period] - 1) * 100
//! Undefined when the earlier close is zero or missing.
//! Lookback: period.

use crate::domain::Bar;

use super::{Indicator, Reading};

#[derive(Debug, Clone)]
pub struct PctChange {
    period: usize,
    name: String,
}

impl PctChange {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "pct change period must be >= 1");
        Self {
            period,
            name: format!("pct_{period}"),
        }
    }
}

impl Indicator for PctChange {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Reading> {
        let n = bars.len();
        let mut result = vec![Reading::InsufficientData; n];

        for i in self.period..n {
            result[i] = Reading::pct_change(
                Reading::of(bars[i].close),
                Reading::of(bars[i - self.period].close),
            );
        }

        result
    }
}
