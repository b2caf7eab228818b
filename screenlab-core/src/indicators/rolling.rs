//! Rolling extremes: highest high / lowest low over a lookback window.
//!
//! - Highest: max(high[t-period+1..=t])
//! - Lowest: min(low[t-period+1..=t])
//!
//! Lookback: period - 1.

use crate::domain::Bar;

use super::{Indicator, Reading, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Highest,
    Lowest,
}

impl Extreme {
    fn source(self) -> Source {
        match self {
            Extreme::Highest => Source::High,
            Extreme::Lowest => Source::Low,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RollingExtreme {
    period: usize,
    extreme: Extreme,
    name: String,
}

impl RollingExtreme {
    pub fn highest(period: usize) -> Self {
        Self::new(period, Extreme::Highest)
    }

    pub fn lowest(period: usize) -> Self {
        Self::new(period, Extreme::Lowest)
    }

    fn new(period: usize, extreme: Extreme) -> Self {
        assert!(period >= 1, "rolling period must be >= 1");
        Self {
            period,
            extreme,
            name: format!("{}{period}", extreme.source().prefix()),
        }
    }
}

impl Indicator for RollingExtreme {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Reading> {
        let n = bars.len();
        let mut result = vec![Reading::InsufficientData; n];

        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let source = self.extreme.source();
            let mut acc: Option<f64> = None;
            let mut has_nan = false;
            for j in (i + 1 - self.period)..=i {
                let Some(v) = source.reading(bars, j).value().filter(|v| v.is_finite()) else {
                    has_nan = true;
                    break;
                };
                acc = Some(match (acc, self.extreme) {
                    (None, _) => v,
                    (Some(a), Extreme::Highest) => a.max(v),
                    (Some(a), Extreme::Lowest) => a.min(v),
                });
            }

            result[i] = match (has_nan, acc) {
                (false, Some(v)) => Reading::Value(v),
                _ => Reading::Undefined,
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn highest_and_lowest() {
        // make_bars: high = max(open, close) + 1, low = min(open, close) - 1
        let bars = make_bars(&[10.0, 12.0, 11.0, 15.0, 13.0]);
        let high = RollingExtreme::highest(3).compute(&bars);
        let low = RollingExtreme::lowest(3).compute(&bars);

        assert!(high[1].is_insufficient());
        // window [1..=3]: highs 13, 13, 16
        assert_approx(high[3].value().unwrap(), 16.0, DEFAULT_EPSILON);
        // window [2..=4]: lows 10, 10, 12
        assert_approx(low[4].value().unwrap(), 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_in_window_is_undefined() {
        let mut bars = make_bars(&[10.0, 12.0, 11.0, 15.0]);
        bars[1].high = f64::NAN;
        let high = RollingExtreme::highest(2).compute(&bars);
        assert_eq!(high[1], Reading::Undefined);
        assert_eq!(high[2], Reading::Undefined);
        assert!(high[3].is_defined());
    }

    #[test]
    fn names() {
        assert_eq!(RollingExtreme::highest(20).name(), "high_20");
        assert_eq!(RollingExtreme::lowest(5).name(), "low_5");
    }
}
