//! Simple Moving Average (SMA).
//!
//! Rolling mean of a bar source over a fixed window.
//! Lookback: period - 1 plus the source warmup.

use crate::domain::Bar;

use super::{Indicator, Reading, Source};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: Source,
    name: String,
}

impl Sma {
    pub fn new(period: usize, source: Source) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            source,
            name: format!("{}sma_{period}", source.prefix()),
        }
    }

    pub fn close(period: usize) -> Self {
        Self::new(period, Source::Close)
    }

    pub fn volume(period: usize) -> Self {
        Self::new(period, Source::Volume)
    }

    /// Mean of close-to-close percent changes.
    pub fn close_change(period: usize) -> Self {
        Self::new(period, Source::CloseChange)
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1 + self.source.warmup()
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Reading> {
        let n = bars.len();
        let mut result = vec![Reading::InsufficientData; n];
        let first = self.lookback();

        // Roll the window, counting inputs that are not defined numbers.
        let inputs: Vec<Option<f64>> = (0..n).map(|i| self.source.reading(bars, i).value()).collect();
        let mut sum = 0.0;
        let mut missing = 0usize;
        for i in 0..n {
            match inputs[i] {
                Some(v) => sum += v,
                None => missing += 1,
            }
            if i >= self.period {
                match inputs[i - self.period] {
                    Some(v) => sum -= v,
                    None => missing -= 1,
                }
            }
            if i < first {
                continue;
            }
            result[i] = if missing == 0 {
                Reading::of(sum / self.period as f64)
            } else {
                Reading::Undefined
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
    fn sma_5_basic() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let result = Sma::close(5).compute(&bars);

        assert_eq!(result.len(), 7);
        for r in &result[..4] {
            assert_eq!(*r, Reading::InsufficientData);
        }
        assert_approx(result[4].value().unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result[5].value().unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(result[6].value().unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_is_undefined_not_skipped() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        bars[2].close = f64::NAN;
        let result = Sma::close(3).compute(&bars);
        // Windows containing index 2 are undefined.
        assert_eq!(result[2], Reading::Undefined);
        assert_eq!(result[3], Reading::Undefined);
        assert_eq!(result[4], Reading::Undefined);
        assert_approx(result[5].value().unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_volume_name_and_value() {
        let mut bars = make_bars(&[10.0, 10.0, 10.0]);
        bars[0].volume = 100.0;
        bars[1].volume = 200.0;
        bars[2].volume = 300.0;
        let sma = Sma::volume(3);
        assert_eq!(sma.name(), "vol_sma_3");
        assert_approx(sma.compute(&bars)[2].value().unwrap(), 200.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_of_close_change_needs_extra_bar() {
        let bars = make_bars(&[100.0, 110.0, 121.0, 133.1]);
        let sma = Sma::close_change(3);
        assert_eq!(sma.lookback(), 3);
        let result = sma.compute(&bars);
        assert_eq!(result[2], Reading::InsufficientData);
        assert_approx(result[3].value().unwrap(), 10.0, 1e-9);
    }

    #[test]
    fn sma_too_few_bars() {
        let bars = make_bars(&[10.0, 11.0]);
        let result = Sma::close(5).compute(&bars);
        assert!(result.iter().all(|r| r.is_insufficient()));
    }
}
