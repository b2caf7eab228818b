//! Indicator trait, input sources and the precomputed values container.
//!
//! Indicators are pure functions: bar history in, reading series out.
//! They are computed once per instrument window and looked up by bar index.

use std::collections::HashMap;

use crate::domain::Bar;

use super::Reading;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a reading series of the same
/// length. The first `lookback()` entries are `Reading::InsufficientData`.
///
/// # Look-ahead guard
/// No reading at bar t may depend on bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Series name (e.g. "sma_5", "high_10").
    fn name(&self) -> &str;

    /// Number of bars before the first defined reading.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<Reading>;
}

/// Per-bar input an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Close,
    High,
    Low,
    Volume,
    /// Close-to-close change in percent; needs the previous bar.
    CloseChange,
}

impl Source {
    /// Extra bars this source needs before its first defined value.
    pub fn warmup(self) -> usize {
        match self {
            Source::CloseChange => 1,
            _ => 0,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Source::Close => "",
            Source::High => "high_",
            Source::Low => "low_",
            Source::Volume => "vol_",
            Source::CloseChange => "chg_",
        }
    }

    pub fn reading(self, bars: &[Bar], i: usize) -> Reading {
        let bar = &bars[i];
        match self {
            Source::Close => Reading::of(bar.close),
            Source::High => Reading::of(bar.high),
            Source::Low => Reading::of(bar.low),
            Source::Volume => Reading::of(bar.volume),
            Source::CloseChange => {
                if i == 0 {
                    Reading::InsufficientData
                } else {
                    Reading::pct_change(Reading::of(bar.close), Reading::of(bars[i - 1].close))
                }
            }
        }
    }
}

/// Container for precomputed indicator series of one instrument.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<Reading>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Reading>) {
        self.series.insert(name.into(), values);
    }

    /// Reading at a bar index; `Undefined` for an unknown series,
    /// `InsufficientData` past the end.
    pub fn get(&self, name: &str, bar_index: usize) -> Reading {
        match self.series.get(name) {
            Some(series) => series
                .get(bar_index)
                .copied()
                .unwrap_or(Reading::InsufficientData),
            None => Reading::Undefined,
        }
    }

    pub fn get_series(&self, name: &str) -> Option<&[Reading]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Compute every indicator over one window.
pub fn precompute(bars: &[Bar], indicators: &[Box<dyn Indicator>]) -> IndicatorValues {
    let mut iv = IndicatorValues::new();
    for indicator in indicators {
        let series = indicator.compute(bars);
        debug_assert_eq!(
            series.len(),
            bars.len(),
            "indicator '{}' produced {} values for {} bars",
            indicator.name(),
            series.len(),
            bars.len()
        );
        iv.insert(indicator.name(), series);
    }
    iv
}

/// Longest lookback across a set of indicators.
pub fn compute_warmup(indicators: &[Box<dyn Indicator>]) -> usize {
    indicators.iter().map(|i| i.lookback()).max().unwrap_or(0)
}
