//! Indicator engine: turns an instrument's bar window into snapshots.
//!
//! The engine checks the window (length, ordering, sanity) before computing
//! anything. A window shorter than `min_bars` is an explicit
//! `IndicatorError::InsufficientData`, never a partially computed result.
//! Individual long-window fields may still be `Reading::InsufficientData`
//! when `min_bars` is below the longest window.

pub mod snapshot;

use thiserror::Error;

use crate::domain::Bar;
use crate::indicators::{
    compute_warmup, precompute, Indicator, IndicatorValues, PctChange, Reading, RollingExtreme,
    Sma,
};

pub use snapshot::Snapshot;

/// Moving-average and rolling-extreme windows computed for every instrument.
pub const WINDOWS: [usize; 3] = [5, 10, 20];

/// Percent-change horizons.
pub const CHANGE_HORIZONS: [usize; 4] = [1, 3, 5, 10];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("insufficient data: {available} bars available, {required} required")]
    InsufficientData { required: usize, available: usize },

    #[error("bars not strictly ascending by date at index {index}")]
    Unordered { index: usize },

    #[error("bar at index {index} belongs to {found}, expected {expected}")]
    MixedInstruments {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("malformed bar at index {index} ({date})")]
    MalformedBar { index: usize, date: chrono::NaiveDate },
}

impl IndicatorError {
    /// Malformed input, as opposed to a merely short window.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, IndicatorError::InsufficientData { .. })
    }
}

/// Computes snapshots for one instrument window.
pub struct IndicatorEngine {
    min_bars: usize,
    indicators: Vec<Box<dyn Indicator>>,
}

impl std::fmt::Debug for IndicatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorEngine")
            .field("min_bars", &self.min_bars)
            .field(
                "indicators",
                &self.indicators.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl IndicatorEngine {
    pub fn new(min_bars: usize) -> Self {
        Self {
            min_bars: min_bars.max(1),
            indicators: standard_indicators(),
        }
    }

    pub fn min_bars(&self) -> usize {
        self.min_bars
    }

    /// Bars needed before every snapshot field can be defined.
    pub fn full_warmup(&self) -> usize {
        // prev_avg_pct_3 reads avg_pct_3 three bars back.
        compute_warmup(&self.indicators).max(3 + 3) + 1
    }

    /// Validate the window and compute one snapshot per bar, in input order.
    pub fn compute(&self, bars: &[Bar]) -> Result<Vec<Snapshot>, IndicatorError> {
        validate_window(bars)?;
        if bars.len() < self.min_bars {
            return Err(IndicatorError::InsufficientData {
                required: self.min_bars,
                available: bars.len(),
            });
        }

        let iv = precompute(bars, &self.indicators);
        Ok(bars
            .iter()
            .enumerate()
            .map(|(i, bar)| build_snapshot(bar, i, &iv))
            .collect())
    }

    /// Snapshot of the last bar only.
    pub fn latest(&self, bars: &[Bar]) -> Result<Snapshot, IndicatorError> {
        let mut snaps = self.compute(bars)?;
        snaps.pop().ok_or(IndicatorError::InsufficientData {
            required: self.min_bars,
            available: 0,
        })
    }
}

/// The indicator set every snapshot is built from.
pub fn standard_indicators() -> Vec<Box<dyn Indicator>> {
    let mut out: Vec<Box<dyn Indicator>> = Vec::new();
    for w in WINDOWS {
        out.push(Box::new(Sma::close(w)));
        out.push(Box::new(RollingExtreme::highest(w)));
        out.push(Box::new(RollingExtreme::lowest(w)));
    }
    out.push(Box::new(Sma::volume(5)));
    out.push(Box::new(Sma::volume(10)));
    for h in CHANGE_HORIZONS {
        out.push(Box::new(PctChange::new(h)));
    }
    out.push(Box::new(Sma::close_change(3)));
    out
}

fn validate_window(bars: &[Bar]) -> Result<(), IndicatorError> {
    let Some(first) = bars.first() else {
        return Err(IndicatorError::InsufficientData {
            required: 1,
            available: 0,
        });
    };
    for (i, bar) in bars.iter().enumerate() {
        if bar.instrument != first.instrument {
            return Err(IndicatorError::MixedInstruments {
                index: i,
                expected: first.instrument.clone(),
                found: bar.instrument.clone(),
            });
        }
        if !bar.is_sane() {
            return Err(IndicatorError::MalformedBar {
                index: i,
                date: bar.date,
            });
        }
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(IndicatorError::Unordered { index: i });
        }
    }
    Ok(())
}

fn build_snapshot(bar: &Bar, i: usize, iv: &IndicatorValues) -> Snapshot {
    let close = Reading::of(bar.close);
    let ma5 = iv.get("sma_5", i);
    let ma10 = iv.get("sma_10", i);
    let ma20 = iv.get("sma_20", i);
    let vol_ma5 = iv.get("vol_sma_5", i);
    let high_5 = iv.get("high_5", i);
    let low_5 = iv.get("low_5", i);
    let high_10 = iv.get("high_10", i);
    let high_20 = iv.get("high_20", i);
    let low_20 = iv.get("low_20", i);
    let prev_avg_pct_3 = if i >= 3 {
        iv.get("chg_sma_3", i - 3)
    } else {
        Reading::InsufficientData
    };

    Snapshot {
        bar: bar.clone(),
        index: i,
        ma5,
        ma10,
        ma20,
        vol_ma5,
        vol_ma10: iv.get("vol_sma_10", i),
        high_5,
        low_5,
        high_10,
        low_10: iv.get("low_10", i),
        high_20,
        low_20,
        pct_1: iv.get("pct_1", i),
        pct_3: iv.get("pct_3", i),
        pct_5: iv.get("pct_5", i),
        pct_10: iv.get("pct_10", i),
        avg_pct_3: iv.get("chg_sma_3", i),
        prev_avg_pct_3,
        ma5_distance_pct: Reading::pct_change(close, ma5),
        ma10_distance_pct: Reading::pct_change(close, ma10),
        pos_in_5_pct: snapshot::position_in_range(close, low_5, high_5),
        pos_in_20_pct: snapshot::position_in_range(close, low_20, high_20),
        vol_ratio_5: Reading::ratio(Reading::of(bar.volume), vol_ma5),
        pullback_from_high_10_pct: snapshot::pullback_from(close, high_10),
        pullback_from_high_20_pct: snapshot::pullback_from(close, high_20),
        ma5_over_ma10: Reading::ratio(ma5, ma10),
        ma10_over_ma20: Reading::ratio(ma10, ma20),
    }
}
