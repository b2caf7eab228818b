//! Indicator primitives.
//!
//! Every indicator implements the `Indicator` trait and produces one
//! `Reading` per input bar. The snapshot engine combines them into
//! per-bar `Snapshot` records.

pub mod indicator;
pub mod pct_change;
pub mod reading;
pub mod rolling;
pub mod sma;

pub use indicator::{compute_warmup, precompute, Indicator, IndicatorValues, Source};
pub use pct_change::PctChange;
pub use reading::Reading;
pub use rolling::{Extreme, RollingExtreme};
pub use sma::Sma;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                instrument: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                pre_close: if i == 0 { None } else { Some(closes[i - 1]) },
                pct_change: None,
                volume: 1000.0,
                amount: 1000.0 * close,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
