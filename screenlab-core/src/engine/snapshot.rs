//! Indicator snapshot: the derived per-bar record gates and scorers read.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::Reading;

/// Rolling features of one bar, computed from that bar and its predecessors only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bar: Bar,
    /// Position of this bar within the instrument window.
    pub index: usize,

    // ── Moving averages ──
    pub ma5: Reading,
    pub ma10: Reading,
    pub ma20: Reading,
    pub vol_ma5: Reading,
    pub vol_ma10: Reading,

    // ── Rolling extremes ──
    pub high_5: Reading,
    pub low_5: Reading,
    pub high_10: Reading,
    pub low_10: Reading,
    pub high_20: Reading,
    pub low_20: Reading,

    // ── Percent changes ──
    pub pct_1: Reading,
    pub pct_3: Reading,
    pub pct_5: Reading,
    pub pct_10: Reading,
    /// Mean of the last three close-to-close changes.
    pub avg_pct_3: Reading,
    /// `avg_pct_3` three bars earlier.
    pub prev_avg_pct_3: Reading,

    // ── Derived ratios (percent unless noted) ──
    pub ma5_distance_pct: Reading,
    pub ma10_distance_pct: Reading,
    pub pos_in_5_pct: Reading,
    pub pos_in_20_pct: Reading,
    /// Volume over its 5-bar mean (plain ratio).
    pub vol_ratio_5: Reading,
    pub pullback_from_high_10_pct: Reading,
    pub pullback_from_high_20_pct: Reading,
    /// MA5 / MA10 (plain ratio).
    pub ma5_over_ma10: Reading,
    /// MA10 / MA20 (plain ratio).
    pub ma10_over_ma20: Reading,
}

impl Snapshot {
    /// Every metric name `metric()` resolves.
    pub const METRICS: &'static [&'static str] = &[
        "close",
        "volume",
        "amount",
        "change_pct",
        "lower_shadow_ratio",
        "ma5",
        "ma10",
        "ma20",
        "vol_ma5",
        "vol_ma10",
        "high_5",
        "low_5",
        "high_10",
        "low_10",
        "high_20",
        "low_20",
        "pct_1",
        "pct_3",
        "pct_5",
        "pct_10",
        "avg_pct_3",
        "prev_avg_pct_3",
        "ma5_distance_pct",
        "ma10_distance_pct",
        "ma10_abs_distance_pct",
        "pos_in_5_pct",
        "pos_in_20_pct",
        "vol_ratio_5",
        "pullback_from_high_10_pct",
        "pullback_from_high_20_pct",
        "ma5_over_ma10",
        "ma10_over_ma20",
    ];

    pub fn is_metric(name: &str) -> bool {
        Self::METRICS.contains(&name)
    }

    pub fn close(&self) -> Reading {
        Reading::of(self.bar.close)
    }

    /// Day change: the store's value when present, else close-to-close.
    pub fn change_pct(&self) -> Reading {
        match self.bar.change_pct() {
            Some(pct) => Reading::of(pct),
            None => self.pct_1,
        }
    }

    /// Look up a metric by name. `None` for an unknown name.
    pub fn metric(&self, name: &str) -> Option<Reading> {
        let r = match name {
            "close" => self.close(),
            "volume" => Reading::of(self.bar.volume),
            "amount" => Reading::of(self.bar.amount),
            "change_pct" => self.change_pct(),
            "lower_shadow_ratio" => self.bar.lower_shadow_ratio().into(),
            "ma5" => self.ma5,
            "ma10" => self.ma10,
            "ma20" => self.ma20,
            "vol_ma5" => self.vol_ma5,
            "vol_ma10" => self.vol_ma10,
            "high_5" => self.high_5,
            "low_5" => self.low_5,
            "high_10" => self.high_10,
            "low_10" => self.low_10,
            "high_20" => self.high_20,
            "low_20" => self.low_20,
            "pct_1" => self.pct_1,
            "pct_3" => self.pct_3,
            "pct_5" => self.pct_5,
            "pct_10" => self.pct_10,
            "avg_pct_3" => self.avg_pct_3,
            "prev_avg_pct_3" => self.prev_avg_pct_3,
            "ma5_distance_pct" => self.ma5_distance_pct,
            "ma10_distance_pct" => self.ma10_distance_pct,
            "ma10_abs_distance_pct" => self.ma10_distance_pct.map(f64::abs),
            "pos_in_5_pct" => self.pos_in_5_pct,
            "pos_in_20_pct" => self.pos_in_20_pct,
            "vol_ratio_5" => self.vol_ratio_5,
            "pullback_from_high_10_pct" => self.pullback_from_high_10_pct,
            "pullback_from_high_20_pct" => self.pullback_from_high_20_pct,
            "ma5_over_ma10" => self.ma5_over_ma10,
            "ma10_over_ma20" => self.ma10_over_ma20,
            _ => return None,
        };
        Some(r)
    }
}

/// Position of `close` inside the `[low, high]` range in percent.
/// Undefined for a flat range.
pub(crate) fn position_in_range(close: Reading, low: Reading, high: Reading) -> Reading {
    Reading::ratio(close.zip(low, |c, l| c - l), high.zip(low, |h, l| h - l)).map(|r| r * 100.0)
}

/// Distance of `close` below `high` in percent of `high`.
pub(crate) fn pullback_from(close: Reading, high: Reading) -> Reading {
    Reading::pct_change(close, high).map(|v| -v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_metric_resolves() {
        let bars = crate::indicators::make_bars(&[10.0; 25]);
        let snaps = crate::engine::IndicatorEngine::new(20).compute(&bars).unwrap();
        let last = snaps.last().unwrap();
        for name in Snapshot::METRICS {
            assert!(last.metric(name).is_some(), "metric {name} did not resolve");
        }
        assert!(last.metric("nonsense").is_none());
    }

    #[test]
    fn flat_range_position_is_undefined() {
        let r = position_in_range(Reading::Value(10.0), Reading::Value(10.0), Reading::Value(10.0));
        assert_eq!(r, Reading::Undefined);
    }

    #[test]
    fn pullback_is_positive_below_high() {
        let r = pullback_from(Reading::Value(90.0), Reading::Value(100.0));
        assert!((r.value().unwrap() - 10.0).abs() < 1e-9);
    }
}
