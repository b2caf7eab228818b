//! Moving-average trend gates.
//!
//! Tolerances are per-strategy constants: the same "trend intact" check is
//! configured as `MA5 >= MA10 * 0.97` in one strategy and `* 0.98` in another.

use serde::{Deserialize, Serialize};

use crate::engine::Snapshot;
use crate::indicators::Reading;

use super::{defined, Gate, GateEvaluation, GateInput, RejectReason};

/// Which close moving average a parameter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaPeriod {
    Ma5,
    Ma10,
    Ma20,
}

impl MaPeriod {
    pub fn reading(self, snap: &Snapshot) -> Reading {
        match self {
            MaPeriod::Ma5 => snap.ma5,
            MaPeriod::Ma10 => snap.ma10,
            MaPeriod::Ma20 => snap.ma20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendIntactParams {
    pub fast: MaPeriod,
    pub slow: MaPeriod,
    /// fast must be at least `slow * tolerance`.
    pub tolerance: f64,
    /// Require `fast > slow * tolerance` instead of `>=`.
    pub strict: bool,
    /// Also require close above the fast average.
    pub close_above_fast: bool,
}

impl Default for TrendIntactParams {
    fn default() -> Self {
        Self {
            fast: MaPeriod::Ma5,
            slow: MaPeriod::Ma10,
            tolerance: 0.97,
            strict: false,
            close_above_fast: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendIntact {
    params: TrendIntactParams,
}

impl TrendIntact {
    pub fn new(params: TrendIntactParams) -> Self {
        Self { params }
    }
}

impl Gate for TrendIntact {
    fn name(&self) -> &str {
        "trend_intact"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["trend_ratio"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let p = &self.params;
        let snap = input.latest();
        let [close, fast, slow] = match defined([snap.close(), p.fast.reading(snap), p.slow.reading(snap)]) {
            Ok(v) => v,
            Err(reason) => return GateEvaluation::reject(reason),
        };
        if slow == 0.0 {
            return GateEvaluation::reject(RejectReason::UndefinedInput);
        }
        let floor = slow * p.tolerance;
        let mut ok = if p.strict { fast > floor } else { fast >= floor };
        if p.close_above_fast {
            ok &= close > fast;
        }
        GateEvaluation::check(ok).with_value("trend_ratio", fast / slow)
    }
}

/// Bullish alignment: close > MA5 > MA10 > MA20.
#[derive(Debug, Clone, Default)]
pub struct MaAlignment;

impl Gate for MaAlignment {
    fn name(&self) -> &str {
        "ma_alignment"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        match defined([s.close(), s.ma5, s.ma10, s.ma20]) {
            Ok([c, m5, m10, m20]) => GateEvaluation::check(c > m5 && m5 > m10 && m10 > m20),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

/// Averages are tangled: neither bullish (MA5 > MA10 > MA20) nor bearish
/// (MA5 < MA10 < MA20) alignment.
#[derive(Debug, Clone, Default)]
pub struct MaInterwoven;

impl Gate for MaInterwoven {
    fn name(&self) -> &str {
        "ma_interwoven"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        match defined([s.ma5, s.ma10, s.ma20]) {
            Ok([m5, m10, m20]) => {
                let bullish = m5 > m10 && m10 > m20;
                let bearish = m5 < m10 && m10 < m20;
                GateEvaluation::check(!bullish && !bearish)
            }
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandsOnAveragesParams {
    pub ma5_tolerance: f64,
    pub ma10_tolerance: f64,
}

impl Default for StandsOnAveragesParams {
    fn default() -> Self {
        Self {
            ma5_tolerance: 0.98,
            ma10_tolerance: 0.95,
        }
    }
}

/// Close holds near its short averages while MA5 stays above MA10.
#[derive(Debug, Clone)]
pub struct StandsOnAverages {
    params: StandsOnAveragesParams,
}

impl StandsOnAverages {
    pub fn new(params: StandsOnAveragesParams) -> Self {
        Self { params }
    }
}

impl Gate for StandsOnAverages {
    fn name(&self) -> &str {
        "stands_on_averages"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        match defined([s.close(), s.ma5, s.ma10]) {
            Ok([c, m5, m10]) => GateEvaluation::check(
                c >= m5 * self.params.ma5_tolerance
                    && c >= m10 * self.params.ma10_tolerance
                    && m5 > m10,
            ),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::testing::{history, reference};
    use crate::gates::GateVerdict;
    use crate::indicators::make_bars;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 10.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn tolerance_is_a_parameter() {
        // MA5 about 2.5% below MA10
        let mut closes = vec![10.0; 15];
        closes.extend([9.7, 9.7, 9.7, 9.7, 9.7]);
        let h = history(&make_bars(&closes));
        let r = reference();
        let input = GateInput::new(&r, &h).unwrap();

        let loose = TrendIntact::new(TrendIntactParams::default());
        let tight = TrendIntact::new(TrendIntactParams {
            tolerance: 0.98,
            ..TrendIntactParams::default()
        });
        // ma5 = 9.7, ma10 = 9.85 → ratio 0.9848
        assert!(loose.evaluate(&input).is_passed());
        assert!(tight.evaluate(&input).is_passed());

        let tighter = TrendIntact::new(TrendIntactParams {
            tolerance: 0.99,
            ..TrendIntactParams::default()
        });
        assert!(!tighter.evaluate(&input).is_passed());
    }

    #[test]
    fn strict_comparison_with_unit_tolerance() {
        let h = history(&make_bars(&[10.0; 20]));
        let r = reference();
        let input = GateInput::new(&r, &h).unwrap();
        let strict = TrendIntact::new(TrendIntactParams {
            fast: MaPeriod::Ma10,
            slow: MaPeriod::Ma20,
            tolerance: 1.0,
            strict: true,
            close_above_fast: false,
        });
        assert!(!strict.evaluate(&input).is_passed());
    }

    #[test]
    fn ma20_missing_is_insufficient_history() {
        let h = history(&make_bars(&rising(12)));
        let r = reference();
        let eval = MaAlignment.evaluate(&GateInput::new(&r, &h).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::InsufficientHistory));
    }

    #[test]
    fn alignment_and_interwoven_are_exclusive_on_trend() {
        let h = history(&make_bars(&rising(25)));
        let r = reference();
        let input = GateInput::new(&r, &h).unwrap();
        assert!(MaAlignment.evaluate(&input).is_passed());
        assert!(!MaInterwoven.evaluate(&input).is_passed());
    }

    #[test]
    fn stands_on_averages_on_uptrend() {
        let h = history(&make_bars(&rising(12)));
        let r = reference();
        let gate = StandsOnAverages::new(StandsOnAveragesParams::default());
        assert!(gate.evaluate(&GateInput::new(&r, &h).unwrap()).is_passed());
    }
}
