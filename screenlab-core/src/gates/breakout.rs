//! Breakout gates: high range position and clearing the prior high.

use serde::{Deserialize, Serialize};

use crate::indicators::Reading;

use super::{defined, Gate, GateEvaluation, GateInput, RejectReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighPositionParams {
    /// Minimum position in the 5-bar high-low range, percent.
    pub min_position_pct: f64,
}

impl Default for HighPositionParams {
    fn default() -> Self {
        Self {
            min_position_pct: 70.0,
        }
    }
}

/// Close near the top of its recent range. A flat range is undefined.
#[derive(Debug, Clone)]
pub struct HighPosition {
    params: HighPositionParams,
}

impl HighPosition {
    pub fn new(params: HighPositionParams) -> Self {
        Self { params }
    }
}

impl Gate for HighPosition {
    fn name(&self) -> &str {
        "high_position"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        match defined([input.latest().pos_in_5_pct]) {
            Ok([pos]) => GateEvaluation::check(pos >= self.params.min_position_pct),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBreakoutParams {
    /// Minimum day change, percent.
    pub min_change_pct: f64,
    /// Number of bars before the latest whose highs form the resistance.
    pub lookback: usize,
    /// Close must clear that high by more than this, percent.
    pub min_clearance_pct: f64,
}

impl Default for PriceBreakoutParams {
    fn default() -> Self {
        Self {
            min_change_pct: 5.0,
            lookback: 10,
            min_clearance_pct: 2.0,
        }
    }
}

/// A strong up day that closes clearly above the prior `lookback`-bar high.
#[derive(Debug, Clone)]
pub struct PriceBreakout {
    params: PriceBreakoutParams,
}

impl PriceBreakout {
    pub fn new(params: PriceBreakoutParams) -> Self {
        Self { params }
    }

    /// Highest high of the `lookback` bars before the latest.
    fn prior_high(&self, input: &GateInput<'_>) -> Reading {
        let len = input.history.len();
        let n = self.params.lookback;
        if n == 0 || len <= n {
            return Reading::InsufficientData;
        }
        input.history[len - 1 - n..len - 1]
            .iter()
            .map(|s| Reading::of(s.bar.high))
            .fold(Reading::Value(f64::NEG_INFINITY), |acc, h| acc.zip(h, f64::max))
    }
}

impl Gate for PriceBreakout {
    fn name(&self) -> &str {
        "price_breakout"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["breakout_clearance_pct"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        let clearance = Reading::pct_change(s.close(), self.prior_high(input));
        let [change, clearance] = match defined([s.change_pct(), clearance]) {
            Ok(v) => v,
            Err(reason) => return GateEvaluation::reject(reason),
        };
        if change < self.params.min_change_pct {
            return GateEvaluation::reject(RejectReason::Threshold);
        }
        GateEvaluation::check(clearance > self.params.min_clearance_pct)
            .with_value("breakout_clearance_pct", clearance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::testing::{history, reference};
    use crate::gates::GateVerdict;
    use crate::indicators::make_bars;

    #[test]
    fn breakout_clears_prior_high() {
        // ten bars at 10 (highs 11), then a +20% day to 12 → clearance 9.09%
        let mut closes = vec![10.0; 11];
        closes.push(12.0);
        let h = history(&make_bars(&closes));
        let r = reference();
        let eval = PriceBreakout::new(PriceBreakoutParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert!(eval.is_passed());
        let c = eval.evidence.value("breakout_clearance_pct").unwrap();
        assert!((c - (12.0 / 11.0 - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn small_day_change_rejects() {
        let mut closes = vec![10.0; 11];
        closes.push(10.3);
        let h = history(&make_bars(&closes));
        let r = reference();
        let eval = PriceBreakout::new(PriceBreakoutParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::Threshold));
    }

    #[test]
    fn needs_lookback_plus_one_bars() {
        let h = history(&make_bars(&[10.0; 10]));
        let r = reference();
        let eval = PriceBreakout::new(PriceBreakoutParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::InsufficientHistory));
    }

    #[test]
    fn high_position_flat_range_undefined() {
        let mut bars = make_bars(&[10.0; 6]);
        for b in &mut bars {
            b.high = 10.0;
            b.low = 10.0;
        }
        let h = history(&bars);
        let r = reference();
        let eval = HighPosition::new(HighPositionParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::UndefinedInput));
    }
}
