//! Candle-shape gates.

use serde::{Deserialize, Serialize};

use super::{defined, Bounds, Gate, GateEvaluation, GateInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversalCandleParams {
    /// Day change, percent.
    pub change_pct: Bounds,
    /// Lower shadow as a fraction of the day's range.
    pub min_lower_shadow: f64,
}

impl Default for ReversalCandleParams {
    fn default() -> Self {
        Self {
            change_pct: Bounds::new(0.0, 5.0),
            min_lower_shadow: 0.3,
        }
    }
}

/// A modest up (or flat) day with a long lower shadow.
#[derive(Debug, Clone)]
pub struct ReversalCandle {
    params: ReversalCandleParams,
}

impl ReversalCandle {
    pub fn new(params: ReversalCandleParams) -> Self {
        Self { params }
    }
}

impl Gate for ReversalCandle {
    fn name(&self) -> &str {
        "reversal_candle"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["lower_shadow_ratio"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        let shadow = s.bar.lower_shadow_ratio().into();
        match defined([s.change_pct(), shadow]) {
            Ok([change, shadow]) => GateEvaluation::check(
                self.params.change_pct.contains(change) && shadow >= self.params.min_lower_shadow,
            )
            .with_value("lower_shadow_ratio", shadow),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallBullishStreakParams {
    pub min_days: usize,
    /// Day change of each streak bar, percent.
    pub change_pct: Bounds,
}

impl Default for SmallBullishStreakParams {
    fn default() -> Self {
        Self {
            min_days: 3,
            change_pct: Bounds::new(0.5, 6.0),
        }
    }
}

/// Consecutive small bullish candles ending at the latest bar.
#[derive(Debug, Clone)]
pub struct SmallBullishStreak {
    params: SmallBullishStreakParams,
}

impl SmallBullishStreak {
    pub fn new(params: SmallBullishStreakParams) -> Self {
        Self { params }
    }
}

impl Gate for SmallBullishStreak {
    fn name(&self) -> &str {
        "small_bullish_streak"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["bullish_streak", "streak_avg_change_pct"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let mut streak = 0usize;
        let mut total_change = 0.0;
        for snap in input.history.iter().rev() {
            let small_bullish = snap.bar.is_bullish()
                && snap
                    .change_pct()
                    .value()
                    .is_some_and(|c| self.params.change_pct.contains(c));
            if !small_bullish {
                break;
            }
            streak += 1;
            total_change += snap.change_pct().value().unwrap_or(0.0);
        }

        let avg = if streak > 0 {
            total_change / streak as f64
        } else {
            0.0
        };
        GateEvaluation::check(streak >= self.params.min_days)
            .with_value("bullish_streak", streak as f64)
            .with_value("streak_avg_change_pct", avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::testing::{history, reference};
    use crate::indicators::make_bars;

    #[test]
    fn hammer_passes() {
        let mut bars = make_bars(&[10.0, 10.0, 10.2]);
        // open 10.0, close 10.2, low 9.0, high 10.3 → shadow 1.0 / 1.3
        bars[2].open = 10.0;
        bars[2].high = 10.3;
        bars[2].low = 9.0;
        let h = history(&bars);
        let r = reference();
        let eval = ReversalCandle::new(ReversalCandleParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert!(eval.is_passed());
    }

    #[test]
    fn down_day_is_not_reversal() {
        let h = history(&make_bars(&[10.0, 10.0, 9.5]));
        let r = reference();
        let eval = ReversalCandle::new(ReversalCandleParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert!(!eval.is_passed());
    }

    #[test]
    fn streak_counts_from_latest() {
        // make_bars opens at the previous close, so rising closes are bullish.
        let closes = [10.0, 9.0, 9.1, 9.2, 9.3, 9.4];
        let h = history(&make_bars(&closes));
        let r = reference();
        let eval = SmallBullishStreak::new(SmallBullishStreakParams::default())
            .evaluate(&GateInput::new(&r, &h).unwrap());
        assert!(eval.is_passed());
        assert_eq!(eval.evidence.value("bullish_streak"), Some(4.0));
    }

    #[test]
    fn big_candle_breaks_streak() {
        let closes = [10.0, 10.1, 10.2, 11.5];
        let h = history(&make_bars(&closes));
        let r = reference();
        let eval = SmallBullishStreak::new(SmallBullishStreakParams::default())
            .evaluate(&GateInput::new(&r, &h).unwrap());
        assert!(!eval.is_passed());
        assert_eq!(eval.evidence.value("bullish_streak"), Some(0.0));
    }
}
