//! Universe hygiene gates: price floor, special treatment, board, turnover.

use serde::{Deserialize, Serialize};

use crate::domain::Board;

use super::{defined, Gate, GateEvaluation, GateInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinPriceParams {
    pub min_close: f64,
}

impl Default for MinPriceParams {
    fn default() -> Self {
        Self { min_close: 3.0 }
    }
}

/// Rejects instruments trading below a price floor.
#[derive(Debug, Clone)]
pub struct MinPrice {
    params: MinPriceParams,
}

impl MinPrice {
    pub fn new(params: MinPriceParams) -> Self {
        Self { params }
    }
}

impl Gate for MinPrice {
    fn name(&self) -> &str {
        "min_price"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        match defined([input.latest().close()]) {
            Ok([close]) => GateEvaluation::check(close >= self.params.min_close),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

/// Rejects special-treatment (ST / *ST) instruments.
#[derive(Debug, Clone, Default)]
pub struct NotSpecialTreatment;

impl Gate for NotSpecialTreatment {
    fn name(&self) -> &str {
        "not_special_treatment"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        GateEvaluation::check(!input.instrument.is_special_treatment())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeBoardsParams {
    pub excluded: Vec<Board>,
}

impl Default for ExcludeBoardsParams {
    fn default() -> Self {
        Self {
            excluded: vec![Board::ChiNext, Board::Star, Board::Beijing, Board::BShare],
        }
    }
}

/// Restricts the universe to boards not listed in `excluded` (main board by default).
#[derive(Debug, Clone)]
pub struct ExcludeBoards {
    params: ExcludeBoardsParams,
}

impl ExcludeBoards {
    pub fn new(params: ExcludeBoardsParams) -> Self {
        Self { params }
    }
}

impl Gate for ExcludeBoards {
    fn name(&self) -> &str {
        "main_board"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let board = input.instrument.board();
        GateEvaluation::check(!self.params.excluded.contains(&board))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinTurnoverParams {
    /// Minimum turnover of the latest bar, in currency units.
    pub min_amount: f64,
}

impl Default for MinTurnoverParams {
    fn default() -> Self {
        Self {
            min_amount: 50_000_000.0,
        }
    }
}

/// Rejects illiquid instruments.
#[derive(Debug, Clone)]
pub struct MinTurnover {
    params: MinTurnoverParams,
}

impl MinTurnover {
    pub fn new(params: MinTurnoverParams) -> Self {
        Self { params }
    }
}

impl Gate for MinTurnover {
    fn name(&self) -> &str {
        "min_turnover"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let amount = input.latest().bar.amount;
        if !amount.is_finite() {
            return GateEvaluation::reject(super::RejectReason::UndefinedInput);
        }
        GateEvaluation::check(amount >= self.params.min_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentRef;
    use crate::gates::testing::history;
    use crate::gates::RejectReason;
    use crate::indicators::make_bars;

    #[test]
    fn min_price_floor() {
        let h = history(&make_bars(&[2.5, 2.9]));
        let r = InstrumentRef::bare("600000.SH");
        let input = GateInput::new(&r, &h).unwrap();
        assert!(!MinPrice::new(MinPriceParams::default()).evaluate(&input).is_passed());
        assert!(MinPrice::new(MinPriceParams { min_close: 2.0 }).evaluate(&input).is_passed());
    }

    #[test]
    fn special_treatment_rejected() {
        let h = history(&make_bars(&[10.0]));
        let mut r = InstrumentRef::bare("600000.SH");
        r.name = Some("ST Example".into());
        let input = GateInput::new(&r, &h).unwrap();
        assert!(!NotSpecialTreatment.evaluate(&input).is_passed());
    }

    #[test]
    fn board_exclusion() {
        let h = history(&make_bars(&[10.0]));
        let gate = ExcludeBoards::new(ExcludeBoardsParams::default());
        let chinext = InstrumentRef::bare("300750.SZ");
        let main = InstrumentRef::bare("600519.SH");
        assert!(!gate.evaluate(&GateInput::new(&chinext, &h).unwrap()).is_passed());
        assert!(gate.evaluate(&GateInput::new(&main, &h).unwrap()).is_passed());
    }

    #[test]
    fn turnover_floor_and_nan() {
        let mut bars = make_bars(&[10.0]);
        bars[0].amount = 60_000_000.0;
        let h = history(&bars);
        let r = InstrumentRef::bare("600000.SH");
        let gate = MinTurnover::new(MinTurnoverParams::default());
        assert!(gate.evaluate(&GateInput::new(&r, &h).unwrap()).is_passed());

        bars[0].amount = f64::NAN;
        let h = history(&bars);
        assert_eq!(
            gate.evaluate(&GateInput::new(&r, &h).unwrap()).verdict,
            crate::gates::GateVerdict::Reject(RejectReason::UndefinedInput)
        );
    }
}
