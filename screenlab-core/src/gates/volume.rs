//! Volume gates: shrinkage on pullbacks, breakouts, expansion.

use serde::{Deserialize, Serialize};

use super::{defined, Gate, GateEvaluation, GateInput, RejectReason};

/// Evidence label values written under `volume_pattern`.
pub const PATTERN_SHRINKING: &str = "shrinking";
pub const PATTERN_MILD_EXPANSION: &str = "mild_expansion";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeShrinkageParams {
    /// Volume over its 5-bar mean must stay below this.
    pub max_ratio: f64,
    /// When set, an up day with ratio up to this value also passes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mild_expansion_max: Option<f64>,
}

impl Default for VolumeShrinkageParams {
    fn default() -> Self {
        Self {
            max_ratio: 1.0,
            mild_expansion_max: None,
        }
    }
}

/// Volume dries up during the pullback.
#[derive(Debug, Clone)]
pub struct VolumeShrinkage {
    params: VolumeShrinkageParams,
}

impl VolumeShrinkage {
    pub fn new(params: VolumeShrinkageParams) -> Self {
        Self { params }
    }
}

impl Gate for VolumeShrinkage {
    fn name(&self) -> &str {
        "volume_shrinkage"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["volume_pattern"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        let [ratio] = match defined([s.vol_ratio_5]) {
            Ok(v) => v,
            Err(reason) => return GateEvaluation::reject(reason),
        };
        if ratio < self.params.max_ratio {
            return GateEvaluation::pass().with_label("volume_pattern", PATTERN_SHRINKING);
        }
        let up_day = s.change_pct().value().is_some_and(|c| c > 0.0);
        match self.params.mild_expansion_max {
            Some(max) if up_day && ratio <= max => {
                GateEvaluation::pass().with_label("volume_pattern", PATTERN_MILD_EXPANSION)
            }
            _ => GateEvaluation::reject(RejectReason::Threshold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeBreakoutParams {
    pub min_ratio: f64,
}

impl Default for VolumeBreakoutParams {
    fn default() -> Self {
        Self { min_ratio: 2.0 }
    }
}

/// Volume at least `min_ratio` times its 5-bar mean.
#[derive(Debug, Clone)]
pub struct VolumeBreakout {
    params: VolumeBreakoutParams,
}

impl VolumeBreakout {
    pub fn new(params: VolumeBreakoutParams) -> Self {
        Self { params }
    }
}

impl Gate for VolumeBreakout {
    fn name(&self) -> &str {
        "volume_breakout"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        match defined([input.latest().vol_ratio_5]) {
            Ok([ratio]) => GateEvaluation::check(ratio >= self.params.min_ratio),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeExpansionParams {
    /// Number of most recent bars whose volume must rise strictly.
    pub rising_days: usize,
    /// Alternatively, volume over its 5-bar mean at least this.
    pub min_ratio: f64,
}

impl Default for VolumeExpansionParams {
    fn default() -> Self {
        Self {
            rising_days: 3,
            min_ratio: 1.3,
        }
    }
}

/// Volume is picking up: rising bar over bar, or above its mean.
#[derive(Debug, Clone)]
pub struct VolumeExpansion {
    params: VolumeExpansionParams,
}

impl VolumeExpansion {
    pub fn new(params: VolumeExpansionParams) -> Self {
        Self { params }
    }

    fn rising(&self, input: &GateInput<'_>) -> bool {
        let n = self.params.rising_days;
        if n < 2 || input.history.len() < n {
            return false;
        }
        input.history[input.history.len() - n..]
            .windows(2)
            .all(|w| w[1].bar.volume > w[0].bar.volume)
    }
}

impl Gate for VolumeExpansion {
    fn name(&self) -> &str {
        "volume_expansion"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["volume_rising"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let rising = self.rising(input);
        let flag = if rising { 1.0 } else { 0.0 };
        if rising {
            return GateEvaluation::pass().with_value("volume_rising", flag);
        }
        match defined([input.latest().vol_ratio_5]) {
            Ok([ratio]) => {
                GateEvaluation::check(ratio >= self.params.min_ratio).with_value("volume_rising", flag)
            }
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::testing::{bars_with_volume, history, reference};
    use crate::gates::GateVerdict;

    #[test]
    fn shrinking_volume_passes() {
        let bars = bars_with_volume(&[10.0; 6], &[100.0, 100.0, 100.0, 100.0, 100.0, 50.0]);
        let h = history(&bars);
        let r = reference();
        let eval = VolumeShrinkage::new(VolumeShrinkageParams::default())
            .evaluate(&GateInput::new(&r, &h).unwrap());
        assert!(eval.is_passed());
        assert_eq!(eval.evidence.label("volume_pattern"), Some(PATTERN_SHRINKING));
    }

    #[test]
    fn mild_expansion_only_on_up_days() {
        let vols = [100.0, 100.0, 100.0, 100.0, 100.0, 150.0];
        let params = VolumeShrinkageParams {
            max_ratio: 1.0,
            mild_expansion_max: Some(2.0),
        };
        let r = reference();

        let up = history(&bars_with_volume(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.5], &vols));
        let eval = VolumeShrinkage::new(params.clone()).evaluate(&GateInput::new(&r, &up).unwrap());
        assert_eq!(eval.evidence.label("volume_pattern"), Some(PATTERN_MILD_EXPANSION));

        let down = history(&bars_with_volume(&[10.0, 10.0, 10.0, 10.0, 10.0, 9.5], &vols));
        let eval = VolumeShrinkage::new(params).evaluate(&GateInput::new(&r, &down).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::Threshold));
    }

    #[test]
    fn zero_average_volume_is_undefined() {
        let h = history(&bars_with_volume(&[10.0; 5], &[0.0; 5]));
        let r = reference();
        let eval = VolumeBreakout::new(VolumeBreakoutParams::default())
            .evaluate(&GateInput::new(&r, &h).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::UndefinedInput));
    }

    #[test]
    fn expansion_by_rising_or_ratio() {
        let r = reference();
        let rising = history(&bars_with_volume(&[10.0; 5], &[100.0, 100.0, 90.0, 95.0, 99.0]));
        let eval = VolumeExpansion::new(VolumeExpansionParams::default())
            .evaluate(&GateInput::new(&r, &rising).unwrap());
        assert!(eval.is_passed());
        assert_eq!(eval.evidence.value("volume_rising"), Some(1.0));

        let spike = history(&bars_with_volume(&[10.0; 5], &[100.0, 100.0, 100.0, 300.0, 200.0]));
        let eval = VolumeExpansion::new(VolumeExpansionParams::default())
            .evaluate(&GateInput::new(&r, &spike).unwrap());
        // ratio = 200 / 160
        assert!(!eval.is_passed());
    }
}
