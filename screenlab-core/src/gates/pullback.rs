//! Pullback gates: how far price has retreated and where it sits in its range.

use serde::{Deserialize, Serialize};

use crate::indicators::Reading;

use super::trend::MaPeriod;
use super::{defined, Bounds, Gate, GateEvaluation, GateInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalPullbackParams {
    /// Close distance above MA5, percent.
    pub ma5_distance_pct: Bounds,
    /// Position inside the 5-bar high-low range, percent.
    pub position_pct: Bounds,
}

impl Default for TechnicalPullbackParams {
    fn default() -> Self {
        Self {
            ma5_distance_pct: Bounds::new(0.0, 8.0),
            position_pct: Bounds::new(40.0, 70.0),
        }
    }
}

/// Price has come back to rest just above MA5, mid-range.
///
/// A flat 5-bar range has no defined position and is rejected.
#[derive(Debug, Clone)]
pub struct TechnicalPullback {
    params: TechnicalPullbackParams,
}

impl TechnicalPullback {
    pub fn new(params: TechnicalPullbackParams) -> Self {
        Self { params }
    }
}

impl Gate for TechnicalPullback {
    fn name(&self) -> &str {
        "technical_pullback"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        match defined([s.ma5_distance_pct, s.pos_in_5_pct]) {
            Ok([dist, pos]) => GateEvaluation::check(
                self.params.ma5_distance_pct.contains(dist) && self.params.position_pct.contains(pos),
            ),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangePullbackParams {
    /// Drop from the 10-bar high, percent.
    pub pullback_pct: Bounds,
}

impl Default for RangePullbackParams {
    fn default() -> Self {
        Self {
            pullback_pct: Bounds::new(5.0, 25.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RangePullback {
    params: RangePullbackParams,
}

impl RangePullback {
    pub fn new(params: RangePullbackParams) -> Self {
        Self { params }
    }
}

impl Gate for RangePullback {
    fn name(&self) -> &str {
        "range_pullback"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        match defined([input.latest().pullback_from_high_10_pct]) {
            Ok([pb]) => GateEvaluation::check(self.params.pullback_pct.contains(pb)),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearMaParams {
    pub ma: MaPeriod,
    /// Maximum absolute distance from the average, percent.
    pub tolerance_pct: f64,
}

impl Default for NearMaParams {
    fn default() -> Self {
        Self {
            ma: MaPeriod::Ma10,
            tolerance_pct: 3.0,
        }
    }
}

/// Close sits within a band around a moving average.
#[derive(Debug, Clone)]
pub struct NearMa {
    params: NearMaParams,
}

impl NearMa {
    pub fn new(params: NearMaParams) -> Self {
        Self { params }
    }
}

impl Gate for NearMa {
    fn name(&self) -> &str {
        "near_ma"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["near_ma_distance_pct"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        let distance = Reading::pct_change(s.close(), self.params.ma.reading(s));
        match defined([distance]) {
            Ok([d]) => GateEvaluation::check(d.abs() <= self.params.tolerance_pct)
                .with_value("near_ma_distance_pct", d),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepPullbackParams {
    /// Close must be further than this below MA5 (negative percent).
    pub max_ma5_distance_pct: f64,
    /// Position in the 5-bar range must be below this, percent.
    pub max_position_pct: f64,
}

impl Default for DeepPullbackParams {
    fn default() -> Self {
        Self {
            max_ma5_distance_pct: -5.0,
            max_position_pct: 25.0,
        }
    }
}

/// Price has sold off well below MA5 and sits near the bottom of its range.
#[derive(Debug, Clone)]
pub struct DeepPullback {
    params: DeepPullbackParams,
}

impl DeepPullback {
    pub fn new(params: DeepPullbackParams) -> Self {
        Self { params }
    }
}

impl Gate for DeepPullback {
    fn name(&self) -> &str {
        "deep_pullback"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        match defined([s.ma5_distance_pct, s.pos_in_5_pct]) {
            Ok([dist, pos]) => GateEvaluation::check(
                dist < self.params.max_ma5_distance_pct && pos < self.params.max_position_pct,
            ),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottomZoneParams {
    /// Minimum drop from the 20-bar high, percent.
    pub min_pullback_pct: f64,
    /// Maximum position in the 20-bar range, percent.
    pub max_position_pct: f64,
}

impl Default for BottomZoneParams {
    fn default() -> Self {
        Self {
            min_pullback_pct: 15.0,
            max_position_pct: 40.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BottomZone {
    params: BottomZoneParams,
}

impl BottomZone {
    pub fn new(params: BottomZoneParams) -> Self {
        Self { params }
    }
}

impl Gate for BottomZone {
    fn name(&self) -> &str {
        "bottom_zone"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let s = input.latest();
        match defined([s.pullback_from_high_20_pct, s.pos_in_20_pct]) {
            Ok([pb, pos]) => GateEvaluation::check(
                pb >= self.params.min_pullback_pct && pos <= self.params.max_position_pct,
            ),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}
