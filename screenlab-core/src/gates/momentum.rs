//! Momentum gates: prior surge, prior strength, steep rise, acceleration.

use serde::{Deserialize, Serialize};

use crate::indicators::Reading;

use super::{defined, Gate, GateEvaluation, GateInput, RejectReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorSurgeParams {
    /// The best gain must exceed this (percent).
    pub min_surge_pct: f64,
    /// Shortest look-back offset scanned, in bars.
    pub min_offset: usize,
    /// Longest look-back offset scanned, in bars (inclusive).
    pub max_offset: usize,
}

impl Default for PriorSurgeParams {
    fn default() -> Self {
        Self {
            min_surge_pct: 20.0,
            min_offset: 5,
            max_offset: 15,
        }
    }
}

/// Detects a strong run-up: the largest gain from the close `k` bars back to
/// the latest close, over `k` in `min_offset..=max_offset`.
///
/// Offsets beyond the available history are skipped; at least `min_offset`
/// earlier bars are required.
#[derive(Debug, Clone)]
pub struct PriorSurge {
    params: PriorSurgeParams,
}

impl PriorSurge {
    pub fn new(params: PriorSurgeParams) -> Self {
        Self { params }
    }
}

impl Gate for PriorSurge {
    fn name(&self) -> &str {
        "prior_surge"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["max_surge_pct", "surge_offset"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let p = &self.params;
        if input.back(p.min_offset).is_none() {
            return GateEvaluation::reject(RejectReason::InsufficientHistory);
        }
        let current = input.latest().close();

        let mut best: Option<(f64, usize)> = None;
        for offset in p.min_offset..=p.max_offset {
            let Some(past) = input.back(offset) else {
                break;
            };
            if let Some(gain) = Reading::pct_change(current, past.close()).value() {
                if best.map_or(true, |(b, _)| gain > b) {
                    best = Some((gain, offset));
                }
            }
        }

        match best {
            Some((gain, offset)) => GateEvaluation::check(gain > p.min_surge_pct)
                .with_value("max_surge_pct", gain)
                .with_value("surge_offset", offset as f64),
            None => GateEvaluation::reject(RejectReason::UndefinedInput),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorStrengthParams {
    pub near_offset: usize,
    pub far_offset: usize,
    pub min_rise_pct: f64,
}

impl Default for PriorStrengthParams {
    fn default() -> Self {
        Self {
            near_offset: 10,
            far_offset: 20,
            min_rise_pct: 30.0,
        }
    }
}

/// The instrument was strong before its recent weakness: the close
/// `near_offset` bars back is more than `min_rise_pct` above the close
/// `far_offset` bars back.
#[derive(Debug, Clone)]
pub struct PriorStrength {
    params: PriorStrengthParams,
}

impl PriorStrength {
    pub fn new(params: PriorStrengthParams) -> Self {
        Self { params }
    }
}

impl Gate for PriorStrength {
    fn name(&self) -> &str {
        "prior_strength"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["prior_rise_pct"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let p = &self.params;
        let (Some(near), Some(far)) = (input.back(p.near_offset), input.back(p.far_offset)) else {
            return GateEvaluation::reject(RejectReason::InsufficientHistory);
        };
        match defined([Reading::pct_change(near.close(), far.close())]) {
            Ok([rise]) => GateEvaluation::check(rise > p.min_rise_pct).with_value("prior_rise_pct", rise),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteepRiseParams {
    /// Minimum 3-bar change in percent.
    pub min_rise_pct: f64,
}

impl Default for SteepRiseParams {
    fn default() -> Self {
        Self { min_rise_pct: 15.0 }
    }
}

#[derive(Debug, Clone)]
pub struct SteepRise {
    params: SteepRiseParams,
}

impl SteepRise {
    pub fn new(params: SteepRiseParams) -> Self {
        Self { params }
    }
}

impl Gate for SteepRise {
    fn name(&self) -> &str {
        "steep_rise"
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        match defined([input.latest().pct_3]) {
            Ok([rise]) => GateEvaluation::check(rise >= self.params.min_rise_pct),
            Err(reason) => GateEvaluation::reject(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceAccelerationParams {
    /// Recent 3-bar mean change over the preceding 3-bar mean change.
    pub min_ratio: f64,
    /// The recent 3-bar mean change must exceed this (percent).
    pub min_recent_avg_pct: f64,
}

impl Default for PriceAccelerationParams {
    fn default() -> Self {
        Self {
            min_ratio: 1.5,
            min_recent_avg_pct: 2.0,
        }
    }
}

/// Price is rising faster than it was three bars ago.
///
/// A non-positive earlier mean makes the ratio meaningless and is treated as
/// an undefined input.
#[derive(Debug, Clone)]
pub struct PriceAcceleration {
    params: PriceAccelerationParams,
}

impl PriceAcceleration {
    pub fn new(params: PriceAccelerationParams) -> Self {
        Self { params }
    }
}

impl Gate for PriceAcceleration {
    fn name(&self) -> &str {
        "price_acceleration"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &["acceleration_ratio"]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let snap = input.latest();
        let [recent, earlier] = match defined([snap.avg_pct_3, snap.prev_avg_pct_3]) {
            Ok(v) => v,
            Err(reason) => return GateEvaluation::reject(reason),
        };
        if earlier <= 0.0 {
            return GateEvaluation::reject(RejectReason::UndefinedInput);
        }
        let ratio = recent / earlier;
        GateEvaluation::check(ratio >= self.params.min_ratio && recent > self.params.min_recent_avg_pct)
            .with_value("acceleration_ratio", ratio)
    }
}
