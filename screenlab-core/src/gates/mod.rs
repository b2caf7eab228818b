//! Gates: named pure predicates that include or exclude an instrument.
//!
//! A gate sees the instrument's reference data, its full snapshot history
//! (latest last) and the run's frozen cohort table. It returns a
//! `GateEvaluation`: the verdict plus any evidence (numbers and labels) that
//! later gates' callers and the scorer may read.
//!
//! Undefined or missing inputs never panic or error: they are rejections with
//! reason `UndefinedInput` or `InsufficientHistory`.

pub mod basic;
pub mod breakout;
pub mod candle;
pub mod cohort;
pub mod momentum;
pub mod pipeline;
pub mod pullback;
pub mod trend;
pub mod volume;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cohort::{CohortMembership, CohortTable};
use crate::domain::InstrumentRef;
use crate::engine::Snapshot;
use crate::indicators::Reading;

pub use basic::{
    ExcludeBoards, ExcludeBoardsParams, MinPrice, MinPriceParams, MinTurnover, MinTurnoverParams,
    NotSpecialTreatment,
};
pub use breakout::{HighPosition, HighPositionParams, PriceBreakout, PriceBreakoutParams};
pub use candle::{
    ReversalCandle, ReversalCandleParams, SmallBullishStreak, SmallBullishStreakParams,
};
pub use cohort::{StrongCohort, StrongCohortParams};
pub use momentum::{
    PriceAcceleration, PriceAccelerationParams, PriorStrength, PriorStrengthParams, PriorSurge,
    PriorSurgeParams, SteepRise, SteepRiseParams,
};
pub use pipeline::{GatePipeline, GateTally, PipelineError, PipelineOutcome, Rejection, RejectionHistogram};
pub use pullback::{
    BottomZone, BottomZoneParams, DeepPullback, DeepPullbackParams, NearMa, NearMaParams,
    RangePullback, RangePullbackParams, TechnicalPullback, TechnicalPullbackParams,
};
pub use trend::{
    MaAlignment, MaInterwoven, MaPeriod, StandsOnAverages, StandsOnAveragesParams, TrendIntact,
    TrendIntactParams,
};
pub use volume::{
    VolumeBreakout, VolumeBreakoutParams, VolumeExpansion, VolumeExpansionParams,
    VolumeShrinkage, VolumeShrinkageParams,
};

/// What a gate sees for one instrument.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub instrument: &'a InstrumentRef,
    /// Snapshot history, oldest first; never empty.
    pub history: &'a [Snapshot],
    pub cohorts: Option<&'a CohortTable>,
    latest: &'a Snapshot,
}

impl<'a> GateInput<'a> {
    /// `None` when `history` is empty.
    pub fn new(instrument: &'a InstrumentRef, history: &'a [Snapshot]) -> Option<Self> {
        let latest = history.last()?;
        Some(Self {
            instrument,
            history,
            cohorts: None,
            latest,
        })
    }

    pub fn with_cohorts(mut self, cohorts: Option<&'a CohortTable>) -> Self {
        self.cohorts = cohorts;
        self
    }

    pub fn latest(&self) -> &'a Snapshot {
        self.latest
    }

    /// Snapshot `n` bars before the latest.
    pub fn back(&self, n: usize) -> Option<&'a Snapshot> {
        let len = self.history.len();
        if n >= len {
            None
        } else {
            Some(&self.history[len - 1 - n])
        }
    }
}

/// Why a gate rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Inputs were defined and failed the threshold.
    Threshold,
    /// An input was undefined (zero or missing denominator, NaN, no cohort table).
    UndefinedInput,
    /// The window was too short for an input this gate needs.
    InsufficientHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateVerdict {
    Pass,
    Reject(RejectReason),
}

/// Intermediate gate outputs, merged across the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub values: BTreeMap<String, f64>,
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<CohortMembership>,
}

impl Evidence {
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Merge `other` into `self`; later values win.
    pub fn merge(&mut self, other: Evidence) {
        self.values.extend(other.values);
        self.labels.extend(other.labels);
        if other.cohort.is_some() {
            self.cohort = other.cohort;
        }
    }
}

/// Verdict plus evidence produced by one gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateEvaluation {
    pub verdict: GateVerdict,
    pub evidence: Evidence,
}

impl GateEvaluation {
    pub fn pass() -> Self {
        Self {
            verdict: GateVerdict::Pass,
            evidence: Evidence::default(),
        }
    }

    pub fn reject(reason: RejectReason) -> Self {
        Self {
            verdict: GateVerdict::Reject(reason),
            evidence: Evidence::default(),
        }
    }

    /// Pass when `passed`, otherwise a threshold rejection.
    pub fn check(passed: bool) -> Self {
        if passed {
            Self::pass()
        } else {
            Self::reject(RejectReason::Threshold)
        }
    }

    pub fn with_value(mut self, key: &str, value: f64) -> Self {
        self.evidence.values.insert(key.to_string(), value);
        self
    }

    pub fn with_label(mut self, key: &str, label: impl Into<String>) -> Self {
        self.evidence.labels.insert(key.to_string(), label.into());
        self
    }

    pub fn with_cohort(mut self, membership: CohortMembership) -> Self {
        self.evidence.cohort = Some(membership);
        self
    }

    pub fn is_passed(&self) -> bool {
        self.verdict == GateVerdict::Pass
    }
}

/// A named predicate over one instrument's history.
///
/// Implementations must be deterministic and side-effect free.
pub trait Gate: Send + Sync {
    /// Name used in rejection diagnostics (e.g. "prior_surge").
    fn name(&self) -> &str;

    /// Evidence keys (values or labels) this gate produces on pass.
    fn evidence_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation;
}

/// A gate under a different diagnostic name.
pub struct Labeled {
    label: String,
    inner: Box<dyn Gate>,
}

impl Labeled {
    pub fn new(label: impl Into<String>, inner: Box<dyn Gate>) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }
}

impl Gate for Labeled {
    fn name(&self) -> &str {
        &self.label
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        self.inner.evidence_keys()
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        self.inner.evaluate(input)
    }
}

/// Inclusive numeric bounds used by gate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Unwrap readings into numbers, mapping the first non-value to a reject reason.
pub fn defined<const N: usize>(readings: [Reading; N]) -> Result<[f64; N], RejectReason> {
    let mut out = [0.0; N];
    for (slot, reading) in out.iter_mut().zip(readings) {
        *slot = match reading {
            Reading::Value(v) => v,
            Reading::InsufficientData => return Err(RejectReason::InsufficientHistory),
            Reading::Undefined => return Err(RejectReason::UndefinedInput),
        };
    }
    Ok(out)
}

/// Snapshot histories for gate unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::{Bar, InstrumentRef};
    use crate::engine::{IndicatorEngine, Snapshot};

    /// Bars from closes with explicit volumes.
    pub fn bars_with_volume(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
        let mut bars = crate::indicators::make_bars(closes);
        for (bar, &v) in bars.iter_mut().zip(volumes) {
            bar.volume = v;
        }
        bars
    }

    pub fn history(bars: &[Bar]) -> Vec<Snapshot> {
        IndicatorEngine::new(1).compute(bars).unwrap()
    }

    pub fn reference() -> InstrumentRef {
        InstrumentRef::bare("600000.SH")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_maps_reasons() {
        assert_eq!(defined([Reading::Value(1.0), Reading::Value(2.0)]), Ok([1.0, 2.0]));
        assert_eq!(
            defined([Reading::Value(1.0), Reading::Undefined]),
            Err(RejectReason::UndefinedInput)
        );
        assert_eq!(
            defined([Reading::InsufficientData]),
            Err(RejectReason::InsufficientHistory)
        );
    }

    #[test]
    fn back_indexes_from_latest() {
        let bars = crate::indicators::make_bars(&[1.0, 2.0, 3.0]);
        let h = testing::history(&bars);
        let r = testing::reference();
        let input = GateInput::new(&r, &h).unwrap();
        assert_eq!(input.latest().bar.close, 3.0);
        assert_eq!(input.back(2).unwrap().bar.close, 1.0);
        assert!(input.back(3).is_none());
        assert!(GateInput::new(&r, &[]).is_none());
    }

    #[test]
    fn evidence_merge_later_wins() {
        let mut a = GateEvaluation::pass().with_value("x", 1.0).evidence;
        let b = GateEvaluation::pass()
            .with_value("x", 2.0)
            .with_label("p", "q")
            .evidence;
        a.merge(b);
        assert_eq!(a.value("x"), Some(2.0));
        assert_eq!(a.label("p"), Some("q"));
    }
}
