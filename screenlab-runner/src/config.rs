//! Serializable strategy configuration.
//!
//! A strategy is data: an ordered gate list, scoring dimensions, a minimum
//! score and a data window. Configs load from TOML and are validated before
//! anything is built from them.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use screenlab_core::cohort::CohortConfig;
use screenlab_core::engine::Snapshot;
use screenlab_core::fingerprint::ConfigHash;
use screenlab_core::gates::*;
use screenlab_core::scoring::{Dimension, Scorer, ScoringError, TOTAL_POINTS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("strategy name must not be empty")]
    EmptyName,
    #[error("strategy '{0}' has no gates")]
    NoGates(String),
    #[error("duplicate gate name '{0}'")]
    DuplicateGate(String),
    #[error("gate '{0}' needs a [cohort] section")]
    MissingCohortConfig(String),
    #[error("scoring dimension '{dimension}' reads unknown metric '{metric}'")]
    UnknownMetric { dimension: String, metric: String },
    #[error("invalid scoring: {0}")]
    Scoring(#[from] ScoringError),
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// How much history to fetch and require per instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Calendar days fetched before (and including) the as-of date.
    pub lookback_days: u32,
    /// Minimum bars the indicator engine accepts.
    pub min_bars: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            min_bars: 20,
        }
    }
}

/// One configured gate. `name` overrides the gate's diagnostic name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: GateKind,
}

/// Gate type plus its thresholds, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateKind {
    MinPrice(MinPriceParams),
    NotSpecialTreatment,
    #[serde(rename = "main_board")]
    ExcludeBoards(ExcludeBoardsParams),
    MinTurnover(MinTurnoverParams),
    PriorSurge(PriorSurgeParams),
    PriorStrength(PriorStrengthParams),
    SteepRise(SteepRiseParams),
    PriceAcceleration(PriceAccelerationParams),
    TechnicalPullback(TechnicalPullbackParams),
    RangePullback(RangePullbackParams),
    NearMa(NearMaParams),
    DeepPullback(DeepPullbackParams),
    BottomZone(BottomZoneParams),
    VolumeShrinkage(VolumeShrinkageParams),
    VolumeBreakout(VolumeBreakoutParams),
    VolumeExpansion(VolumeExpansionParams),
    TrendIntact(TrendIntactParams),
    MaAlignment,
    MaInterwoven,
    StandsOnAverages(StandsOnAveragesParams),
    HighPosition(HighPositionParams),
    PriceBreakout(PriceBreakoutParams),
    ReversalCandle(ReversalCandleParams),
    SmallBullishStreak(SmallBullishStreakParams),
    StrongCohort(StrongCohortParams),
}

impl GateKind {
    pub fn build(&self) -> Box<dyn Gate> {
        match self {
            GateKind::MinPrice(p) => Box::new(MinPrice::new(p.clone())),
            GateKind::NotSpecialTreatment => Box::new(NotSpecialTreatment),
            GateKind::ExcludeBoards(p) => Box::new(ExcludeBoards::new(p.clone())),
            GateKind::MinTurnover(p) => Box::new(MinTurnover::new(p.clone())),
            GateKind::PriorSurge(p) => Box::new(PriorSurge::new(p.clone())),
            GateKind::PriorStrength(p) => Box::new(PriorStrength::new(p.clone())),
            GateKind::SteepRise(p) => Box::new(SteepRise::new(p.clone())),
            GateKind::PriceAcceleration(p) => Box::new(PriceAcceleration::new(p.clone())),
            GateKind::TechnicalPullback(p) => Box::new(TechnicalPullback::new(p.clone())),
            GateKind::RangePullback(p) => Box::new(RangePullback::new(p.clone())),
            GateKind::NearMa(p) => Box::new(NearMa::new(p.clone())),
            GateKind::DeepPullback(p) => Box::new(DeepPullback::new(p.clone())),
            GateKind::BottomZone(p) => Box::new(BottomZone::new(p.clone())),
            GateKind::VolumeShrinkage(p) => Box::new(VolumeShrinkage::new(p.clone())),
            GateKind::VolumeBreakout(p) => Box::new(VolumeBreakout::new(p.clone())),
            GateKind::VolumeExpansion(p) => Box::new(VolumeExpansion::new(p.clone())),
            GateKind::TrendIntact(p) => Box::new(TrendIntact::new(p.clone())),
            GateKind::MaAlignment => Box::new(MaAlignment),
            GateKind::MaInterwoven => Box::new(MaInterwoven),
            GateKind::StandsOnAverages(p) => Box::new(StandsOnAverages::new(p.clone())),
            GateKind::HighPosition(p) => Box::new(HighPosition::new(p.clone())),
            GateKind::PriceBreakout(p) => Box::new(PriceBreakout::new(p.clone())),
            GateKind::ReversalCandle(p) => Box::new(ReversalCandle::new(p.clone())),
            GateKind::SmallBullishStreak(p) => Box::new(SmallBullishStreak::new(p.clone())),
            GateKind::StrongCohort(p) => Box::new(StrongCohort::new(p.clone())),
        }
    }

    pub fn needs_cohorts(&self) -> bool {
        matches!(self, GateKind::StrongCohort(_))
    }
}

impl GateSpec {
    pub fn new(kind: GateKind) -> Self {
        Self { name: None, kind }
    }

    pub fn named(name: &str, kind: GateKind) -> Self {
        Self {
            name: Some(name.to_string()),
            kind,
        }
    }

    pub fn build(&self) -> Box<dyn Gate> {
        let gate = self.kind.build();
        match &self.name {
            Some(name) => Box::new(Labeled::new(name.clone(), gate)),
            None => gate,
        }
    }
}

/// Complete, reproducible description of one screening strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Candidates below this composite score are dropped.
    pub min_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    /// Worker pool size; 1 runs serially.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<CohortConfig>,
    pub gates: Vec<GateSpec>,
    pub scoring: Vec<Dimension>,
}

fn default_workers() -> usize {
    1
}

impl StrategyConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// BLAKE3 over the canonical JSON form. `workers` is excluded since it
    /// never changes the result.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        let canonical = Self {
            workers: 1,
            ..self.clone()
        };
        ConfigHash::of(&canonical).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Gate names in pipeline order, after overrides.
    pub fn gate_names(&self) -> Vec<String> {
        self.gates
            .iter()
            .map(|g| g.build().name().to_string())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !(0.0..=TOTAL_POINTS).contains(&self.min_score) {
            return Err(ConfigError::InvalidValue {
                field: "min_score",
                reason: format!("{} is outside [0, {TOTAL_POINTS}]", self.min_score),
            });
        }
        if self.window.min_bars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.min_bars",
                reason: "must be at least 1".into(),
            });
        }
        if self.window.lookback_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.lookback_days",
                reason: "must be at least 1".into(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be at least 1".into(),
            });
        }
        if self.top_n == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "top_n",
                reason: "must be at least 1 when set".into(),
            });
        }
        if self.gates.is_empty() {
            return Err(ConfigError::NoGates(self.name.clone()));
        }

        let gates: Vec<Box<dyn Gate>> = self.gates.iter().map(GateSpec::build).collect();
        let mut seen = HashSet::new();
        for (spec, gate) in self.gates.iter().zip(&gates) {
            if !seen.insert(gate.name()) {
                return Err(ConfigError::DuplicateGate(gate.name().to_string()));
            }
            if spec.kind.needs_cohorts() && self.cohort.is_none() {
                return Err(ConfigError::MissingCohortConfig(gate.name().to_string()));
            }
        }

        Scorer::new(self.scoring.clone())?;

        let known: BTreeSet<&str> = Snapshot::METRICS
            .iter()
            .copied()
            .chain(gates.iter().flat_map(|g| g.evidence_keys().iter().copied()))
            .collect();
        for dimension in &self.scoring {
            for metric in dimension.rule.inputs() {
                if !known.contains(metric) {
                    return Err(ConfigError::UnknownMetric {
                        dimension: dimension.name.clone(),
                        metric: metric.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "demo"
min_score = 50.0

[window]
lookback_days = 40
min_bars = 10

[[gates]]
type = "min_price"
min_close = 5.0

[[gates]]
type = "volume_shrinkage"
name = "quiet_volume"
max_ratio = 0.9

[[scoring]]
name = "volume"
cap = 60.0
rule = "label"
key = "volume_pattern"
default = 10.0
[scoring.points]
shrinking = 60.0

[[scoring]]
name = "trend"
cap = 40.0
rule = "linear"
metric = "ma5_over_ma10"
intercept = -360.0
slope = 400.0
"#;

    #[test]
    fn parses_minimal_toml() {
        let config = StrategyConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.workers, 1);
        assert_eq!(config.window.min_bars, 10);
        assert_eq!(
            config.gates[0].kind,
            GateKind::MinPrice(MinPriceParams { min_close: 5.0 })
        );
        assert_eq!(config.gate_names(), vec!["min_price", "quiet_volume"]);
    }

    #[test]
    fn toml_roundtrip_preserves_config() {
        let config = StrategyConfig::from_toml(MINIMAL).unwrap();
        let back = StrategyConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, back);
        assert_eq!(config.config_hash().unwrap(), back.config_hash().unwrap());
    }

    #[test]
    fn hash_changes_with_thresholds() {
        let a = StrategyConfig::from_toml(MINIMAL).unwrap();
        let mut b = a.clone();
        b.min_score = 51.0;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn rejects_unknown_metric() {
        let toml = MINIMAL.replace("ma5_over_ma10", "ma7_over_ma10");
        assert!(matches!(
            StrategyConfig::from_toml(&toml),
            Err(ConfigError::UnknownMetric { metric, .. }) if metric == "ma7_over_ma10"
        ));
    }

    #[test]
    fn rejects_caps_not_summing_to_100() {
        let toml = MINIMAL.replace("cap = 40.0", "cap = 30.0");
        assert!(matches!(
            StrategyConfig::from_toml(&toml),
            Err(ConfigError::Scoring(ScoringError::CapsDoNotSum { .. }))
        ));
    }

    #[test]
    fn rejects_duplicate_gate_names() {
        let toml = MINIMAL.replace("name = \"quiet_volume\"", "name = \"min_price\"");
        assert!(matches!(
            StrategyConfig::from_toml(&toml),
            Err(ConfigError::DuplicateGate(name)) if name == "min_price"
        ));
    }

    #[test]
    fn rejects_out_of_range_min_score() {
        let toml = MINIMAL.replace("min_score = 50.0", "min_score = 120.0");
        assert!(matches!(
            StrategyConfig::from_toml(&toml),
            Err(ConfigError::InvalidValue { field: "min_score", .. })
        ));
    }

    #[test]
    fn cohort_gate_requires_cohort_section() {
        let toml = MINIMAL.replace("type = \"min_price\"", "type = \"strong_cohort\"");
        let toml = toml.replace("min_close = 5.0\n", "");
        assert!(matches!(
            StrategyConfig::from_toml(&toml),
            Err(ConfigError::MissingCohortConfig(_))
        ));

        let with_cohort = format!("{toml}\n[cohort]\nbreadth_weight = 2.0\n");
        let config = StrategyConfig::from_toml(&with_cohort).unwrap();
        assert_eq!(config.cohort, Some(CohortConfig::default()));
    }

    #[test]
    fn rejects_unknown_gate_type() {
        let toml = MINIMAL.replace("type = \"min_price\"", "type = \"moon_phase\"");
        assert!(matches!(
            StrategyConfig::from_toml(&toml),
            Err(ConfigError::Parse(_))
        ));
    }
}
