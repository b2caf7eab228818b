//! Factory: turns a validated `StrategyConfig` into runtime objects.

use thiserror::Error;

use screenlab_core::cohort::CohortRanker;
use screenlab_core::engine::IndicatorEngine;
use screenlab_core::fingerprint::ConfigHash;
use screenlab_core::gates::{GatePipeline, PipelineError};
use screenlab_core::scoring::{Scorer, ScoringError};

use crate::config::{ConfigError, GateSpec, StrategyConfig};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid gate pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("invalid scorer: {0}")]
    Scoring(#[from] ScoringError),
}

/// Everything a screening run needs for one strategy.
#[derive(Debug)]
pub struct Strategy {
    pub config: StrategyConfig,
    pub config_hash: ConfigHash,
    pub engine: IndicatorEngine,
    pub pipeline: GatePipeline,
    pub scorer: Scorer,
    /// Always present; presets without a cohort gate still rank cohorts for
    /// the report.
    pub ranker: CohortRanker,
}

impl Strategy {
    pub fn from_config(config: StrategyConfig) -> Result<Self, FactoryError> {
        config.validate()?;
        let config_hash = config.config_hash()?;
        let pipeline = GatePipeline::new(config.gates.iter().map(GateSpec::build).collect())?;
        let scorer = Scorer::new(config.scoring.clone())?;
        let engine = IndicatorEngine::new(config.window.min_bars);
        let ranker = CohortRanker::new(config.cohort.clone().unwrap_or_default());
        Ok(Self {
            config,
            config_hash,
            engine,
            pipeline,
            scorer,
            ranker,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::StrategyPreset;

    #[test]
    fn builds_every_preset() {
        for preset in StrategyPreset::all() {
            let strategy = Strategy::from_config(preset.config()).unwrap();
            assert_eq!(strategy.pipeline.len(), preset.config().gates.len());
            assert_eq!(strategy.engine.min_bars(), preset.config().window.min_bars);
        }
    }

    #[test]
    fn labeled_gate_names_reach_the_pipeline() {
        let strategy = Strategy::from_config(StrategyPreset::VolumeAcceleration.config()).unwrap();
        assert!(strategy.pipeline.gate_names().contains(&"volume_surge"));
        assert!(!strategy.pipeline.gate_names().contains(&"volume_breakout"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = StrategyPreset::StrongPullback.config();
        config.scoring.pop();
        assert!(matches!(
            Strategy::from_config(config),
            Err(FactoryError::Config(ConfigError::Scoring(ScoringError::CapsDoNotSum { .. })))
        ));
    }
}
