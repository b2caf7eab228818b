//! Named strategy presets.
//!
//! Each preset is a `StrategyConfig` for the one screening engine. Print one
//! with `screenlab show-config <name>`, edit it, and run it from a file.

use std::collections::BTreeMap;

use screenlab_core::cohort::CohortConfig;
use screenlab_core::gates::*;
use screenlab_core::scoring::{BandTable, Condition, Dimension, Rule, Tier};

use crate::config::{GateKind, GateSpec, StrategyConfig, WindowConfig};

/// The six built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyPreset {
    StrongPullback,
    StrongSectorPullback,
    BreakoutFollow,
    BottomReversal,
    VolumeAcceleration,
    BottomVolumeBullish,
}

impl StrategyPreset {
    pub fn all() -> &'static [StrategyPreset] {
        &[
            StrategyPreset::StrongPullback,
            StrategyPreset::StrongSectorPullback,
            StrategyPreset::BreakoutFollow,
            StrategyPreset::BottomReversal,
            StrategyPreset::VolumeAcceleration,
            StrategyPreset::BottomVolumeBullish,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            StrategyPreset::StrongPullback => "strong_pullback",
            StrategyPreset::StrongSectorPullback => "strong_sector_pullback",
            StrategyPreset::BreakoutFollow => "breakout_follow",
            StrategyPreset::BottomReversal => "bottom_reversal",
            StrategyPreset::VolumeAcceleration => "volume_acceleration",
            StrategyPreset::BottomVolumeBullish => "bottom_volume_bullish",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StrategyPreset::StrongPullback => {
                "Recent surge, orderly pullback toward MA5 on shrinking volume, trend intact"
            }
            StrategyPreset::StrongSectorPullback => {
                "Member of a top-ranked industry or theme, pulled back to MA10 in an uptrend"
            }
            StrategyPreset::BreakoutFollow => {
                "Big up day on doubled volume clearing the prior 10-day high"
            }
            StrategyPreset::BottomReversal => {
                "Former leader washed out below MA5, quiet volume, hammer-style reversal candle"
            }
            StrategyPreset::VolumeAcceleration => {
                "Steep three-day rise that is still accelerating on heavy volume"
            }
            StrategyPreset::BottomVolumeBullish => {
                "Deep pullback base with a streak of small up days on rising volume"
            }
        }
    }

    pub fn from_name(name: &str) -> Option<StrategyPreset> {
        Self::all().iter().copied().find(|p| p.name() == name)
    }

    pub fn config(self) -> StrategyConfig {
        match self {
            StrategyPreset::StrongPullback => strong_pullback(),
            StrategyPreset::StrongSectorPullback => strong_sector_pullback(),
            StrategyPreset::BreakoutFollow => breakout_follow(),
            StrategyPreset::BottomReversal => bottom_reversal(),
            StrategyPreset::VolumeAcceleration => volume_acceleration(),
            StrategyPreset::BottomVolumeBullish => bottom_volume_bullish(),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn base(preset: StrategyPreset, lookback_days: u32, min_bars: usize, min_score: f64) -> StrategyConfig {
    StrategyConfig {
        name: preset.name().to_string(),
        description: preset.description().to_string(),
        min_score,
        top_n: Some(15),
        workers: 1,
        window: WindowConfig {
            lookback_days,
            min_bars,
        },
        cohort: None,
        gates: Vec::new(),
        scoring: Vec::new(),
    }
}

/// Board, price and special-treatment screens every preset starts with.
fn universe_gates() -> Vec<GateSpec> {
    vec![
        GateSpec::new(GateKind::ExcludeBoards(ExcludeBoardsParams::default())),
        GateSpec::new(GateKind::MinPrice(MinPriceParams::default())),
        GateSpec::new(GateKind::NotSpecialTreatment),
    ]
}

fn higher(name: &str, cap: f64, metric: &str, floor: f64, bands: &[(f64, f64)]) -> Dimension {
    Dimension::new(
        name,
        cap,
        Rule::Bands {
            metric: metric.to_string(),
            table: BandTable::higher_is_better(floor, bands),
        },
    )
}

fn lower(name: &str, cap: f64, metric: &str, floor: f64, bands: &[(f64, f64)]) -> Dimension {
    Dimension::new(
        name,
        cap,
        Rule::Bands {
            metric: metric.to_string(),
            table: BandTable::lower_is_better(floor, bands),
        },
    )
}

fn linear(name: &str, cap: f64, metric: &str, intercept: f64, slope: f64) -> Dimension {
    Dimension::new(
        name,
        cap,
        Rule::Linear {
            metric: metric.to_string(),
            intercept,
            slope,
        },
    )
}

fn tiers(name: &str, cap: f64, floor: f64, tiers: Vec<Tier>) -> Dimension {
    Dimension::new(name, cap, Rule::Tiers { tiers, floor })
}

fn tier(points: f64, when: Vec<Condition>) -> Tier {
    Tier { points, when }
}

fn within(metric: &str, min: f64, max: f64) -> Condition {
    Condition::new(metric).at_least(min).at_most(max)
}

// ── Presets ──────────────────────────────────────────────────────────

fn strong_pullback() -> StrategyConfig {
    let mut config = base(StrategyPreset::StrongPullback, 40, 15, 70.0);
    config.gates = universe_gates();
    config.gates.extend([
        GateSpec::new(GateKind::PriorSurge(PriorSurgeParams::default())),
        GateSpec::new(GateKind::TechnicalPullback(TechnicalPullbackParams::default())),
        GateSpec::new(GateKind::VolumeShrinkage(VolumeShrinkageParams {
            max_ratio: 1.0,
            mild_expansion_max: Some(2.0),
        })),
        GateSpec::new(GateKind::TrendIntact(TrendIntactParams::default())),
    ]);

    let volume_points: BTreeMap<String, f64> = [
        (volume::PATTERN_SHRINKING.to_string(), 20.0),
        (volume::PATTERN_MILD_EXPANSION.to_string(), 15.0),
    ]
    .into_iter()
    .collect();

    config.scoring = vec![
        higher("surge", 30.0, "max_surge_pct", 10.0, &[(20.0, 20.0), (30.0, 25.0), (50.0, 30.0)]),
        tiers(
            "pullback",
            25.0,
            5.0,
            vec![
                tier(
                    25.0,
                    vec![within("ma5_distance_pct", 0.0, 3.0), within("pos_in_5_pct", 45.0, 60.0)],
                ),
                tier(
                    20.0,
                    vec![within("ma5_distance_pct", 0.0, 5.0), within("pos_in_5_pct", 40.0, 70.0)],
                ),
                tier(15.0, vec![within("ma5_distance_pct", 0.0, 8.0)]),
            ],
        ),
        Dimension::new(
            "volume",
            20.0,
            Rule::Label {
                key: "volume_pattern".to_string(),
                points: volume_points,
                default: 5.0,
            },
        ),
        higher("trend", 25.0, "ma5_over_ma10", 10.0, &[(0.97, 25.0)]),
    ];
    config
}

fn strong_sector_pullback() -> StrategyConfig {
    let mut config = base(StrategyPreset::StrongSectorPullback, 45, 20, 70.0);
    config.cohort = Some(CohortConfig::default());
    config.gates = universe_gates();
    config.gates.extend([
        GateSpec::new(GateKind::StrongCohort(StrongCohortParams::default())),
        GateSpec::new(GateKind::RangePullback(RangePullbackParams::default())),
        GateSpec::new(GateKind::NearMa(NearMaParams::default())),
        GateSpec::named(
            "ma10_above_ma20",
            GateKind::TrendIntact(TrendIntactParams {
                fast: MaPeriod::Ma10,
                slow: MaPeriod::Ma20,
                tolerance: 1.0,
                strict: true,
                close_above_fast: false,
            }),
        ),
    ]);
    config.scoring = vec![
        linear("cohort", 30.0, "cohort_rank_fraction", 30.0, -30.0),
        tiers(
            "pullback",
            25.0,
            10.0,
            vec![
                tier(25.0, vec![within("pullback_from_high_10_pct", 5.0, 15.0)]),
                tier(20.0, vec![within("pullback_from_high_10_pct", 3.0, 25.0)]),
            ],
        ),
        lower("ma10_proximity", 20.0, "ma10_abs_distance_pct", 5.0, &[(1.0, 20.0), (3.0, 15.0), (5.0, 10.0)]),
        higher("ma10_over_ma20", 25.0, "ma10_over_ma20", 5.0, &[(1.0, 15.0), (1.02, 20.0), (1.05, 25.0)]),
    ];
    config
}

fn breakout_follow() -> StrategyConfig {
    let mut config = base(StrategyPreset::BreakoutFollow, 40, 15, 75.0);
    config.gates = universe_gates();
    config.gates.extend([
        GateSpec::new(GateKind::HighPosition(HighPositionParams::default())),
        GateSpec::new(GateKind::VolumeBreakout(VolumeBreakoutParams::default())),
        GateSpec::new(GateKind::PriceBreakout(PriceBreakoutParams::default())),
        GateSpec::new(GateKind::TrendIntact(TrendIntactParams {
            tolerance: 0.98,
            close_above_fast: true,
            ..TrendIntactParams::default()
        })),
    ]);
    config.scoring = vec![
        higher("position", 25.0, "pos_in_5_pct", 5.0, &[(70.0, 15.0), (80.0, 20.0), (90.0, 25.0)]),
        higher("volume", 30.0, "vol_ratio_5", 10.0, &[(2.0, 20.0), (3.0, 25.0), (4.0, 30.0)]),
        higher("change", 25.0, "change_pct", 10.0, &[(5.0, 15.0), (7.0, 20.0), (9.0, 25.0)]),
        tiers(
            "trend",
            20.0,
            5.0,
            vec![tier(
                20.0,
                vec![
                    Condition::new("ma5_distance_pct").above(0.0),
                    Condition::new("ma5_over_ma10").at_least(0.98),
                ],
            )],
        ),
    ];
    config
}

fn bottom_reversal() -> StrategyConfig {
    let mut config = base(StrategyPreset::BottomReversal, 45, 21, 70.0);
    config.gates = universe_gates();
    config.gates.extend([
        GateSpec::new(GateKind::PriorStrength(PriorStrengthParams::default())),
        GateSpec::new(GateKind::DeepPullback(DeepPullbackParams::default())),
        GateSpec::new(GateKind::VolumeShrinkage(VolumeShrinkageParams::default())),
        GateSpec::new(GateKind::MaInterwoven),
        GateSpec::new(GateKind::ReversalCandle(ReversalCandleParams::default())),
    ]);
    config.scoring = vec![
        higher("prior_strength", 25.0, "prior_rise_pct", 10.0, &[(30.0, 25.0)]),
        lower("ma5_distance", 25.0, "ma5_distance_pct", 5.0, &[(-10.0, 25.0), (-5.0, 20.0), (0.0, 15.0)]),
        lower("position", 25.0, "pos_in_5_pct", 5.0, &[(15.0, 25.0), (25.0, 20.0), (40.0, 15.0)]),
        lower("volume", 25.0, "vol_ratio_5", 10.0, &[(0.8, 25.0), (1.0, 20.0), (1.2, 15.0)]),
    ];
    config
}

fn volume_acceleration() -> StrategyConfig {
    let mut config = base(StrategyPreset::VolumeAcceleration, 40, 20, 75.0);
    config.gates = universe_gates();
    config.gates.extend([
        GateSpec::named(
            "volume_surge",
            GateKind::VolumeBreakout(VolumeBreakoutParams::default()),
        ),
        GateSpec::new(GateKind::PriceAcceleration(PriceAccelerationParams::default())),
        GateSpec::new(GateKind::SteepRise(SteepRiseParams::default())),
        GateSpec::new(GateKind::MaAlignment),
    ]);
    config.scoring = vec![
        linear("volume", 25.0, "vol_ratio_5", 0.0, 5.0),
        linear("acceleration", 25.0, "acceleration_ratio", 0.0, 8.0),
        linear("rise", 25.0, "pct_3", 0.0, 25.0 / 30.0),
        tiers(
            "trend",
            25.0,
            5.0,
            vec![
                tier(25.0, vec![within("ma5_distance_pct", 0.0, 3.0)]),
                tier(20.0, vec![within("ma5_distance_pct", 0.0, 6.0)]),
                tier(15.0, vec![within("ma5_distance_pct", 0.0, 10.0)]),
                tier(10.0, vec![Condition::new("ma5_distance_pct").at_least(0.0)]),
            ],
        ),
    ];
    config
}

fn bottom_volume_bullish() -> StrategyConfig {
    let mut config = base(StrategyPreset::BottomVolumeBullish, 45, 20, 60.0);
    config.gates = universe_gates();
    config.gates.extend([
        GateSpec::new(GateKind::BottomZone(BottomZoneParams::default())),
        GateSpec::new(GateKind::SmallBullishStreak(SmallBullishStreakParams::default())),
        GateSpec::new(GateKind::VolumeExpansion(VolumeExpansionParams::default())),
        GateSpec::new(GateKind::StandsOnAverages(StandsOnAveragesParams::default())),
        GateSpec::new(GateKind::MinTurnover(MinTurnoverParams::default())),
    ]);
    config.scoring = vec![
        linear("pullback", 25.0, "pullback_from_high_20_pct", 0.0, 0.8),
        linear("streak", 25.0, "bullish_streak", 0.0, 6.0),
        linear("volume_ratio", 15.0, "vol_ratio_5", 0.0, 8.0),
        higher("volume_rising", 5.0, "volume_rising", 0.0, &[(1.0, 5.0)]),
        tiers(
            "trend",
            20.0,
            15.0,
            vec![tier(20.0, vec![within("ma5_distance_pct", 0.0, 3.0)])],
        ),
        linear("activity", 10.0, "amount", 0.0, 3e-8),
    ];
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_validates() {
        for preset in StrategyPreset::all() {
            let config = preset.config();
            assert_eq!(config.name, preset.name());
            config
                .validate()
                .unwrap_or_else(|e| panic!("{} invalid: {e}", preset.name()));
        }
    }

    #[test]
    fn from_name_roundtrip() {
        for preset in StrategyPreset::all() {
            assert_eq!(StrategyPreset::from_name(preset.name()), Some(*preset));
        }
        assert_eq!(StrategyPreset::from_name("nope"), None);
    }

    #[test]
    fn presets_survive_toml_roundtrip() {
        for preset in StrategyPreset::all() {
            let config = preset.config();
            let toml = config.to_toml().unwrap();
            let back = StrategyConfig::from_toml(&toml)
                .unwrap_or_else(|e| panic!("{}: {e}\n{toml}", preset.name()));
            assert_eq!(config, back, "{}", preset.name());
        }
    }

    #[test]
    fn presets_have_distinct_hashes() {
        let hashes: std::collections::HashSet<String> = StrategyPreset::all()
            .iter()
            .map(|p| p.config().config_hash().unwrap().0)
            .collect();
        assert_eq!(hashes.len(), StrategyPreset::all().len());
    }

    #[test]
    fn only_sector_pullback_ranks_cohorts() {
        for preset in StrategyPreset::all() {
            let config = preset.config();
            let has_cohort_gate = config.gates.iter().any(|g| g.kind.needs_cohorts());
            assert_eq!(has_cohort_gate, config.cohort.is_some(), "{}", preset.name());
        }
    }
}
