//! Composite scorer: independently capped sub-scores summing to at most 100.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::engine::Snapshot;
use crate::gates::Evidence;

use super::{Metrics, Rule, ScoringError};

/// Sum of all dimension caps.
pub const TOTAL_POINTS: f64 = 100.0;

const CAP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub cap: f64,
    #[serde(flatten)]
    pub rule: Rule,
}

impl Dimension {
    pub fn new(name: &str, cap: f64, rule: Rule) -> Self {
        Self {
            name: name.to_string(),
            cap,
            rule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub name: String,
    pub points: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// In [0, 100].
    pub total: f64,
    pub parts: Vec<SubScore>,
}

impl ScoreCard {
    pub fn part(&self, name: &str) -> Option<f64> {
        self.parts.iter().find(|p| p.name == name).map(|p| p.points)
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    dimensions: Vec<Dimension>,
}

impl Scorer {
    /// Validates every rule, that each bounded rule fits its cap, and that the
    /// caps sum to 100.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, ScoringError> {
        if dimensions.is_empty() {
            return Err(ScoringError::NoDimensions);
        }
        let mut names = HashSet::new();
        for d in &dimensions {
            if !names.insert(d.name.as_str()) {
                return Err(ScoringError::DuplicateDimension(d.name.clone()));
            }
            if !d.cap.is_finite() || d.cap <= 0.0 {
                return Err(ScoringError::InvalidCap(d.name.clone()));
            }
            d.rule.validate(&d.name)?;
            if let Some(max) = d.rule.max_points() {
                if max > d.cap + CAP_TOLERANCE {
                    return Err(ScoringError::PointsExceedCap {
                        dimension: d.name.clone(),
                        max,
                        cap: d.cap,
                    });
                }
            }
        }
        let total: f64 = dimensions.iter().map(|d| d.cap).sum();
        if (total - TOTAL_POINTS).abs() > CAP_TOLERANCE {
            return Err(ScoringError::CapsDoNotSum { total });
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Every metric or label name some rule reads.
    pub fn inputs(&self) -> BTreeSet<&str> {
        self.dimensions.iter().flat_map(|d| d.rule.inputs()).collect()
    }

    pub fn score(&self, snapshot: &Snapshot, evidence: &Evidence) -> ScoreCard {
        let metrics = Metrics::new(snapshot, evidence);
        let parts: Vec<SubScore> = self
            .dimensions
            .iter()
            .map(|d| SubScore {
                name: d.name.clone(),
                points: d.rule.points(&metrics).clamp(0.0, d.cap),
                cap: d.cap,
            })
            .collect();
        let total = parts.iter().map(|p| p.points).sum::<f64>().clamp(0.0, TOTAL_POINTS);
        ScoreCard { total, parts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::IndicatorEngine;
    use crate::indicators::make_bars;
    use crate::scoring::BandTable;

    fn bands(metric: &str, floor: f64, table: &[(f64, f64)]) -> Rule {
        Rule::Bands {
            metric: metric.into(),
            table: BandTable::higher_is_better(floor, table),
        }
    }

    #[test]
    fn caps_must_sum_to_100() {
        let err = Scorer::new(vec![
            Dimension::new("a", 50.0, bands("close", 0.0, &[(1.0, 50.0)])),
            Dimension::new("b", 40.0, bands("close", 0.0, &[(1.0, 40.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, ScoringError::CapsDoNotSum { .. }));
    }

    #[test]
    fn band_above_cap_rejected() {
        let err = Scorer::new(vec![
            Dimension::new("a", 50.0, bands("close", 0.0, &[(1.0, 60.0)])),
            Dimension::new("b", 50.0, bands("close", 0.0, &[(1.0, 50.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, ScoringError::PointsExceedCap { .. }));
    }

    #[test]
    fn linear_is_clamped_to_cap() {
        let scorer = Scorer::new(vec![
            Dimension::new(
                "volume",
                25.0,
                Rule::Linear {
                    metric: "close".into(),
                    intercept: 0.0,
                    slope: 100.0,
                },
            ),
            Dimension::new("rest", 75.0, bands("close", 0.0, &[(1.0, 75.0)])),
        ])
        .unwrap();
        let snap = IndicatorEngine::new(1).latest(&make_bars(&[10.0])).unwrap();
        let card = scorer.score(&snap, &Evidence::default());
        assert_eq!(card.part("volume"), Some(25.0));
        assert_eq!(card.total, 100.0);
    }

    #[test]
    fn negative_linear_floors_at_zero() {
        let scorer = Scorer::new(vec![Dimension::new(
            "x",
            100.0,
            Rule::Linear {
                metric: "close".into(),
                intercept: 0.0,
                slope: -1.0,
            },
        )])
        .unwrap();
        let snap = IndicatorEngine::new(1).latest(&make_bars(&[10.0])).unwrap();
        assert_eq!(scorer.score(&snap, &Evidence::default()).total, 0.0);
    }
}
