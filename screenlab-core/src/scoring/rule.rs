//! Sub-score rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::Snapshot;
use crate::gates::Evidence;

use super::{BandTable, ScoringError};

/// Metric lookup for rules: gate evidence first, then snapshot metrics.
#[derive(Debug, Clone, Copy)]
pub struct Metrics<'a> {
    pub snapshot: &'a Snapshot,
    pub evidence: &'a Evidence,
}

impl<'a> Metrics<'a> {
    pub fn new(snapshot: &'a Snapshot, evidence: &'a Evidence) -> Self {
        Self { snapshot, evidence }
    }

    /// Defined value of a metric; `None` when unknown or undefined.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.evidence
            .value(name)
            .or_else(|| self.snapshot.metric(name).and_then(|r| r.value()))
    }

    pub fn label(&self, key: &str) -> Option<&'a str> {
        self.evidence.label(key)
    }
}

/// One comparison against a metric. All set bounds must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    /// metric > above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    /// metric >= at_least
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least: Option<f64>,
    /// metric <= at_most
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_most: Option<f64>,
    /// metric < below
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
}

impl Condition {
    pub fn new(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            above: None,
            at_least: None,
            at_most: None,
            below: None,
        }
    }

    pub fn above(mut self, v: f64) -> Self {
        self.above = Some(v);
        self
    }

    pub fn at_least(mut self, v: f64) -> Self {
        self.at_least = Some(v);
        self
    }

    pub fn at_most(mut self, v: f64) -> Self {
        self.at_most = Some(v);
        self
    }

    pub fn below(mut self, v: f64) -> Self {
        self.below = Some(v);
        self
    }

    /// Undefined metrics never satisfy a condition.
    pub fn holds(&self, metrics: &Metrics<'_>) -> bool {
        let Some(x) = metrics.value(&self.metric) else {
            return false;
        };
        self.above.map_or(true, |t| x > t)
            && self.at_least.map_or(true, |t| x >= t)
            && self.at_most.map_or(true, |t| x <= t)
            && self.below.map_or(true, |t| x < t)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub points: f64,
    pub when: Vec<Condition>,
}

/// How a dimension turns metrics into points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Band table over one metric.
    Bands { metric: String, table: BandTable },
    /// `intercept + slope * metric`, clamped to `[0, cap]` by the scorer.
    Linear {
        metric: String,
        #[serde(default)]
        intercept: f64,
        slope: f64,
    },
    /// Points of the first tier whose conditions all hold, else `floor`.
    Tiers {
        tiers: Vec<Tier>,
        #[serde(default)]
        floor: f64,
    },
    /// Points keyed by an evidence label, else `default`.
    Label {
        key: String,
        points: BTreeMap<String, f64>,
        #[serde(default)]
        default: f64,
    },
}

impl Rule {
    /// Raw points before the dimension cap. Undefined inputs earn nothing
    /// (bands, linear) or fall through to the floor/default (tiers, label).
    pub fn points(&self, metrics: &Metrics<'_>) -> f64 {
        match self {
            Rule::Bands { metric, table } => metrics.value(metric).map_or(0.0, |x| table.points(x)),
            Rule::Linear {
                metric,
                intercept,
                slope,
            } => metrics.value(metric).map_or(0.0, |x| intercept + slope * x),
            Rule::Tiers { tiers, floor } => tiers
                .iter()
                .find(|t| t.when.iter().all(|c| c.holds(metrics)))
                .map_or(*floor, |t| t.points),
            Rule::Label {
                key,
                points,
                default,
            } => metrics
                .label(key)
                .and_then(|l| points.get(l).copied())
                .unwrap_or(*default),
        }
    }

    /// Metric and label names this rule reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Rule::Bands { metric, .. } | Rule::Linear { metric, .. } => vec![metric.as_str()],
            Rule::Tiers { tiers, .. } => tiers
                .iter()
                .flat_map(|t| t.when.iter().map(|c| c.metric.as_str()))
                .collect(),
            Rule::Label { key, .. } => vec![key.as_str()],
        }
    }

    /// Largest raw award, when bounded.
    pub fn max_points(&self) -> Option<f64> {
        match self {
            Rule::Bands { table, .. } => Some(table.max_points()),
            Rule::Linear { .. } => None,
            Rule::Tiers { tiers, floor } => Some(tiers.iter().map(|t| t.points).fold(*floor, f64::max)),
            Rule::Label { points, default, .. } => Some(points.values().copied().fold(*default, f64::max)),
        }
    }

    pub fn validate(&self, dimension: &str) -> Result<(), ScoringError> {
        match self {
            Rule::Bands { table, .. } => table.validate(dimension),
            Rule::Linear {
                intercept, slope, ..
            } => {
                if intercept.is_finite() && slope.is_finite() {
                    Ok(())
                } else {
                    Err(ScoringError::InvalidPoints(dimension.to_string()))
                }
            }
            Rule::Tiers { tiers, floor } => {
                let all = tiers.iter().map(|t| t.points).chain(std::iter::once(*floor));
                for p in all {
                    if !p.is_finite() || p < 0.0 {
                        return Err(ScoringError::InvalidPoints(dimension.to_string()));
                    }
                }
                Ok(())
            }
            Rule::Label { points, default, .. } => {
                let all = points.values().copied().chain(std::iter::once(*default));
                for p in all {
                    if !p.is_finite() || p < 0.0 {
                        return Err(ScoringError::InvalidPoints(dimension.to_string()));
                    }
                }
                Ok(())
            }
        }
    }
}
