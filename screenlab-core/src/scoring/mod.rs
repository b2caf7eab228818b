//! Signal strength scoring.
//!
//! A `Scorer` is a list of named dimensions, each with a cap and a rule.
//! Caps sum to 100, so the composite is bounded without relying on the final
//! clamp.

pub mod band;
pub mod rule;
pub mod scorer;

use thiserror::Error;

pub use band::{Band, BandTable, Direction};
pub use rule::{Condition, Metrics, Rule, Tier};
pub use scorer::{Dimension, ScoreCard, Scorer, SubScore, TOTAL_POINTS};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("scorer has no dimensions")]
    NoDimensions,
    #[error("duplicate scoring dimension '{0}'")]
    DuplicateDimension(String),
    #[error("dimension '{0}': cap must be positive and finite")]
    InvalidCap(String),
    #[error("dimension '{0}': band table is empty")]
    EmptyBands(String),
    #[error("dimension '{dimension}': band thresholds must strictly increase (band {index})")]
    NonIncreasingThreshold { dimension: String, index: usize },
    #[error("dimension '{dimension}': band points are not monotonic (step {index})")]
    NonMonotonicPoints { dimension: String, index: usize },
    #[error("dimension '{0}': points must be finite and non-negative")]
    InvalidPoints(String),
    #[error("dimension '{dimension}': awards up to {max} points, above its cap {cap}")]
    PointsExceedCap {
        dimension: String,
        max: f64,
        cap: f64,
    },
    #[error("dimension caps sum to {total}, expected 100")]
    CapsDoNotSum { total: f64 },
}
