//! Monotonic, left-closed point bands.
//!
//! Higher-is-better tables award `points` to every `x >= threshold` up to the
//! next threshold; below the first threshold the floor applies. Lower-is-better
//! tables award `points` to every `x < threshold` down to the previous
//! threshold; at or above the last threshold the floor applies. Either way the
//! bands partition the real line into left-closed intervals with no gaps or
//! overlaps.

use serde::{Deserialize, Serialize};

use super::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub threshold: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTable {
    pub direction: Direction,
    /// Thresholds strictly ascending.
    pub bands: Vec<Band>,
    #[serde(default)]
    pub floor: f64,
}

impl BandTable {
    /// `bands` as (threshold, points), ascending.
    pub fn higher_is_better(floor: f64, bands: &[(f64, f64)]) -> Self {
        Self::build(Direction::HigherIsBetter, floor, bands)
    }

    /// `bands` as (threshold, points), ascending.
    pub fn lower_is_better(floor: f64, bands: &[(f64, f64)]) -> Self {
        Self::build(Direction::LowerIsBetter, floor, bands)
    }

    fn build(direction: Direction, floor: f64, bands: &[(f64, f64)]) -> Self {
        Self {
            direction,
            bands: bands
                .iter()
                .map(|&(threshold, points)| Band { threshold, points })
                .collect(),
            floor,
        }
    }

    pub fn points(&self, x: f64) -> f64 {
        match self.direction {
            Direction::HigherIsBetter => {
                let mut points = self.floor;
                for band in &self.bands {
                    if x >= band.threshold {
                        points = band.points;
                    } else {
                        break;
                    }
                }
                points
            }
            Direction::LowerIsBetter => self
                .bands
                .iter()
                .find(|band| x < band.threshold)
                .map_or(self.floor, |band| band.points),
        }
    }

    pub fn max_points(&self) -> f64 {
        self.bands
            .iter()
            .map(|b| b.points)
            .fold(self.floor, f64::max)
    }

    pub fn validate(&self, dimension: &str) -> Result<(), ScoringError> {
        let dim = || dimension.to_string();
        if self.bands.is_empty() {
            return Err(ScoringError::EmptyBands(dim()));
        }
        if !self.floor.is_finite() || self.floor < 0.0 {
            return Err(ScoringError::InvalidPoints(dim()));
        }
        for (i, band) in self.bands.iter().enumerate() {
            if !band.threshold.is_finite() {
                return Err(ScoringError::NonIncreasingThreshold { dimension: dim(), index: i });
            }
            if !band.points.is_finite() || band.points < 0.0 {
                return Err(ScoringError::InvalidPoints(dim()));
            }
            if i > 0 && band.threshold <= self.bands[i - 1].threshold {
                return Err(ScoringError::NonIncreasingThreshold { dimension: dim(), index: i });
            }
        }

        // Points in the order a value improves: floor first, best band last.
        let mut improving: Vec<f64> = Vec::with_capacity(self.bands.len() + 1);
        improving.push(self.floor);
        match self.direction {
            Direction::HigherIsBetter => improving.extend(self.bands.iter().map(|b| b.points)),
            Direction::LowerIsBetter => improving.extend(self.bands.iter().rev().map(|b| b.points)),
        }
        for (i, pair) in improving.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(ScoringError::NonMonotonicPoints { dimension: dim(), index: i });
            }
        }
        Ok(())
    }
}
