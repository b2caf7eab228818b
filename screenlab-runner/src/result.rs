//! Screening result and run diagnostics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use screenlab_core::cohort::{CohortEntry, CohortMembership};
use screenlab_core::engine::Snapshot;
use screenlab_core::fingerprint::{ConfigHash, DatasetHash};
use screenlab_core::gates::{Evidence, GateTally};
use screenlab_core::scoring::SubScore;

/// Current schema version for exported reports.
pub const SCHEMA_VERSION: u32 = 1;

/// One instrument that passed every gate and met the minimum score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub instrument: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    pub score: f64,
    pub parts: Vec<SubScore>,
    /// Latest snapshot the gates and scorer saw.
    pub snapshot: Snapshot,
    /// Gate outputs merged in pipeline order.
    pub evidence: Evidence,
    /// Best-ranked group the instrument belongs to, if any was ranked.
    #[serde(default)]
    pub cohort: Option<CohortMembership>,
}

impl Candidate {
    pub fn close(&self) -> f64 {
        self.snapshot.bar.close
    }

    pub fn change_pct(&self) -> Option<f64> {
        self.snapshot.change_pct().value()
    }
}

/// An instrument whose window could not be loaded or used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub instrument: String,
    pub reason: String,
}

/// Where instruments dropped out, and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub universe_size: usize,
    pub load_failures: Vec<LoadFailure>,
    /// Fewer bars than the engine's minimum; never gated.
    pub insufficient_data: usize,
    /// No bar on or before the as-of date within the window.
    pub no_recent_bar: usize,
    /// Per-gate rejection counts in pipeline order.
    pub rejections: Vec<GateTally>,
    pub passed_gates: usize,
    pub below_min_score: usize,
    pub qualified: usize,
    /// Qualified candidates cut by `top_n`.
    pub truncated: usize,
}

impl Diagnostics {
    pub fn rejected(&self) -> usize {
        self.rejections.iter().map(|t| t.rejected).sum()
    }

    /// Every universe member is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.load_failures.len()
            + self.insufficient_data
            + self.no_recent_bar
            + self.rejected()
            + self.passed_gates
            == self.universe_size
            && self.below_min_score + self.qualified == self.passed_gates
    }
}

/// Structured outcome of one strategy run; rendering is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub as_of: NaiveDate,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub min_score: f64,
    /// Sorted by score descending, ties by instrument id.
    pub candidates: Vec<Candidate>,
    /// Strongest groups of the run's cohort table.
    pub top_cohorts: Vec<CohortEntry>,
    pub diagnostics: Diagnostics,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ScreeningReport {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
