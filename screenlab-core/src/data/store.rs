//! Data store contract and structured error types.
//!
//! The `DataStore` trait abstracts over bar sources (in-memory, CSV directory,
//! Parquet directory) so the orchestrator can swap implementations and tests
//! can mock failures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Bar, InstrumentRef};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("no data for instrument '{instrument}'")]
    NotFound { instrument: String },

    #[error("malformed data for instrument '{instrument}': {detail}")]
    Malformed { instrument: String, detail: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// Per-instrument window results. A failed entry is a partial load failure;
/// the outer `Result` of `get_window` is the whole-batch outcome.
pub type WindowMap = BTreeMap<String, Result<Vec<Bar>, DataError>>;

/// Source of bars, reference data and group memberships.
pub trait DataStore: Send + Sync {
    /// Store name for logs (e.g. "csv", "parquet").
    fn name(&self) -> &str;

    /// All instrument ids the store knows, sorted.
    fn instruments(&self) -> Result<Vec<String>, DataError>;

    /// Most recent bar date across the store, `None` when empty.
    fn latest_date(&self) -> Result<Option<NaiveDate>, DataError>;

    /// Time-ascending bars with `start <= date <= end` for each requested id.
    fn get_window(
        &self,
        ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WindowMap, DataError>;

    /// Reference rows for the requested ids; ids without a row are omitted.
    fn get_reference(&self, ids: &[String]) -> Result<BTreeMap<String, InstrumentRef>, DataError>;

    /// Thematic group names per requested id; ids without groups are omitted.
    fn get_group_memberships(
        &self,
        ids: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, DataError>;
}

/// Keep bars inside `[start, end]`, sorted by date.
pub(crate) fn clip_window(bars: &[Bar], start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    let mut out: Vec<Bar> = bars
        .iter()
        .filter(|b| b.date >= start && b.date <= end)
        .cloned()
        .collect();
    out.sort_by_key(|b| b.date);
    out
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(e: csv::Error) -> Self {
        DataError::Csv(e.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        DataError::Json(e.to_string())
    }
}
