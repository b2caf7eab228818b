//! ScreenLab Core: indicators, gates, scoring and cohort ranking for
//! end-of-day strategy screening.
//!
//! This crate contains the per-instrument evaluation machinery:
//! - Domain types (bars, instrument reference data, boards)
//! - Indicator engine producing look-ahead-free per-bar snapshots
//! - Gate library and short-circuit gate pipeline
//! - Band/linear/tier/label scoring with capped dimensions
//! - Cohort strength ranking over industry and thematic groups
//! - Data-store contract with in-memory, CSV, Parquet and synthetic stores

pub mod cohort;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod gates;
pub mod indicators;
pub mod scoring;
