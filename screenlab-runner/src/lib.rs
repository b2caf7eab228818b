//! ScreenLab Runner: strategy configs, presets and the screening orchestrator.
//!
//! This crate builds on `screenlab-core` to provide:
//! - TOML strategy configuration with validation and a config hash
//! - Named presets for the built-in strategies
//! - The orchestrator that loads a universe, gates, scores and ranks it
//! - Structured screening reports and their JSON/CSV export

pub mod config;
pub mod export;
pub mod factory;
pub mod presets;
pub mod result;
pub mod screen;

pub use config::{ConfigError, GateKind, GateSpec, StrategyConfig, WindowConfig};
pub use export::{export_candidates_csv, export_json, import_json, load_report, save_report};
pub use factory::{FactoryError, Strategy};
pub use presets::StrategyPreset;
pub use result::{Candidate, Diagnostics, LoadFailure, ScreeningReport, SCHEMA_VERSION};
pub use screen::{rank_candidates, Phase, ScreenError, Screener};
