//! Screening orchestrator.
//!
//! One run walks `Loading → Indicating → Gating → Scoring → Ranking → Done`
//! for a single strategy:
//!
//! 1. Load each instrument's bar window (chunked, on the worker pool).
//! 2. Compute snapshot histories; short windows are counted, bad data is
//!    recorded as a load failure.
//! 3. Rank cohorts once into a frozen table shared by every gate call.
//! 4. Gate, score and threshold each instrument.
//! 5. Sort by score (ties by instrument id) and truncate.
//!
//! Results are collected in universe order, so the worker count never
//! changes the output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use rayon::ThreadPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use screenlab_core::cohort::{CohortRanker, CohortTable, Memberships};
use screenlab_core::data::{DataError, DataStore, WindowMap};
use screenlab_core::domain::{Bar, InstrumentRef};
use screenlab_core::engine::{IndicatorEngine, IndicatorError, Snapshot};
use screenlab_core::fingerprint::DatasetHash;
use screenlab_core::gates::{
    GateInput, PipelineOutcome, RejectReason, Rejection, RejectionHistogram,
};

use crate::config::StrategyConfig;
use crate::factory::{FactoryError, Strategy};
use crate::result::{Candidate, Diagnostics, LoadFailure, ScreeningReport, SCHEMA_VERSION};

/// Instruments per data-store request.
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Cohorts carried on every report.
pub const REPORT_COHORTS: usize = 10;

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("strategy error: {0}")]
    Factory(#[from] FactoryError),
    #[error("failed to load universe: {0}")]
    UniverseLoad(DataError),
    #[error("data store '{0}' holds no bars and no as-of date was given")]
    EmptyStore(String),
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Orchestrator states, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Indicating,
    Gating,
    Scoring,
    Ranking,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Loading => "loading",
            Phase::Indicating => "indicating",
            Phase::Gating => "gating",
            Phase::Scoring => "scoring",
            Phase::Ranking => "ranking",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Runs strategies against one data store.
pub struct Screener<'a> {
    store: &'a dyn DataStore,
    as_of: Option<NaiveDate>,
    universe: Option<Vec<String>>,
    chunk_size: usize,
}

/// Loaded inputs shared by the later phases.
struct Universe {
    as_of: NaiveDate,
    ids: Vec<String>,
    windows: BTreeMap<String, Vec<Bar>>,
    reference: BTreeMap<String, InstrumentRef>,
    themes: BTreeMap<String, Vec<String>>,
    failures: Vec<LoadFailure>,
}

/// Per-instrument result of the indicating phase.
enum Indicated {
    Ready(Vec<Snapshot>),
    Insufficient,
    Stale,
    Failed(String),
    NotLoaded,
}

/// Per-instrument result of gating and scoring.
enum Evaluated {
    Rejected(Rejection),
    Scored(Candidate),
}

impl<'a> Screener<'a> {
    pub fn new(store: &'a dyn DataStore) -> Self {
        Self {
            store,
            as_of: None,
            universe: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Screen as of this date instead of the store's latest bar.
    pub fn with_as_of(mut self, as_of: Option<NaiveDate>) -> Self {
        self.as_of = as_of;
        self
    }

    /// Restrict the run to these instruments instead of the whole store.
    pub fn with_universe(mut self, ids: Vec<String>) -> Self {
        self.universe = Some(ids);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Build the strategy from its config, then run it.
    pub fn run_config(&self, config: StrategyConfig) -> Result<ScreeningReport, ScreenError> {
        let strategy = Strategy::from_config(config)?;
        self.run(&strategy)
    }

    pub fn run(&self, strategy: &Strategy) -> Result<ScreeningReport, ScreenError> {
        let pool = build_pool(strategy.config.workers)?;
        let pool = pool.as_ref();
        let name = strategy.name();

        // ── Loading ──
        let universe = self.load(strategy.config.window.lookback_days, pool)?;
        info!(
            strategy = name,
            phase = %Phase::Loading,
            as_of = %universe.as_of,
            instruments = universe.ids.len(),
            loaded = universe.windows.len(),
            failures = universe.failures.len(),
            "universe loaded"
        );
        let dataset_hash = DatasetHash::of(
            universe.as_of,
            universe
                .windows
                .iter()
                .map(|(id, bars)| (id.as_str(), bars.as_slice())),
        );

        // ── Indicating ──
        let trading_day = universe
            .windows
            .values()
            .filter_map(|bars| bars.last().map(|b| b.date))
            .max();
        let indicated: Vec<Indicated> = map_ordered(pool, &universe.ids, |id| {
            match universe.windows.get(id) {
                Some(bars) => indicate(&strategy.engine, bars, trading_day),
                None => Indicated::NotLoaded,
            }
        });

        let mut diagnostics = Diagnostics {
            universe_size: universe.ids.len(),
            load_failures: universe.failures,
            ..Diagnostics::default()
        };
        let mut histories: BTreeMap<String, Vec<Snapshot>> = BTreeMap::new();
        let mut ready: Vec<&String> = Vec::new();
        for (id, state) in universe.ids.iter().zip(indicated) {
            match state {
                Indicated::Ready(history) => {
                    ready.push(id);
                    histories.insert(id.clone(), history);
                }
                Indicated::Insufficient => diagnostics.insufficient_data += 1,
                Indicated::Stale => diagnostics.no_recent_bar += 1,
                // Recorded while loading.
                Indicated::NotLoaded => {}
                Indicated::Failed(reason) => {
                    debug!(instrument = %id, %reason, "skipping malformed window");
                    diagnostics.load_failures.push(LoadFailure {
                        instrument: id.clone(),
                        reason,
                    });
                }
            }
        }
        info!(
            strategy = name,
            phase = %Phase::Indicating,
            ready = ready.len(),
            insufficient = diagnostics.insufficient_data,
            stale = diagnostics.no_recent_bar,
            "snapshots computed"
        );

        let cohorts = rank_cohorts(&strategy.ranker, &histories, &universe.reference, &universe.themes);
        debug!(strategy = name, groups = cohorts.len(), "cohort table frozen");

        // ── Gating + Scoring ──
        let mut histogram = RejectionHistogram::for_pipeline(&strategy.pipeline);
        let evaluated: Vec<Evaluated> = map_ordered(pool, &ready, |id| {
            let reference = universe
                .reference
                .get(id.as_str())
                .cloned()
                .unwrap_or_else(|| InstrumentRef::bare(id.as_str()));
            evaluate(strategy, &reference, &histories[id.as_str()], &cohorts)
        });

        let mut candidates = Vec::new();
        for outcome in evaluated {
            match outcome {
                Evaluated::Rejected(rejection) => histogram.record(&rejection),
                Evaluated::Scored(candidate) => {
                    diagnostics.passed_gates += 1;
                    if candidate.score >= strategy.config.min_score {
                        candidates.push(candidate);
                    } else {
                        diagnostics.below_min_score += 1;
                    }
                }
            }
        }
        info!(
            strategy = name,
            phase = %Phase::Gating,
            passed = diagnostics.passed_gates,
            rejected = histogram.total(),
            "gates evaluated"
        );
        info!(
            strategy = name,
            phase = %Phase::Scoring,
            qualified = candidates.len(),
            below_min_score = diagnostics.below_min_score,
            min_score = strategy.config.min_score,
            "candidates scored"
        );

        // ── Ranking ──
        rank_candidates(&mut candidates);
        diagnostics.qualified = candidates.len();
        if let Some(top_n) = strategy.config.top_n {
            diagnostics.truncated = candidates.len().saturating_sub(top_n);
            candidates.truncate(top_n);
        }
        info!(
            strategy = name,
            phase = %Phase::Ranking,
            kept = candidates.len(),
            truncated = diagnostics.truncated,
            "candidates ranked"
        );

        for tally in histogram.tallies() {
            info!(
                strategy = name,
                gate = %tally.gate,
                rejected = tally.rejected,
                undefined_input = tally.undefined_input,
                insufficient_history = tally.insufficient_history,
                "gate rejections"
            );
        }
        diagnostics.rejections = histogram.tallies().to_vec();
        info!(strategy = name, phase = %Phase::Done, candidates = candidates.len(), "screening finished");

        Ok(ScreeningReport {
            schema_version: SCHEMA_VERSION,
            strategy: name.to_string(),
            as_of: universe.as_of,
            config_hash: strategy.config_hash.clone(),
            dataset_hash,
            min_score: strategy.config.min_score,
            candidates,
            top_cohorts: cohorts.top(REPORT_COHORTS).to_vec(),
            diagnostics,
        })
    }

    /// Rank cohorts alone, for inspection.
    pub fn cohorts(
        &self,
        ranker: &CohortRanker,
        lookback_days: u32,
    ) -> Result<(NaiveDate, CohortTable), ScreenError> {
        let universe = self.load(lookback_days, None)?;
        let engine = IndicatorEngine::new(ranker.config().window.max(1));
        let histories: BTreeMap<String, Vec<Snapshot>> = universe
            .windows
            .iter()
            .filter_map(|(id, bars)| engine.compute(bars).ok().map(|h| (id.clone(), h)))
            .collect();
        let table = rank_cohorts(ranker, &histories, &universe.reference, &universe.themes);
        Ok((universe.as_of, table))
    }

    fn load(&self, lookback_days: u32, pool: Option<&ThreadPool>) -> Result<Universe, ScreenError> {
        let as_of = match self.as_of {
            Some(date) => date,
            None => self
                .store
                .latest_date()
                .map_err(ScreenError::UniverseLoad)?
                .ok_or_else(|| ScreenError::EmptyStore(self.store.name().to_string()))?,
        };
        let start = as_of - Duration::days(i64::from(lookback_days));

        let ids: Vec<String> = match &self.universe {
            Some(ids) => ids.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect(),
            None => self
                .store
                .instruments()
                .map_err(ScreenError::UniverseLoad)?
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let chunks: Vec<&[String]> = ids.chunks(self.chunk_size).collect();
        let loaded: Vec<Result<WindowMap, DataError>> =
            map_ordered(pool, &chunks, |chunk| self.store.get_window(chunk, start, as_of));

        if !chunks.is_empty() && loaded.iter().all(|r| r.is_err()) {
            let first = loaded
                .into_iter()
                .find_map(Result::err)
                .unwrap_or_else(|| DataError::Unavailable("no chunk loaded".into()));
            return Err(ScreenError::UniverseLoad(first));
        }

        let mut windows = BTreeMap::new();
        let mut failures = Vec::new();
        for (chunk, result) in chunks.iter().zip(loaded) {
            match result {
                Ok(mut map) => {
                    for id in chunk.iter() {
                        match map.remove(id) {
                            Some(Ok(mut bars)) => {
                                bars.retain(|b| b.date >= start && b.date <= as_of);
                                windows.insert(id.clone(), bars);
                            }
                            Some(Err(e)) => {
                                debug!(instrument = %id, error = %e, "window load failed");
                                failures.push(LoadFailure {
                                    instrument: id.clone(),
                                    reason: e.to_string(),
                                });
                            }
                            None => failures.push(LoadFailure {
                                instrument: id.clone(),
                                reason: "missing from store response".into(),
                            }),
                        }
                    }
                }
                Err(e) => {
                    warn!(instruments = chunk.len(), error = %e, "chunk load failed");
                    failures.extend(chunk.iter().map(|id| LoadFailure {
                        instrument: id.clone(),
                        reason: e.to_string(),
                    }));
                }
            }
        }

        let reference = self.store.get_reference(&ids).unwrap_or_else(|e| {
            warn!(error = %e, "reference data unavailable; using bare instruments");
            BTreeMap::new()
        });
        let themes = self.store.get_group_memberships(&ids).unwrap_or_else(|e| {
            warn!(error = %e, "group memberships unavailable; themes skipped");
            BTreeMap::new()
        });

        Ok(Universe {
            as_of,
            ids,
            windows,
            reference,
            themes,
            failures,
        })
    }
}

fn build_pool(workers: usize) -> Result<Option<ThreadPool>, ScreenError> {
    if workers <= 1 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map(Some)
        .map_err(|e| ScreenError::Pool(e.to_string()))
}

/// Map in input order, on the pool when there is one.
fn map_ordered<T, R, F>(pool: Option<&ThreadPool>, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    match pool {
        Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        None => items.iter().map(f).collect(),
    }
}

fn indicate(engine: &IndicatorEngine, bars: &[Bar], trading_day: Option<NaiveDate>) -> Indicated {
    match bars.last() {
        None => return Indicated::Stale,
        Some(last) if Some(last.date) < trading_day => return Indicated::Stale,
        Some(_) => {}
    }
    match engine.compute(bars) {
        Ok(history) => Indicated::Ready(history),
        Err(IndicatorError::InsufficientData { .. }) => Indicated::Insufficient,
        Err(e) => Indicated::Failed(e.to_string()),
    }
}

fn rank_cohorts(
    ranker: &CohortRanker,
    histories: &BTreeMap<String, Vec<Snapshot>>,
    reference: &BTreeMap<String, InstrumentRef>,
    themes: &BTreeMap<String, Vec<String>>,
) -> CohortTable {
    ranker.rank(histories, Memberships::from_sources(reference, themes))
}

fn evaluate(
    strategy: &Strategy,
    reference: &InstrumentRef,
    history: &[Snapshot],
    cohorts: &CohortTable,
) -> Evaluated {
    let Some(input) = GateInput::new(reference, history) else {
        return Evaluated::Rejected(Rejection {
            gate: strategy
                .pipeline
                .gate_names()
                .first()
                .map(|g| g.to_string())
                .unwrap_or_default(),
            index: 0,
            reason: RejectReason::InsufficientHistory,
        });
    };
    let input = input.with_cohorts(Some(cohorts));

    match strategy.pipeline.evaluate(&input) {
        PipelineOutcome::Reject(rejection) => Evaluated::Rejected(rejection),
        PipelineOutcome::Pass(evidence) => {
            let latest = input.latest();
            let card = strategy.scorer.score(latest, &evidence);
            let cohort = evidence
                .cohort
                .clone()
                .or_else(|| cohorts.memberships_of(&reference.id).into_iter().next());
            Evaluated::Scored(Candidate {
                instrument: reference.id.clone(),
                name: reference.name.clone(),
                industry: reference.industry.clone(),
                score: card.total,
                parts: card.parts,
                snapshot: latest.clone(),
                evidence,
                cohort,
            })
        }
    }
}

/// Score descending, then instrument id ascending.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenlab_core::data::InMemoryStore;

    fn bars(id: &str, closes: &[f64]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let prev = if i == 0 { close } else { closes[i - 1] };
                Bar {
                    instrument: id.to_string(),
                    date: base + Duration::days(i as i64),
                    open: prev,
                    high: prev.max(close) + 0.1,
                    low: prev.min(close) - 0.1,
                    close,
                    pre_close: Some(prev),
                    pct_change: None,
                    volume: 1000.0,
                    amount: 1.0e8,
                }
            })
            .collect()
    }

    fn candidate(id: &str, score: f64) -> Candidate {
        let history = IndicatorEngine::new(1).compute(&bars(id, &[10.0])).unwrap();
        Candidate {
            instrument: id.into(),
            name: None,
            industry: None,
            score,
            parts: Vec::new(),
            snapshot: history[0].clone(),
            evidence: Default::default(),
            cohort: None,
        }
    }

    #[test]
    fn ties_break_by_instrument_id() {
        let mut c = vec![candidate("B", 80.0), candidate("C", 90.0), candidate("A", 80.0)];
        rank_candidates(&mut c);
        let ids: Vec<&str> = c.iter().map(|c| c.instrument.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
    }

    #[test]
    fn stale_and_short_windows_are_counted() {
        let engine = IndicatorEngine::new(5);
        let day = NaiveDate::from_ymd_opt(2024, 3, 10);
        let short = bars("A", &[10.0; 10]);
        assert!(matches!(indicate(&engine, &short[..3], short[2].date.into()), Indicated::Insufficient));
        assert!(matches!(indicate(&engine, &short, day), Indicated::Ready(_)));
        assert!(matches!(indicate(&engine, &short[..5], day), Indicated::Stale));
        assert!(matches!(indicate(&engine, &[], day), Indicated::Stale));
    }

    #[test]
    fn empty_store_without_as_of_is_an_error() {
        let store = InMemoryStore::new();
        let err = Screener::new(&store).load(30, None).err().unwrap();
        assert!(matches!(err, ScreenError::EmptyStore(_)));
    }

    #[test]
    fn bars_after_as_of_are_ignored() {
        let store = InMemoryStore::new().with_bars("600000.SH", bars("600000.SH", &[10.0; 10]));
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let universe = Screener::new(&store).with_as_of(Some(as_of)).load(30, None).unwrap();
        let loaded = &universe.windows["600000.SH"];
        assert_eq!(loaded.len(), 5);
        assert!(loaded.iter().all(|b| b.date <= as_of));
    }

    #[test]
    fn repeated_universe_ids_load_once() {
        let store = InMemoryStore::new().with_bars("600001.SH", bars("600001.SH", &[10.0; 10]));
        let universe = Screener::new(&store)
            .with_universe(vec!["600001.SH".into(), "600001.SH".into()])
            .with_chunk_size(1)
            .load(30, None)
            .unwrap();
        assert_eq!(universe.ids, vec!["600001.SH".to_string()]);
        assert!(universe.failures.is_empty());
        assert_eq!(universe.windows.len(), 1);
    }
}
