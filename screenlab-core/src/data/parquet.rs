//! Parquet-backed bar store with per-instrument year partitions.
//!
//! Layout:
//! - `{root}/bars/instrument={ID}/{year}.parquet`
//! - `{root}/bars/instrument={ID}/meta.json`
//! - `{root}/reference.json`, `{root}/memberships.json`
//!
//! Writes go to a `.tmp` file and are renamed into place. Corrupt partitions
//! are quarantined on load and reported as a per-instrument failure.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Bar, InstrumentRef};

use super::store::{clip_window, DataError, DataStore, WindowMap};

/// Days between 0001-01-01 and 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const BAR_COLUMNS: [&str; 9] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "pre_close",
    "pct_change",
    "volume",
    "amount",
];

/// Sidecar describing one instrument's stored bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub instrument: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
}

#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bars_dir(&self) -> PathBuf {
        self.root.join("bars")
    }

    fn instrument_dir(&self, instrument: &str) -> PathBuf {
        self.bars_dir().join(format!("instrument={instrument}"))
    }

    fn year_path(&self, instrument: &str, year: i32) -> PathBuf {
        self.instrument_dir(instrument).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, instrument: &str) -> PathBuf {
        self.instrument_dir(instrument).join("meta.json")
    }

    fn reference_path(&self) -> PathBuf {
        self.root.join("reference.json")
    }

    fn memberships_path(&self) -> PathBuf {
        self.root.join("memberships.json")
    }

    /// Write an instrument's bars, one file per calendar year.
    ///
    /// Year files not covered by `bars` are removed, so the partitions always
    /// match the sidecar hash.
    pub fn write_bars(&self, instrument: &str, bars: &[Bar]) -> Result<PartitionMeta, DataError> {
        let mut bars = bars.to_vec();
        bars.sort_by_key(|b| b.date);
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(DataError::Validation(format!(
                    "no bars to write for '{instrument}'"
                )))
            }
        };

        fs::create_dir_all(self.instrument_dir(instrument))?;

        let mut by_year: HashMap<i32, Vec<&Bar>> = HashMap::new();
        for bar in &bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for entry in fs::read_dir(self.instrument_dir(instrument))? {
            let path = entry?.path();
            let stale = path.extension().and_then(|e| e.to_str()) == Some("parquet")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<i32>().ok())
                    .is_some_and(|year| !by_year.contains_key(&year));
            if stale {
                fs::remove_file(&path)?;
            }
        }

        for (year, year_bars) in &by_year {
            let df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(instrument, *year);
            let tmp_path = path.with_extension("parquet.tmp");
            write_parquet(&df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::Io(format!("atomic rename failed: {e}"))
            })?;
        }

        let meta = PartitionMeta {
            instrument: instrument.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: bars.len(),
            data_hash: bars_hash(&bars)?,
        };
        fs::write(self.meta_path(instrument), serde_json::to_string_pretty(&meta)?)?;
        debug!(instrument, bars = bars.len(), "wrote parquet partitions");
        Ok(meta)
    }

    pub fn write_reference(&self, reference: &BTreeMap<String, InstrumentRef>) -> Result<(), DataError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.reference_path(), serde_json::to_string_pretty(reference)?)?;
        Ok(())
    }

    pub fn write_memberships(&self, themes: &BTreeMap<String, Vec<String>>) -> Result<(), DataError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.memberships_path(), serde_json::to_string_pretty(themes)?)?;
        Ok(())
    }

    pub fn meta(&self, instrument: &str) -> Option<PartitionMeta> {
        let content = fs::read_to_string(self.meta_path(instrument)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Load every stored bar for one instrument, sorted by date.
    pub fn load_bars(&self, instrument: &str) -> Result<Vec<Bar>, DataError> {
        let dir = self.instrument_dir(instrument);
        if !dir.exists() {
            return Err(DataError::NotFound {
                instrument: instrument.to_string(),
            });
        }

        let mut bars = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            match load_partition(instrument, &path) {
                Ok(part) => bars.extend(part),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "quarantining corrupt partition");
                    let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                    return Err(DataError::Malformed {
                        instrument: instrument.to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        if bars.is_empty() {
            return Err(DataError::NotFound {
                instrument: instrument.to_string(),
            });
        }
        bars.sort_by_key(|b| b.date);

        if let Some(meta) = self.meta(instrument) {
            if bars_hash(&bars)? != meta.data_hash {
                warn!(instrument, "partition hash does not match meta.json");
                return Err(DataError::Malformed {
                    instrument: instrument.to_string(),
                    detail: "partition hash mismatch".into(),
                });
            }
        }
        Ok(bars)
    }

    /// Copy a date range of another store into this one.
    ///
    /// Instruments that fail to load are skipped and returned with their error.
    pub fn import_from(
        &self,
        source: &dyn DataStore,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ImportSummary, DataError> {
        let ids = source.instruments()?;
        let mut summary = ImportSummary::default();
        for (id, window) in source.get_window(&ids, start, end)? {
            match window {
                Ok(bars) if bars.is_empty() => summary.skipped.push((id, "no bars in range".into())),
                Ok(bars) => {
                    let meta = self.write_bars(&id, &bars)?;
                    summary.bars += meta.bar_count;
                    summary.instruments += 1;
                }
                Err(e) => summary.skipped.push((id, e.to_string())),
            }
        }
        self.write_reference(&source.get_reference(&ids)?)?;
        self.write_memberships(&source.get_group_memberships(&ids)?)?;
        Ok(summary)
    }

    fn read_json<T: serde::de::DeserializeOwned + Default>(&self, path: &Path) -> Result<T, DataError> {
        if !path.exists() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Outcome of `ParquetStore::import_from`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub instruments: usize,
    pub bars: usize,
    pub skipped: Vec<(String, String)>,
}

impl DataStore for ParquetStore {
    fn name(&self) -> &str {
        "parquet"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        let dir = self.bars_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_prefix("instrument="))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn latest_date(&self) -> Result<Option<NaiveDate>, DataError> {
        let mut latest = None;
        for id in self.instruments()? {
            let end = match self.meta(&id) {
                Some(meta) => Some(meta.end_date),
                None => self.load_bars(&id).ok().and_then(|b| b.last().map(|b| b.date)),
            };
            latest = latest.max(end);
        }
        Ok(latest)
    }

    fn get_window(
        &self,
        ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WindowMap, DataError> {
        if !self.root.exists() {
            return Err(DataError::Unavailable(format!(
                "parquet root {} does not exist",
                self.root.display()
            )));
        }
        Ok(ids
            .iter()
            .map(|id| {
                let window = self.load_bars(id).map(|bars| clip_window(&bars, start, end));
                (id.clone(), window)
            })
            .collect())
    }

    fn get_reference(&self, ids: &[String]) -> Result<BTreeMap<String, InstrumentRef>, DataError> {
        let mut all: BTreeMap<String, InstrumentRef> = self.read_json(&self.reference_path())?;
        all.retain(|id, _| ids.contains(id));
        Ok(all)
    }

    fn get_group_memberships(
        &self,
        ids: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, DataError> {
        let mut all: BTreeMap<String, Vec<String>> = self.read_json(&self.memberships_path())?;
        all.retain(|id, _| ids.contains(id));
        Ok(all)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn parquet_err(context: &str) -> impl Fn(PolarsError) -> DataError + '_ {
    move |e| DataError::Parquet(format!("{context}: {e}"))
}

fn bars_to_dataframe(bars: &[&Bar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| b.date.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let pre_closes: Vec<Option<f64>> = bars.iter().map(|b| b.pre_close).collect();
    let pct_changes: Vec<Option<f64>> = bars.iter().map(|b| b.pct_change).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let amounts: Vec<f64> = bars.iter().map(|b| b.amount).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(parquet_err("date cast"))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("pre_close".into(), pre_closes),
        Column::new("pct_change".into(), pct_changes),
        Column::new("volume".into(), volumes),
        Column::new("amount".into(), amounts),
    ])
    .map_err(parquet_err("dataframe creation"))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(parquet_err("write parquet"))?;
    Ok(())
}

fn bars_hash(bars: &[Bar]) -> Result<String, DataError> {
    Ok(blake3::hash(&serde_json::to_vec(bars)?).to_hex().to_string())
}

fn load_partition(instrument: &str, path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(parquet_err("read parquet"))?;

    if df.height() == 0 {
        return Err(DataError::Validation("empty parquet partition".into()));
    }
    for name in BAR_COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::Validation(format!("missing column '{name}'")));
        }
    }
    dataframe_to_bars(instrument, &df)
}

fn dataframe_to_bars(instrument: &str, df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let col = |name: &str| df.column(name).map_err(parquet_err("column read"));
    let dates = col("date")?.date().map_err(parquet_err("date column type"))?;
    let opens = col("open")?.f64().map_err(parquet_err("open column type"))?;
    let highs = col("high")?.f64().map_err(parquet_err("high column type"))?;
    let lows = col("low")?.f64().map_err(parquet_err("low column type"))?;
    let closes = col("close")?.f64().map_err(parquet_err("close column type"))?;
    let pre_closes = col("pre_close")?.f64().map_err(parquet_err("pre_close column type"))?;
    let pct_changes = col("pct_change")?
        .f64()
        .map_err(parquet_err("pct_change column type"))?;
    let volumes = col("volume")?.f64().map_err(parquet_err("volume column type"))?;
    let amounts = col("amount")?.f64().map_err(parquet_err("amount column type"))?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let date = dates
            .get(i)
            .and_then(|days| NaiveDate::from_num_days_from_ce_opt(EPOCH_DAYS_FROM_CE + days))
            .ok_or_else(|| DataError::Malformed {
                instrument: instrument.to_string(),
                detail: format!("null or invalid date at row {i}"),
            })?;
        bars.push(Bar {
            instrument: instrument.to_string(),
            date,
            open: opens.get(i).unwrap_or(f64::NAN),
            high: highs.get(i).unwrap_or(f64::NAN),
            low: lows.get(i).unwrap_or(f64::NAN),
            close: closes.get(i).unwrap_or(f64::NAN),
            pre_close: pre_closes.get(i),
            pct_change: pct_changes.get(i),
            volume: volumes.get(i).unwrap_or(f64::NAN),
            amount: amounts.get(i).unwrap_or(0.0),
        });
    }
    Ok(bars)
}
