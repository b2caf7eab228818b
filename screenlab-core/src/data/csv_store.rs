//! CSV directory store.
//!
//! Layout: `bars.csv` (required), `reference.csv` and `memberships.csv`
//! (optional). Column names accept the vendor aliases `ts_code`,
//! `trade_date`, `vol` and `pct_chg`; dates may be `YYYY-MM-DD` or `YYYYMMDD`.
//!
//! The directory is parsed once at `open`. A malformed row poisons only its
//! own instrument, which then loads as `DataError::Malformed`. Bad rows in
//! the optional files are skipped with a warning.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Bar, InstrumentRef};

use super::memory::InMemoryStore;
use super::store::{clip_window, DataError, DataStore, WindowMap};

pub const BARS_FILE: &str = "bars.csv";
pub const REFERENCE_FILE: &str = "reference.csv";
pub const MEMBERSHIPS_FILE: &str = "memberships.csv";

#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(alias = "ts_code")]
    instrument: String,
    #[serde(alias = "trade_date")]
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    pre_close: Option<f64>,
    #[serde(default, alias = "pct_chg")]
    pct_change: Option<f64>,
    #[serde(alias = "vol")]
    volume: f64,
    #[serde(default)]
    amount: Option<f64>,
}

impl BarRow {
    fn into_bar(self) -> Result<Bar, String> {
        let date = parse_date(&self.date).ok_or_else(|| format!("bad date '{}'", self.date))?;
        Ok(Bar {
            instrument: self.instrument,
            date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            pre_close: self.pre_close,
            pct_change: self.pct_change,
            volume: self.volume,
            amount: self.amount.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MembershipRow {
    #[serde(alias = "ts_code")]
    instrument: String,
    #[serde(alias = "theme", alias = "concept")]
    group: String,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
    bars: BTreeMap<String, Result<Vec<Bar>, DataError>>,
    reference: BTreeMap<String, InstrumentRef>,
    themes: BTreeMap<String, Vec<String>>,
}

impl CsvStore {
    /// Parse a CSV directory. Fails only when `bars.csv` is missing or
    /// unreadable as a whole.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DataError> {
        let dir = dir.into();
        let bars_path = dir.join(BARS_FILE);
        if !bars_path.exists() {
            return Err(DataError::Unavailable(format!(
                "{} not found",
                bars_path.display()
            )));
        }

        let bars = read_bars(&bars_path)?;
        let reference = read_reference(&dir.join(REFERENCE_FILE))?;
        let themes = read_memberships(&dir.join(MEMBERSHIPS_FILE))?;
        debug!(
            dir = %dir.display(),
            instruments = bars.len(),
            reference = reference.len(),
            "opened csv store"
        );
        Ok(Self {
            dir,
            bars,
            reference,
            themes,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an in-memory store out in the layout `open` reads.
    pub fn save(store: &InMemoryStore, dir: &Path) -> Result<(), DataError> {
        fs::create_dir_all(dir)?;

        let mut wtr = csv::Writer::from_path(dir.join(BARS_FILE))?;
        for bars in store.bars().values() {
            for bar in bars {
                wtr.serialize(bar)?;
            }
        }
        wtr.flush()?;

        let mut wtr = csv::Writer::from_path(dir.join(REFERENCE_FILE))?;
        for reference in store.reference().values() {
            wtr.serialize(reference)?;
        }
        wtr.flush()?;

        let mut wtr = csv::Writer::from_path(dir.join(MEMBERSHIPS_FILE))?;
        for (instrument, groups) in store.themes() {
            for group in groups {
                wtr.serialize(MembershipRow {
                    instrument: instrument.clone(),
                    group: group.clone(),
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

fn reader(path: &Path) -> Result<csv::Reader<fs::File>, DataError> {
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?)
}

fn read_bars(path: &Path) -> Result<BTreeMap<String, Result<Vec<Bar>, DataError>>, DataError> {
    let mut rdr = reader(path)?;
    let headers = rdr.byte_headers()?.clone();
    let id_col = headers
        .iter()
        .position(|h| h == b"instrument" || h == b"ts_code")
        .ok_or_else(|| DataError::Csv(format!("{}: no instrument column", path.display())))?;

    let mut out: BTreeMap<String, Result<Vec<Bar>, DataError>> = BTreeMap::new();
    for (line, record) in rdr.byte_records().enumerate() {
        let row = line + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(path = %path.display(), row, error = %e, "skipping unreadable csv row");
                continue;
            }
        };
        let Some(instrument) = record
            .get(id_col)
            .and_then(|f| std::str::from_utf8(f).ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
        else {
            warn!(path = %path.display(), row, "skipping csv row without instrument");
            continue;
        };
        let parsed = if record.len() != headers.len() {
            Err(format!(
                "found {} fields, header has {}",
                record.len(),
                headers.len()
            ))
        } else {
            record
                .deserialize::<BarRow>(Some(&headers))
                .map_err(|e| e.to_string())
                .and_then(BarRow::into_bar)
        };

        let entry = out.entry(instrument.clone()).or_insert_with(|| Ok(Vec::new()));
        match parsed {
            Ok(bar) => {
                if let Ok(bars) = entry {
                    bars.push(bar);
                }
            }
            Err(detail) if entry.is_ok() => {
                warn!(instrument = %instrument, row, %detail, "malformed csv row");
                *entry = Err(DataError::Malformed {
                    instrument,
                    detail: format!("row {row}: {detail}"),
                });
            }
            Err(_) => {}
        }
    }

    for bars in out.values_mut().flatten() {
        bars.sort_by_key(|b| b.date);
    }
    Ok(out)
}

fn read_reference(path: &Path) -> Result<BTreeMap<String, InstrumentRef>, DataError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let mut rdr = reader(path)?;
    let mut out = BTreeMap::new();
    for (line, row) in rdr.deserialize::<InstrumentRef>().enumerate() {
        match row {
            Ok(row) => {
                out.insert(row.id.clone(), row);
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => warn!(path = %path.display(), row = line + 2, error = %e, "skipping reference row"),
        }
    }
    Ok(out)
}

fn read_memberships(path: &Path) -> Result<BTreeMap<String, Vec<String>>, DataError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let mut rdr = reader(path)?;
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (line, row) in rdr.deserialize::<MembershipRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(path = %path.display(), row = line + 2, error = %e, "skipping membership row");
                continue;
            }
        };
        let groups = out.entry(row.instrument).or_default();
        if !groups.contains(&row.group) {
            groups.push(row.group);
        }
    }
    Ok(out)
}

impl DataStore for CsvStore {
    fn name(&self) -> &str {
        "csv"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        Ok(self.bars.keys().cloned().collect())
    }

    fn latest_date(&self) -> Result<Option<NaiveDate>, DataError> {
        Ok(self
            .bars
            .values()
            .flatten()
            .filter_map(|bars| bars.last().map(|b| b.date))
            .max())
    }

    fn get_window(
        &self,
        ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WindowMap, DataError> {
        Ok(ids
            .iter()
            .map(|id| {
                let window = match self.bars.get(id) {
                    Some(Ok(bars)) => Ok(clip_window(bars, start, end)),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(DataError::NotFound {
                        instrument: id.clone(),
                    }),
                };
                (id.clone(), window)
            })
            .collect())
    }

    fn get_reference(&self, ids: &[String]) -> Result<BTreeMap<String, InstrumentRef>, DataError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.reference.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    fn get_group_memberships(
        &self,
        ids: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, DataError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.themes.get(id).map(|t| (id.clone(), t.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn vendor_columns_and_compact_dates_parse() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(BARS_FILE),
            "ts_code,trade_date,open,high,low,close,pre_close,pct_chg,vol,amount\n\
             600000.SH,20240103,10.1,10.5,10.0,10.4,10.0,4.0,12000,125000\n\
             600000.SH,20240102,9.9,10.1,9.8,10.0,9.9,1.01,10000,100000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(REFERENCE_FILE),
            "id,name,industry,area\n600000.SH,Pudong Bank,Banking,Shanghai\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(MEMBERSHIPS_FILE),
            "ts_code,concept\n600000.SH,Fintech\n",
        )
        .unwrap();

        let store = CsvStore::open(dir.path()).unwrap();
        let ids = store.instruments().unwrap();
        assert_eq!(ids, vec!["600000.SH".to_string()]);

        let windows = store.get_window(&ids, d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let bars = windows["600000.SH"].as_ref().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2024, 1, 2));
        assert_eq!(bars[1].pct_change, Some(4.0));
        assert_eq!(store.latest_date().unwrap(), Some(d(2024, 1, 3)));

        let reference = store.get_reference(&ids).unwrap();
        assert_eq!(reference["600000.SH"].known_industry(), Some("Banking"));
        assert_eq!(
            store.get_group_memberships(&ids).unwrap()["600000.SH"],
            vec!["Fintech".to_string()]
        );
    }

    #[test]
    fn malformed_row_fails_only_its_instrument() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(BARS_FILE),
            "instrument,date,open,high,low,close,volume\n\
             A,2024-01-02,1,2,0.5,1.5,100\n\
             B,2024-01-02,1,2,0.5,oops,100\n\
             B,2024-01-03,1,2,0.5,1.5,100\n",
        )
        .unwrap();

        let store = CsvStore::open(dir.path()).unwrap();
        let windows = store
            .get_window(&["A".into(), "B".into()], d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(windows["A"].as_ref().unwrap().len(), 1);
        assert!(matches!(windows["B"], Err(DataError::Malformed { .. })));
    }

    #[test]
    fn ragged_and_non_utf8_rows_stay_local() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = b"instrument,date,open,high,low,close,volume,amount\n".to_vec();
        for day in 2..=9 {
            body.extend(format!("A,2024-01-0{day},1,2,0.5,1.5,100,150\n").into_bytes());
            body.extend(format!("C,2024-01-0{day},1,2,0.5,1.5,100,150\n").into_bytes());
        }
        body.extend(b"B,2024-01-02,1,2,0.5,1.5,100,150\n");
        body.extend(b"B,2024-01-03,1,2,0.5,1.5,100,150,extra\n");
        body.extend(b"C,2024-01-10,1,2,0.5,1.5,\xff\xfe,150\n");
        fs::write(dir.path().join(BARS_FILE), body).unwrap();
        fs::write(
            dir.path().join(REFERENCE_FILE),
            "id,name,industry,area\nA,Alpha,Banking,Shanghai\nB,Beta,Banking,Shanghai,oops,more\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(MEMBERSHIPS_FILE),
            "instrument,group\nA,Fintech\nB\n",
        )
        .unwrap();

        let store = CsvStore::open(dir.path()).unwrap();
        let ids: Vec<String> = vec!["A".into(), "B".into(), "C".into()];
        let windows = store.get_window(&ids, d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert_eq!(windows["A"].as_ref().unwrap().len(), 8);
        assert!(matches!(windows["B"], Err(DataError::Malformed { .. })));
        assert!(matches!(windows["C"], Err(DataError::Malformed { .. })));

        let reference = store.get_reference(&ids).unwrap();
        assert!(reference.contains_key("A"));
        let themes = store.get_group_memberships(&ids).unwrap();
        assert_eq!(themes["A"], vec!["Fintech".to_string()]);
        assert!(!themes.contains_key("B"));
    }

    #[test]
    fn missing_bars_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CsvStore::open(dir.path()),
            Err(DataError::Unavailable(_))
        ));
    }

    #[test]
    fn save_then_open_preserves_bars() {
        let mut mem = InMemoryStore::new().with_bars("TEST", make_bars(&[10.0, 11.0, 12.0]));
        mem.insert_reference(InstrumentRef::bare("TEST"));
        mem.add_theme("TEST", "AI");

        let dir = tempfile::tempdir().unwrap();
        CsvStore::save(&mem, dir.path()).unwrap();
        let store = CsvStore::open(dir.path()).unwrap();

        let windows = store
            .get_window(&["TEST".into()], d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert_eq!(windows["TEST"].as_ref().unwrap(), &make_bars(&[10.0, 11.0, 12.0]));
        assert!(store.get_reference(&["TEST".into()]).unwrap().contains_key("TEST"));
    }
}
