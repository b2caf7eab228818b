//! In-memory data store.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{Bar, InstrumentRef};

use super::store::{clip_window, DataError, DataStore, WindowMap};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    bars: BTreeMap<String, Vec<Bar>>,
    reference: BTreeMap<String, InstrumentRef>,
    themes: BTreeMap<String, Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace an instrument's bars. Stored sorted by date.
    pub fn insert_bars(&mut self, instrument: &str, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.date);
        self.bars.insert(instrument.to_string(), bars);
    }

    pub fn insert_reference(&mut self, reference: InstrumentRef) {
        self.reference.insert(reference.id.clone(), reference);
    }

    pub fn add_theme(&mut self, instrument: &str, theme: &str) {
        let themes = self.themes.entry(instrument.to_string()).or_default();
        if !themes.iter().any(|t| t == theme) {
            themes.push(theme.to_string());
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<Bar>) -> Self {
        self.insert_bars(instrument, bars);
        self
    }

    pub fn with_reference(mut self, reference: InstrumentRef) -> Self {
        self.insert_reference(reference);
        self
    }

    pub fn bars(&self) -> &BTreeMap<String, Vec<Bar>> {
        &self.bars
    }

    pub fn reference(&self) -> &BTreeMap<String, InstrumentRef> {
        &self.reference
    }

    pub fn themes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.themes
    }

    /// Copy everything a store holds for `[start, end]` into memory.
    pub fn load_from(store: &dyn DataStore, start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        let ids = store.instruments()?;
        let mut out = Self::new();
        for (id, window) in store.get_window(&ids, start, end)? {
            out.insert_bars(&id, window?);
        }
        out.reference = store.get_reference(&ids)?;
        out.themes = store.get_group_memberships(&ids)?;
        Ok(out)
    }
}

impl DataStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        Ok(self.bars.keys().cloned().collect())
    }

    fn latest_date(&self) -> Result<Option<NaiveDate>, DataError> {
        Ok(self.bars.values().filter_map(|b| b.last().map(|b| b.date)).max())
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
                    Some(bars) => Ok(clip_window(bars, start, end)),
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

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn window_is_clipped_and_missing_is_not_found() {
        let store = InMemoryStore::new().with_bars("TEST", make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        // make_bars starts at 2024-01-02
        let windows = store
            .get_window(&["TEST".into(), "NOPE".into()], d(3), d(5))
            .unwrap();
        let bars = windows["TEST"].as_ref().unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(3));
        assert!(matches!(windows["NOPE"], Err(DataError::NotFound { .. })));
        assert_eq!(store.latest_date().unwrap(), Some(d(6)));
    }

    #[test]
    fn themes_deduplicate() {
        let mut store = InMemoryStore::new();
        store.add_theme("A", "AI");
        store.add_theme("A", "AI");
        store.add_theme("A", "Chips");
        let m = store.get_group_memberships(&["A".into()]).unwrap();
        assert_eq!(m["A"], vec!["AI".to_string(), "Chips".to_string()]);
    }
}
