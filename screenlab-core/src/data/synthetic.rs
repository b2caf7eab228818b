//! Seeded synthetic universe for demos, benchmarks and tests.
//!
//! Each instrument draws from its own RNG, seeded by BLAKE3 over the master
//! seed and the instrument id, so the generated bars do not depend on
//! generation order or universe size.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, InstrumentRef};

use super::memory::InMemoryStore;

const INDUSTRIES: [&str; 8] = [
    "Semiconductors",
    "Software",
    "Banking",
    "Pharmaceuticals",
    "Autos",
    "Power Equipment",
    "Liquor",
    "Real Estate",
];

const THEMES: [&str; 5] = ["AI", "New Energy", "Robotics", "Low Altitude", "Dividend"];

/// Parameters for a generated universe.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticUniverse {
    pub seed: u64,
    pub instruments: usize,
    /// Trading days (weekdays) per instrument.
    pub days: usize,
    /// Last generated trading day.
    pub end: NaiveDate,
}

impl Default for SyntheticUniverse {
    fn default() -> Self {
        Self {
            seed: 42,
            instruments: 200,
            days: 120,
            end: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap_or_default(),
        }
    }
}

impl SyntheticUniverse {
    pub fn new(seed: u64, instruments: usize, days: usize) -> Self {
        Self {
            seed,
            instruments,
            days,
            ..Self::default()
        }
    }

    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = end;
        self
    }

    /// Deterministic sub-seed for one key (instrument id or industry).
    pub fn sub_seed(&self, key: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(key.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn rng_for(&self, key: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(key))
    }

    /// Instrument id for position `i`. Mostly main board, with a sprinkling
    /// of ChiNext and STAR codes.
    pub fn instrument_id(i: usize) -> String {
        match i % 10 {
            7 => format!("300{:03}.SZ", i),
            9 => format!("688{:03}.SH", i),
            n if n % 2 == 0 => format!("600{:03}.SH", i),
            _ => format!("000{:03}.SZ", i),
        }
    }

    pub fn trading_days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(self.days);
        let mut date = self.end;
        while days.len() < self.days {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(date);
            }
            match date.pred_opt() {
                Some(prev) => date = prev,
                None => break,
            }
        }
        days.reverse();
        days
    }

    pub fn build(&self) -> InMemoryStore {
        let dates = self.trading_days();
        let drifts: Vec<f64> = INDUSTRIES
            .iter()
            .map(|industry| self.rng_for(industry).gen_range(-0.004..0.006))
            .collect();

        let mut store = InMemoryStore::new();
        for i in 0..self.instruments {
            let id = Self::instrument_id(i);
            let mut rng = self.rng_for(&id);
            let industry_idx = rng.gen_range(0..INDUSTRIES.len());

            let name = if i % 23 == 5 {
                format!("ST Synth {i}")
            } else {
                format!("Synth {i}")
            };
            store.insert_reference(InstrumentRef {
                name: Some(name),
                industry: Some(INDUSTRIES[industry_idx].to_string()),
                area: None,
                ..InstrumentRef::bare(id.as_str())
            });

            for (t, theme) in THEMES.iter().enumerate() {
                if rng.gen_bool(0.15 + 0.05 * t as f64) {
                    store.add_theme(&id, theme);
                }
            }

            let bars = random_walk(&id, &dates, drifts[industry_idx], &mut rng);
            store.insert_bars(&id, bars);
        }
        store
    }
}

/// Daily random walk capped at the ±10 % price limit.
fn random_walk(id: &str, dates: &[NaiveDate], drift: f64, rng: &mut StdRng) -> Vec<Bar> {
    let mut close: f64 = rng.gen_range(4.0..60.0);
    let base_volume: f64 = rng.gen_range(2.0e5..5.0e6);
    let mut bars = Vec::with_capacity(dates.len());

    for &date in dates {
        let pre_close = close;
        let ret = (drift + rng.gen_range(-0.035..0.035)).clamp(-0.1, 0.1);
        let open = pre_close * (1.0 + rng.gen_range(-0.01..0.01));
        close = (pre_close * (1.0 + ret)).max(0.5);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.02));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.02));
        let volume = base_volume * rng.gen_range(0.5..1.8) * (1.0 + 8.0 * ret.abs());

        bars.push(Bar {
            instrument: id.to_string(),
            date,
            open,
            high,
            low,
            close,
            pre_close: Some(pre_close),
            pct_change: Some((close - pre_close) / pre_close * 100.0),
            volume,
            amount: volume * (open + close) / 2.0,
        });
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataStore;

    #[test]
    fn generation_is_deterministic() {
        let a = SyntheticUniverse::new(7, 20, 30).build();
        let b = SyntheticUniverse::new(7, 20, 30).build();
        assert_eq!(a.bars(), b.bars());
        assert_eq!(a.reference(), b.reference());
        assert_eq!(a.themes(), b.themes());
    }

    #[test]
    fn instrument_bars_independent_of_universe_size() {
        let small = SyntheticUniverse::new(7, 5, 30).build();
        let large = SyntheticUniverse::new(7, 50, 30).build();
        let id = SyntheticUniverse::instrument_id(3);
        assert_eq!(small.bars()[&id], large.bars()[&id]);
    }

    #[test]
    fn bars_are_sane_weekdays() {
        let store = SyntheticUniverse::new(1, 10, 40).build();
        assert_eq!(store.instruments().unwrap().len(), 10);
        for bars in store.bars().values() {
            assert_eq!(bars.len(), 40);
            assert!(bars.iter().all(Bar::is_sane));
            assert!(bars
                .iter()
                .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));
            assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        }
    }

    #[test]
    fn ids_cover_several_boards() {
        use crate::domain::Board;
        let boards: std::collections::BTreeSet<Board> = (0..10)
            .map(|i| Board::of(&SyntheticUniverse::instrument_id(i)))
            .collect();
        assert!(boards.contains(&Board::Main));
        assert!(boards.contains(&Board::ChiNext));
        assert!(boards.contains(&Board::Star));
    }
}
