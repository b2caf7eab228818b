//! Run fingerprinting: BLAKE3 hashes identifying a screening configuration
//! and the exact data it ran on.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Hash of a canonical JSON serialization of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    /// Configs must serialize deterministically (ordered maps, no HashMap).
    pub fn of<T: Serialize>(config: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(config)?;
        Ok(Self(blake3::hash(&json).to_hex().to_string()))
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash over the as-of date and every bar an evaluation consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// Instruments must be fed in a stable order (e.g. from a `BTreeMap`).
    pub fn of<'a>(
        as_of: NaiveDate,
        instruments: impl IntoIterator<Item = (&'a str, &'a [Bar])>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(as_of.to_string().as_bytes());
        for (id, bars) in instruments {
            hasher.update(id.as_bytes());
            hasher.update(&(bars.len() as u64).to_le_bytes());
            for bar in bars {
                hash_bar(&mut hasher, bar);
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hash_bar(hasher: &mut blake3::Hasher, bar: &Bar) {
    hasher.update(bar.date.to_string().as_bytes());
    for v in [bar.open, bar.high, bar.low, bar.close, bar.volume, bar.amount] {
        hasher.update(&v.to_bits().to_le_bytes());
    }
    for v in [bar.pre_close, bar.pct_change] {
        match v {
            Some(v) => hasher.update(&v.to_bits().to_le_bytes()),
            None => hasher.update(&[0xff]),
        };
    }
}
