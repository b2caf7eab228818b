//! Instrument reference data and board classification.

use serde::{Deserialize, Serialize};

/// Industry label used by data vendors for "no classification".
pub const UNKNOWN_INDUSTRY: &str = "未知";

/// Static reference data for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

impl InstrumentRef {
    /// Reference with only an id, used when the store has no reference row.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Special-treatment instruments carry "ST" in their display name (`ST`, `*ST`).
    pub fn is_special_treatment(&self) -> bool {
        self.name.as_deref().is_some_and(|n| n.contains("ST")) || self.id.contains("ST")
    }

    /// Industry, if classified.
    pub fn known_industry(&self) -> Option<&str> {
        self.industry
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty() && *i != UNKNOWN_INDUSTRY && !i.eq_ignore_ascii_case("unknown"))
    }

    pub fn board(&self) -> Board {
        Board::of(&self.id)
    }
}

/// Listing board, derived from the instrument code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Board {
    Main,
    ChiNext,
    Star,
    Beijing,
    BShare,
}

impl Board {
    pub fn of(code: &str) -> Self {
        let code = code.trim();
        if code.starts_with("300") || code.starts_with("301") {
            Board::ChiNext
        } else if code.starts_with("688") || code.starts_with("689") {
            Board::Star
        } else if code.starts_with("830") || code.starts_with("430") || code.starts_with("87") {
            Board::Beijing
        } else if code.starts_with("200") || code.starts_with("900") {
            Board::BShare
        } else {
            Board::Main
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_from_prefix() {
        assert_eq!(Board::of("600519.SH"), Board::Main);
        assert_eq!(Board::of("000001.SZ"), Board::Main);
        assert_eq!(Board::of("300750.SZ"), Board::ChiNext);
        assert_eq!(Board::of("688981.SH"), Board::Star);
        assert_eq!(Board::of("830799.BJ"), Board::Beijing);
        assert_eq!(Board::of("900901.SH"), Board::BShare);
        assert_eq!(Board::of("X"), Board::Main);
    }

    #[test]
    fn special_treatment_from_name() {
        let mut r = InstrumentRef::bare("600001.SH");
        assert!(!r.is_special_treatment());
        r.name = Some("*ST Foo".into());
        assert!(r.is_special_treatment());
    }

    #[test]
    fn unknown_industry_is_unclassified() {
        let mut r = InstrumentRef::bare("600001.SH");
        assert_eq!(r.known_industry(), None);
        r.industry = Some(UNKNOWN_INDUSTRY.into());
        assert_eq!(r.known_industry(), None);
        r.industry = Some("Banks".into());
        assert_eq!(r.known_industry(), Some("Banks"));
    }
}
