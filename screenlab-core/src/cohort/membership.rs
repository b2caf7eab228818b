//! Group keys and the instrument → groups mapping.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::InstrumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Industry,
    Theme,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub kind: GroupKind,
    pub name: String,
}

impl GroupKey {
    pub fn new(kind: GroupKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn industry(name: impl Into<String>) -> Self {
        Self::new(GroupKind::Industry, name)
    }

    pub fn theme(name: impl Into<String>) -> Self {
        Self::new(GroupKind::Theme, name)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            GroupKind::Industry => "industry",
            GroupKind::Theme => "theme",
        };
        write!(f, "{kind}:{}", self.name)
    }
}

/// Which groups each instrument belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memberships {
    by_instrument: BTreeMap<String, BTreeSet<GroupKey>>,
}

impl Memberships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Industry groups from reference data plus thematic groups from the
    /// store's membership table. Unclassified industries are skipped.
    pub fn from_sources(
        reference: &BTreeMap<String, InstrumentRef>,
        themes: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let mut out = Self::new();
        for (id, r) in reference {
            if let Some(industry) = r.known_industry() {
                out.insert(id.clone(), GroupKey::industry(industry));
            }
        }
        for (id, groups) in themes {
            for name in groups.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
                out.insert(id.clone(), GroupKey::theme(name));
            }
        }
        out
    }

    pub fn insert(&mut self, instrument: String, group: GroupKey) {
        self.by_instrument.entry(instrument).or_default().insert(group);
    }

    pub fn groups_of(&self, instrument: &str) -> impl Iterator<Item = &GroupKey> {
        self.by_instrument.get(instrument).into_iter().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<GroupKey>)> {
        self.by_instrument.iter()
    }

    /// Number of instruments with at least one group.
    pub fn len(&self) -> usize {
        self.by_instrument.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_instrument.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_sources_merges_industry_and_themes() {
        let mut reference = BTreeMap::new();
        let mut r = InstrumentRef::bare("600000.SH");
        r.industry = Some("Banks".into());
        reference.insert(r.id.clone(), r);
        reference.insert("600001.SH".into(), InstrumentRef::bare("600001.SH"));

        let mut themes = BTreeMap::new();
        themes.insert("600000.SH".to_string(), vec!["Fintech".to_string(), " ".to_string()]);

        let m = Memberships::from_sources(&reference, &themes);
        let groups: Vec<_> = m.groups_of("600000.SH").cloned().collect();
        assert_eq!(groups, vec![GroupKey::industry("Banks"), GroupKey::theme("Fintech")]);
        assert_eq!(m.groups_of("600001.SH").count(), 0);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn display() {
        assert_eq!(GroupKey::theme("AI").to_string(), "theme:AI");
    }
}
