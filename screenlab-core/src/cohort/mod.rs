//! Cohort strength ranking.
//!
//! Groups (industries and themes) are ranked by the mean recent change of
//! their members plus a breadth bonus proportional to member count. The
//! ranking is computed once per screening run into a `CohortTable` that is
//! never mutated afterwards and is shared read-only by every gate evaluation.

pub mod membership;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::engine::Snapshot;

pub use membership::{GroupKey, GroupKind, Memberships};

/// Minimum size and breadth scaling for one kind of group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindRule {
    pub min_members: usize,
    /// Member count is divided by this before weighting.
    pub breadth_divisor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub industry: KindRule,
    pub theme: KindRule,
    /// strength = mean change + breadth_weight * members / breadth_divisor
    pub breadth_weight: f64,
    /// Number of most recent bars whose day changes are averaged per member.
    pub window: usize,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            industry: KindRule {
                min_members: 5,
                breadth_divisor: 100.0,
            },
            theme: KindRule {
                min_members: 3,
                breadth_divisor: 50.0,
            },
            breadth_weight: 2.0,
            window: 1,
        }
    }
}

impl CohortConfig {
    pub fn rule(&self, kind: GroupKind) -> &KindRule {
        match kind {
            GroupKind::Industry => &self.industry,
            GroupKind::Theme => &self.theme,
        }
    }
}

/// One ranked group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortEntry {
    pub group: GroupKey,
    pub members: usize,
    pub avg_change_pct: f64,
    pub strength: f64,
    /// 1 = strongest.
    pub rank: usize,
}

/// An instrument's standing through one of its groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMembership {
    pub group: GroupKey,
    pub rank: usize,
    pub total: usize,
    pub avg_change_pct: f64,
    pub strength: f64,
}

impl CohortMembership {
    pub fn rank_fraction(&self) -> f64 {
        self.rank as f64 / self.total as f64
    }
}

/// Frozen result of one ranking pass.
#[derive(Debug, Clone, Default)]
pub struct CohortTable {
    entries: Vec<CohortEntry>,
    index: HashMap<GroupKey, usize>,
    memberships: Memberships,
}

impl CohortTable {
    /// Groups sorted by rank.
    pub fn entries(&self) -> &[CohortEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, group: &GroupKey) -> Option<&CohortEntry> {
        self.index.get(group).map(|&i| &self.entries[i])
    }

    pub fn top(&self, n: usize) -> &[CohortEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Whether `rank` falls within the top `fraction` of ranked groups.
    pub fn is_top(&self, rank: usize, fraction: f64) -> bool {
        rank >= 1 && rank as f64 <= self.entries.len() as f64 * fraction
    }

    /// All ranked groups an instrument belongs to, best first.
    pub fn memberships_of(&self, instrument: &str) -> Vec<CohortMembership> {
        let total = self.entries.len();
        let mut out: Vec<CohortMembership> = self
            .memberships
            .groups_of(instrument)
            .filter_map(|g| self.get(g))
            .map(|e| CohortMembership {
                group: e.group.clone(),
                rank: e.rank,
                total,
                avg_change_pct: e.avg_change_pct,
                strength: e.strength,
            })
            .collect();
        out.sort_by_key(|m| m.rank);
        out
    }

    /// Best-ranked group of `instrument` inside the top `fraction`, if any.
    pub fn membership_strength(&self, instrument: &str, fraction: f64) -> Option<CohortMembership> {
        self.memberships_of(instrument)
            .into_iter()
            .find(|m| self.is_top(m.rank, fraction))
    }
}

/// Builds `CohortTable`s.
#[derive(Debug, Clone, Default)]
pub struct CohortRanker {
    config: CohortConfig,
}

impl CohortRanker {
    pub fn new(config: CohortConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CohortConfig {
        &self.config
    }

    /// Mean day change over the last `window` snapshots; `None` if any is undefined.
    pub fn observation(&self, history: &[Snapshot]) -> Option<f64> {
        let window = self.config.window.max(1);
        if history.len() < window {
            return None;
        }
        let tail = &history[history.len() - window..];
        let mut sum = 0.0;
        for snap in tail {
            sum += snap.change_pct().value()?;
        }
        Some(sum / window as f64)
    }

    /// Rank groups from per-instrument snapshot histories.
    pub fn rank(
        &self,
        histories: &BTreeMap<String, Vec<Snapshot>>,
        memberships: Memberships,
    ) -> CohortTable {
        let observations: BTreeMap<String, f64> = histories
            .iter()
            .filter_map(|(id, h)| self.observation(h).map(|o| (id.clone(), o)))
            .collect();
        self.rank_observations(&observations, memberships)
    }

    /// Rank groups from one observed change per instrument.
    pub fn rank_observations(
        &self,
        observations: &BTreeMap<String, f64>,
        memberships: Memberships,
    ) -> CohortTable {
        let mut sums: BTreeMap<&GroupKey, (f64, usize)> = BTreeMap::new();
        for (id, groups) in memberships.iter() {
            let Some(&obs) = observations.get(id) else {
                continue;
            };
            for group in groups {
                let slot = sums.entry(group).or_insert((0.0, 0));
                slot.0 += obs;
                slot.1 += 1;
            }
        }

        let mut entries: Vec<CohortEntry> = sums
            .into_iter()
            .filter_map(|(group, (sum, members))| {
                let rule = self.config.rule(group.kind);
                if members < rule.min_members || members == 0 {
                    return None;
                }
                let avg = sum / members as f64;
                let breadth = if rule.breadth_divisor > 0.0 {
                    self.config.breadth_weight * members as f64 / rule.breadth_divisor
                } else {
                    0.0
                };
                Some(CohortEntry {
                    group: group.clone(),
                    members,
                    avg_change_pct: avg,
                    strength: avg + breadth,
                    rank: 0,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then(b.members.cmp(&a.members))
                .then_with(|| a.group.cmp(&b.group))
        });

        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
            index.insert(entry.group.clone(), i);
        }

        CohortTable {
            entries,
            index,
            memberships,
        }
    }
}
