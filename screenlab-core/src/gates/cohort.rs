//! Cohort gate: the instrument belongs to a currently strong group.

use serde::{Deserialize, Serialize};

use super::{Gate, GateEvaluation, GateInput, RejectReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrongCohortParams {
    /// Fraction of ranked groups that count as strong.
    pub top_fraction: f64,
}

impl Default for StrongCohortParams {
    fn default() -> Self {
        Self { top_fraction: 0.3 }
    }
}

/// Passes when the run's cohort table places one of the instrument's groups
/// in the top `top_fraction`. Without a cohort table the input is undefined.
#[derive(Debug, Clone)]
pub struct StrongCohort {
    params: StrongCohortParams,
}

impl StrongCohort {
    pub fn new(params: StrongCohortParams) -> Self {
        Self { params }
    }
}

impl Gate for StrongCohort {
    fn name(&self) -> &str {
        "strong_cohort"
    }

    fn evidence_keys(&self) -> &'static [&'static str] {
        &[
            "cohort_rank",
            "cohort_total",
            "cohort_rank_fraction",
            "cohort_avg_change_pct",
            "cohort_strength",
            "cohort_group",
        ]
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateEvaluation {
        let Some(table) = input.cohorts else {
            return GateEvaluation::reject(RejectReason::UndefinedInput);
        };
        match table.membership_strength(&input.instrument.id, self.params.top_fraction) {
            Some(m) => GateEvaluation::pass()
                .with_value("cohort_rank", m.rank as f64)
                .with_value("cohort_total", m.total as f64)
                .with_value("cohort_rank_fraction", m.rank_fraction())
                .with_value("cohort_avg_change_pct", m.avg_change_pct)
                .with_value("cohort_strength", m.strength)
                .with_label("cohort_group", m.group.to_string())
                .with_cohort(m),
            None => GateEvaluation::reject(RejectReason::Threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cohort::{CohortRanker, GroupKey, Memberships};
    use crate::domain::InstrumentRef;
    use crate::gates::testing::history;
    use crate::gates::GateVerdict;
    use crate::indicators::make_bars;

    fn table() -> crate::cohort::CohortTable {
        let mut obs = BTreeMap::new();
        let mut members = Memberships::new();
        for (g, change) in [("hot", 5.0), ("warm", 2.0), ("cool", 0.0), ("cold", -1.0)] {
            for i in 0..5 {
                let id = format!("{g}{i}");
                obs.insert(id.clone(), change);
                members.insert(id, GroupKey::theme(g));
            }
        }
        CohortRanker::default().rank_observations(&obs, members)
    }

    #[test]
    fn member_of_top_group_passes() {
        let t = table();
        let h = history(&make_bars(&[10.0]));
        let r = InstrumentRef::bare("hot0");
        let eval = StrongCohort::new(StrongCohortParams::default())
            .evaluate(&GateInput::new(&r, &h).unwrap().with_cohorts(Some(&t)));
        assert!(eval.is_passed());
        assert_eq!(eval.evidence.value("cohort_rank"), Some(1.0));
        assert_eq!(eval.evidence.label("cohort_group"), Some("theme:hot"));
        assert!(eval.evidence.cohort.is_some());
    }

    #[test]
    fn weak_group_rejects() {
        let t = table();
        let h = history(&make_bars(&[10.0]));
        let r = InstrumentRef::bare("cold0");
        let eval = StrongCohort::new(StrongCohortParams::default())
            .evaluate(&GateInput::new(&r, &h).unwrap().with_cohorts(Some(&t)));
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::Threshold));
    }

    #[test]
    fn missing_table_is_undefined() {
        let h = history(&make_bars(&[10.0]));
        let r = InstrumentRef::bare("hot0");
        let eval = StrongCohort::new(StrongCohortParams::default()).evaluate(&GateInput::new(&r, &h).unwrap());
        assert_eq!(eval.verdict, GateVerdict::Reject(RejectReason::UndefinedInput));
    }
}
