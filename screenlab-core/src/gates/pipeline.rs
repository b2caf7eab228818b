//! Gate pipeline: ordered short-circuit AND over named gates, plus the
//! rejection histogram the orchestrator accumulates across a universe.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Evidence, Gate, GateInput, GateVerdict, RejectReason};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("gate pipeline has no gates")]
    Empty,
    #[error("duplicate gate name '{0}'")]
    DuplicateGate(String),
}

/// Which gate stopped an instrument, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub gate: String,
    /// Position of the gate in the pipeline.
    pub index: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Every gate passed; evidence merged in gate order.
    Pass(Evidence),
    Reject(Rejection),
}

impl PipelineOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, PipelineOutcome::Pass(_))
    }
}

pub struct GatePipeline {
    gates: Vec<Box<dyn Gate>>,
}

impl std::fmt::Debug for GatePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatePipeline")
            .field("gates", &self.gate_names())
            .finish()
    }
}

impl GatePipeline {
    pub fn new(gates: Vec<Box<dyn Gate>>) -> Result<Self, PipelineError> {
        if gates.is_empty() {
            return Err(PipelineError::Empty);
        }
        let mut seen = HashSet::new();
        for gate in &gates {
            if !seen.insert(gate.name().to_string()) {
                return Err(PipelineError::DuplicateGate(gate.name().to_string()));
            }
        }
        Ok(Self { gates })
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Every evidence key any gate in the pipeline can produce.
    pub fn evidence_keys(&self) -> BTreeSet<&'static str> {
        self.gates
            .iter()
            .flat_map(|g| g.evidence_keys().iter().copied())
            .collect()
    }

    /// Run the gates in order, stopping at the first rejection.
    pub fn evaluate(&self, input: &GateInput<'_>) -> PipelineOutcome {
        let mut evidence = Evidence::default();
        for (index, gate) in self.gates.iter().enumerate() {
            let eval = gate.evaluate(input);
            match eval.verdict {
                GateVerdict::Pass => evidence.merge(eval.evidence),
                GateVerdict::Reject(reason) => {
                    return PipelineOutcome::Reject(Rejection {
                        gate: gate.name().to_string(),
                        index,
                        reason,
                    })
                }
            }
        }
        PipelineOutcome::Pass(evidence)
    }
}

/// Rejection count for one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateTally {
    pub gate: String,
    pub rejected: usize,
    /// Of `rejected`, how many were due to undefined inputs.
    pub undefined_input: usize,
    /// Of `rejected`, how many were due to short history.
    pub insufficient_history: usize,
}

/// Per-gate rejection counts, in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionHistogram {
    tallies: Vec<GateTally>,
}

impl RejectionHistogram {
    /// Zeroed histogram with one slot per gate.
    pub fn for_pipeline(pipeline: &GatePipeline) -> Self {
        Self {
            tallies: pipeline
                .gate_names()
                .into_iter()
                .map(|gate| GateTally {
                    gate: gate.to_string(),
                    rejected: 0,
                    undefined_input: 0,
                    insufficient_history: 0,
                })
                .collect(),
        }
    }

    pub fn record(&mut self, rejection: &Rejection) {
        let Some(tally) = self.tallies.get_mut(rejection.index) else {
            return;
        };
        tally.rejected += 1;
        match rejection.reason {
            RejectReason::Threshold => {}
            RejectReason::UndefinedInput => tally.undefined_input += 1,
            RejectReason::InsufficientHistory => tally.insufficient_history += 1,
        }
    }

    pub fn get(&self, gate: &str) -> usize {
        self.tallies
            .iter()
            .find(|t| t.gate == gate)
            .map_or(0, |t| t.rejected)
    }

    pub fn total(&self) -> usize {
        self.tallies.iter().map(|t| t.rejected).sum()
    }

    pub fn tallies(&self) -> &[GateTally] {
        &self.tallies
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::gates::testing::{history, reference};
    use crate::gates::GateEvaluation;
    use crate::indicators::make_bars;

    struct Fixed {
        name: &'static str,
        pass: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Gate for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn evaluate(&self, _input: &GateInput<'_>) -> GateEvaluation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            GateEvaluation::check(self.pass).with_value(self.name, 1.0)
        }
    }

    fn fixed(name: &'static str, pass: bool, calls: &Arc<AtomicUsize>) -> Box<dyn Gate> {
        Box::new(Fixed {
            name,
            pass,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn short_circuits_on_first_failure() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let c = Arc::new(AtomicUsize::new(0));
        let pipeline = GatePipeline::new(vec![
            fixed("a", true, &a),
            fixed("b", false, &b),
            fixed("c", true, &c),
        ])
        .unwrap();

        let h = history(&make_bars(&[10.0]));
        let r = reference();
        let outcome = pipeline.evaluate(&GateInput::new(&r, &h).unwrap());

        assert_eq!(
            outcome,
            PipelineOutcome::Reject(Rejection {
                gate: "b".into(),
                index: 1,
                reason: RejectReason::Threshold,
            })
        );
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(c.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pass_merges_evidence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GatePipeline::new(vec![fixed("a", true, &calls), fixed("b", true, &calls)]).unwrap();
        let h = history(&make_bars(&[10.0]));
        let r = reference();
        match pipeline.evaluate(&GateInput::new(&r, &h).unwrap()) {
            PipelineOutcome::Pass(ev) => {
                assert_eq!(ev.value("a"), Some(1.0));
                assert_eq!(ev.value("b"), Some(1.0));
            }
            other => panic!("expected pass, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = GatePipeline::new(vec![fixed("a", true, &calls), fixed("a", true, &calls)]).unwrap_err();
        assert_eq!(err, PipelineError::DuplicateGate("a".into()));
        assert_eq!(GatePipeline::new(vec![]).unwrap_err(), PipelineError::Empty);
    }

    #[test]
    fn histogram_counts_by_gate_and_reason() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GatePipeline::new(vec![fixed("a", true, &calls), fixed("b", true, &calls)]).unwrap();
        let mut hist = RejectionHistogram::for_pipeline(&pipeline);
        hist.record(&Rejection {
            gate: "b".into(),
            index: 1,
            reason: RejectReason::UndefinedInput,
        });
        hist.record(&Rejection {
            gate: "b".into(),
            index: 1,
            reason: RejectReason::Threshold,
        });
        assert_eq!(hist.get("a"), 0);
        assert_eq!(hist.get("b"), 2);
        assert_eq!(hist.tallies()[1].undefined_input, 1);
        assert_eq!(hist.total(), 2);
    }
}
