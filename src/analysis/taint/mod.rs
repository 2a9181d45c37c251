/*!
A small taint-tracking domain, included as the worked example of plugging an
intraprocedural analysis into the framework. Variables live in one flat
namespace, so wrapping [`TaintCpa`] in a
[`BamCpa`](crate::analysis::bam::BamCpa) with the default no-op
reduce/expand/rebuild operators already yields a sound interprocedural taint
analysis.
*/
use crate::analysis::cpa::Cpa;
use crate::analysis::cpa::state::LocationState;
use crate::cfa::{Cfa, CfaEdge, EdgeIndex, Signature};
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

mod state;

pub use state::TaintState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintOp {
    Nop,
    /// `dst` becomes tainted iff `src` currently is (strong update).
    Assign { dst: String, src: String },
    /// `dst` receives attacker-controlled data.
    Source { dst: String },
    /// Reading `var` here is a policy violation if it may be tainted.
    Sink { var: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaintFinding {
    pub function: Signature,
    pub offset: u32,
    pub var: String,
}

pub struct TaintCpa {
    cfa: Cfa<TaintOp>,
    findings: Vec<TaintFinding>,
}

impl TaintCpa {
    pub fn new(cfa: Cfa<TaintOp>) -> Self {
        TaintCpa {
            cfa,
            findings: Vec::new(),
        }
    }

    /// Sink violations observed so far, in discovery order, deduplicated.
    pub fn findings(&self) -> &[TaintFinding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<TaintFinding> {
        self.findings
    }
}

impl Cpa for TaintCpa {
    type Instr = TaintOp;
    type State = TaintState;
    type Precision = ();

    fn cfa(&self) -> &Cfa<TaintOp> {
        &self.cfa
    }

    fn edge_successors(
        &mut self,
        state: &TaintState,
        edge: EdgeIndex,
        _precision: &(),
    ) -> Result<Vec<TaintState>, AnalysisError> {
        let target = self.cfa.edge_target(edge);
        let op = match self.cfa.edge(edge) {
            // An opaque call: nothing this domain tracks escapes through it.
            CfaEdge::Call(_) => return Ok(vec![state.relocated(target)]),
            CfaEdge::Op(op) => op.clone(),
        };
        let mut next = state.relocated(target);
        match op {
            TaintOp::Nop => {}
            TaintOp::Assign { dst, src } => {
                if state.is_tainted(&src) {
                    next.taint(&dst);
                } else {
                    next.untaint(&dst);
                }
            }
            TaintOp::Source { dst } => next.taint(&dst),
            TaintOp::Sink { var } => {
                if state.is_tainted(&var) {
                    let site = self.cfa.node(self.cfa.edge_source(edge));
                    let finding = TaintFinding {
                        function: site.signature,
                        offset: site.offset,
                        var,
                    };
                    if !self.findings.contains(&finding) {
                        tracing::debug!(function = %finding.function, offset = finding.offset, var = %finding.var, "tainted sink");
                        self.findings.push(finding);
                    }
                }
            }
        }
        Ok(vec![next])
    }

    fn is_less_or_equal(&self, lhs: &TaintState, rhs: &TaintState) -> bool {
        lhs.location() == rhs.location() && lhs.is_subset_of(rhs)
    }

    fn join(&self, lhs: &TaintState, rhs: &TaintState) -> TaintState {
        lhs.union(rhs)
    }
}
