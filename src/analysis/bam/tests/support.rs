//! A tiny counting domain for exercising the BAM engine: states carry a flat
//! lattice over `u32`, `Inc` edges add one, and opaque calls havoc the value
//! to `Top` (the "symbolic further call" result).
use crate::analysis::cpa::lattice::{FlatLattice, JoinSemiLattice};
use crate::analysis::cpa::state::LocationState;
use crate::analysis::cpa::{Cpa, ReachedSet, Waitlist};
use crate::cfa::{Cfa, CfaEdge, EdgeIndex, NodeIndex, Signature};
use crate::error::AnalysisError;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterOp {
    Nop,
    Inc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterState {
    pub location: NodeIndex,
    pub value: FlatLattice<u32>,
}

impl CounterState {
    pub fn new(location: NodeIndex, value: u32) -> Self {
        CounterState {
            location,
            value: FlatLattice::Value(value),
        }
    }
}

impl LocationState for CounterState {
    fn location(&self) -> NodeIndex {
        self.location
    }

    fn relocated(&self, location: NodeIndex) -> Self {
        CounterState {
            location,
            value: self.value,
        }
    }
}

pub struct CounterCpa {
    cfa: Cfa<CounterOp>,
}

impl CounterCpa {
    pub fn new(cfa: Cfa<CounterOp>) -> Self {
        CounterCpa { cfa }
    }
}

impl Cpa for CounterCpa {
    type Instr = CounterOp;
    type State = CounterState;
    type Precision = ();

    fn cfa(&self) -> &Cfa<CounterOp> {
        &self.cfa
    }

    fn edge_successors(
        &mut self,
        state: &CounterState,
        edge: EdgeIndex,
        _precision: &(),
    ) -> Result<Vec<CounterState>, AnalysisError> {
        let target = self.cfa.edge_target(edge);
        let value = match self.cfa.edge(edge) {
            CfaEdge::Call(_) => FlatLattice::Top,
            CfaEdge::Op(CounterOp::Nop) => state.value,
            CfaEdge::Op(CounterOp::Inc) => state.value.map(|v| v + 1),
        };
        Ok(vec![CounterState {
            location: target,
            value,
        }])
    }

    fn is_less_or_equal(&self, lhs: &CounterState, rhs: &CounterState) -> bool {
        lhs.location == rhs.location
            && matches!(
                lhs.value.partial_cmp(&rhs.value),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
    }

    fn join(&self, lhs: &CounterState, rhs: &CounterState) -> CounterState {
        let mut value = lhs.value;
        value.join(&rhs.value);
        CounterState {
            location: lhs.location,
            value,
        }
    }
}

pub fn sig(name: &str) -> Signature {
    Signature::new("Demo", name, "()V")
}

pub fn run_plain(
    cpa: &mut CounterCpa,
    initial: CounterState,
) -> ReachedSet<CounterState> {
    let mut reached = ReachedSet::new();
    let mut waitlist = Waitlist::default();
    reached.push(initial.clone());
    waitlist.push(initial);
    cpa.run_cpa(&mut reached, &mut waitlist, &()).unwrap();
    reached
}

pub fn values_at(reached: &ReachedSet<CounterState>, node: NodeIndex) -> Vec<FlatLattice<u32>> {
    reached.states_at(node).map(|s| s.value).collect()
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
