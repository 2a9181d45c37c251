/*!
A Configurable Program Analysis framework in the style of Chapter 16 of
[The Handbook of Model Checking](https://link.springer.com/book/10.1007/978-3-319-10575-8):
an abstract domain plus transfer, merge, stop, precision-adjustment and abort
operators, driven to a fixed point by a generic worklist solver.

A domain implements [`Cpa`] by supplying the per-edge transfer relation and
the domain ordering; the operator methods default to the standard `merge-sep`
/ `stop-sep` configuration and can be overridden per analysis. The solver,
[`Cpa::run_cpa`], is a default method so interprocedural wrappers can
re-enter it recursively on nested blocks.
*/
use crate::cfa::{Cfa, EdgeIndex};
use crate::error::AnalysisError;
use std::fmt::Debug;
use std::hash::Hash;

pub mod lattice;
pub mod reached;
pub mod state;

pub use reached::{ReachedSet, Waitlist, WaitlistOrder};
pub use state::LocationState;

pub trait Cpa {
    /// Instruction payload carried on ordinary CFA edges.
    type Instr;
    type State: LocationState;
    /// Abstraction-granularity knob. Compared structurally; `()` works for
    /// domains with a single precision.
    type Precision: Clone + Eq + Hash + Debug;

    fn cfa(&self) -> &Cfa<Self::Instr>;

    /// The transfer relation for a single edge. Call edges reach here only
    /// when a wrapper chose to treat the call as an opaque instruction, so
    /// intraprocedural domains must model that case conservatively.
    fn edge_successors(
        &mut self,
        state: &Self::State,
        edge: EdgeIndex,
        precision: &Self::Precision,
    ) -> Result<Vec<Self::State>, AnalysisError>;

    /// The transfer relation for a state: the union of `edge_successors`
    /// over every leaving edge of its location. Exit nodes have no leaving
    /// edges and therefore no successors.
    fn successors(
        &mut self,
        state: &Self::State,
        precision: &Self::Precision,
    ) -> Result<Vec<Self::State>, AnalysisError> {
        let edges = self.cfa().leaving_edges(state.location());
        let mut out = Vec::new();
        for edge in edges {
            out.extend(self.edge_successors(state, edge, precision)?);
        }
        Ok(out)
    }

    /// Domain order: is `lhs` at most as precise as (covered by) `rhs`?
    fn is_less_or_equal(&self, lhs: &Self::State, rhs: &Self::State) -> bool;

    /// Domain join: least upper bound of two states.
    fn join(&self, lhs: &Self::State, rhs: &Self::State) -> Self::State;

    /// Merge operator. Returns the widened replacement for `reached` when
    /// the two states should be combined, `None` to keep them separate.
    /// Default is `merge-sep`: never combine.
    fn merge(
        &self,
        _state: &Self::State,
        _reached: &Self::State,
        _precision: &Self::Precision,
    ) -> Result<Option<Self::State>, AnalysisError> {
        Ok(None)
    }

    /// Stop operator: is `state` already covered by the reached states at
    /// its location? Default is `stop-sep`: covered by any single one.
    fn stop<'a>(
        &self,
        state: &Self::State,
        reached: impl Iterator<Item = &'a Self::State>,
        _precision: &Self::Precision,
    ) -> Result<bool, AnalysisError>
    where
        Self::State: 'a,
    {
        let mut reached = reached;
        Ok(reached.any(|covering| self.is_less_or_equal(state, covering)))
    }

    /// Precision adjustment applied to every successor before merge and
    /// stop. Default is the identity.
    fn prec(
        &self,
        state: Self::State,
        _precision: &Self::Precision,
        _reached: &ReachedSet<Self::State>,
    ) -> Result<Self::State, AnalysisError> {
        Ok(state)
    }

    /// Abort operator, polled once per popped state. Returning `true` ends
    /// the solver pass early, leaving the remaining work on the waitlist.
    fn should_abort(&self, _state: &Self::State) -> bool {
        false
    }

    /// The worklist fixed-point solver. Drains `waitlist`, applying the
    /// transfer relation and the merge/stop/precision operators until no
    /// pending state produces a new, non-covered successor.
    ///
    /// Implementors should not need to customize this method.
    fn run_cpa(
        &mut self,
        reached: &mut ReachedSet<Self::State>,
        waitlist: &mut Waitlist<Self::State>,
        precision: &Self::Precision,
    ) -> Result<(), AnalysisError> {
        while let Some(state) = waitlist.pop() {
            if self.should_abort(&state) {
                tracing::debug!("abort operator stopped the solver pass");
                break;
            }
            for successor in self.successors(&state, precision)? {
                let successor = self.prec(successor, precision, reached)?;
                let location = successor.location();
                for idx in reached.indices_at(location) {
                    if let Some(merged) = self.merge(&successor, reached.get(idx), precision)? {
                        if &merged != reached.get(idx) {
                            reached.replace(idx, merged.clone());
                            waitlist.push(merged);
                        }
                    }
                }
                if !self.stop(&successor, reached.states_at(location), precision)? {
                    waitlist.push(successor.clone());
                    reached.push(successor);
                }
            }
        }
        Ok(())
    }
}
