use crate::analysis::cpa::state::LocationState;
use crate::cfa::{Call, NodeIndex};

/// Translates a caller state into the callee's abstraction level at a call
/// boundary, discarding caller-only information the callee cannot observe.
pub trait ReduceOperator<S: LocationState> {
    fn reduce(&self, caller_state: &S, callee_entry: NodeIndex, call: &Call) -> S;

    /// Reduction for the top-level main invocation, where there is no call.
    /// Default: pin the state to the entry node unchanged.
    fn reduce_entry(&self, state: &S, entry: NodeIndex) -> S {
        state.relocated(entry)
    }
}

/// Reinstates the caller-only information discarded by the matching
/// [`ReduceOperator`], merged with the callee's effect. The engine relocates
/// the result to the return site afterwards, so implementations only deal
/// with domain payloads.
pub trait ExpandOperator<S: LocationState> {
    fn expand(&self, caller_before: &S, callee_exit: &S, callee_entry: NodeIndex, call: &Call) -> S;
}

/// Resolves identifier collisions (renaming) an expand may introduce.
pub trait RebuildOperator<S: LocationState> {
    fn rebuild(&self, caller_before: &S, expanded: &S) -> S;
}

/// Relocates the caller state to the callee entry, keeping the payload.
/// Suitable for domains whose state is visible across call boundaries
/// unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoOpReduce;

impl<S: LocationState> ReduceOperator<S> for NoOpReduce {
    fn reduce(&self, caller_state: &S, callee_entry: NodeIndex, _call: &Call) -> S {
        caller_state.relocated(callee_entry)
    }
}

/// Passes the callee exit state through unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoOpExpand;

impl<S: LocationState> ExpandOperator<S> for NoOpExpand {
    fn expand(
        &self,
        _caller_before: &S,
        callee_exit: &S,
        _callee_entry: NodeIndex,
        _call: &Call,
    ) -> S {
        callee_exit.clone()
    }
}

/// Returns the expanded state unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoOpRebuild;

impl<S: LocationState> RebuildOperator<S> for NoOpRebuild {
    fn rebuild(&self, _caller_before: &S, expanded: &S) -> S {
        expanded.clone()
    }
}
