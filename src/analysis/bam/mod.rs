/*!
Block Abstraction Memoization: turns any intraprocedural [`Cpa`] into an
interprocedural one.

[`BamCpa`] wraps a domain CPA and is itself a `Cpa`, so the ordinary
worklist solver drives the whole interprocedural analysis without knowing
about calls. The wrapped domain's merge/stop/precision/abort operators and
per-edge transfer relation are delegated unchanged; only `successors` is
replaced by the BAM orchestration in [`transfer`]: per-function blocks are
solved recursively, summarized as [`BlockAbstraction`]s keyed by calling
context in a [`BamCache`], and recursion is detected and unrolled through an
explicit simulated call stack.
*/
use crate::analysis::cpa::reached::{ReachedSet, Waitlist, WaitlistOrder};
use crate::analysis::cpa::Cpa;
use crate::cfa::{Cfa, EdgeIndex, Signature};
use crate::error::AnalysisError;

pub mod cache;
pub mod operators;
mod transfer;

#[cfg(test)]
mod tests;

pub use cache::{BamCache, BlockAbstraction};
pub use operators::{
    ExpandOperator, NoOpExpand, NoOpReduce, NoOpRebuild, RebuildOperator, ReduceOperator,
};

/// One frame of the simulated call stack: the function being analyzed, the
/// reduced entry state its block was keyed with, and the caller states whose
/// calls are blocked on this frame and must be retried once its summary
/// grows. Frames live in a plain `Vec` and are addressed by position, so the
/// incomplete-call relation carries no back-references.
#[derive(Debug)]
struct StackEntry<S> {
    function: Signature,
    entry_state: S,
    incomplete: Vec<S>,
}

impl<S> StackEntry<S> {
    fn new(function: Signature, entry_state: S) -> Self {
        StackEntry {
            function,
            entry_state,
            incomplete: Vec::new(),
        }
    }
}

pub struct BamCpa<W: Cpa> {
    wrapped: W,
    main: Signature,
    cache: BamCache<W::State, W::Precision>,
    stack: Vec<StackEntry<W::State>>,
    fixed_point_reached: bool,
    reduce: Box<dyn ReduceOperator<W::State>>,
    expand: Box<dyn ExpandOperator<W::State>>,
    rebuild: Box<dyn RebuildOperator<W::State>>,
    /// `None`: unbounded. `Some(0)`: purely intraprocedural. `Some(k)`:
    /// unroll at most `k` nested interprocedural calls, delegating deeper
    /// ones to the wrapped transfer relation as opaque instructions.
    max_call_depth: Option<usize>,
    waitlist_order: WaitlistOrder,
}

impl<W: Cpa> BamCpa<W> {
    /// Wraps `wrapped` with no-op reduce/expand/rebuild operators, an
    /// unbounded call stack and breadth-first exploration.
    pub fn new(wrapped: W, main: Signature) -> Self {
        BamCpa {
            wrapped,
            main,
            cache: BamCache::new(),
            stack: Vec::new(),
            fixed_point_reached: true,
            reduce: Box::new(NoOpReduce),
            expand: Box::new(NoOpExpand),
            rebuild: Box::new(NoOpRebuild),
            max_call_depth: None,
            waitlist_order: WaitlistOrder::default(),
        }
    }

    pub fn with_reduce_operator(mut self, op: impl ReduceOperator<W::State> + 'static) -> Self {
        self.reduce = Box::new(op);
        self
    }

    pub fn with_expand_operator(mut self, op: impl ExpandOperator<W::State> + 'static) -> Self {
        self.expand = Box::new(op);
        self
    }

    pub fn with_rebuild_operator(mut self, op: impl RebuildOperator<W::State> + 'static) -> Self {
        self.rebuild = Box::new(op);
        self
    }

    /// Starts from an existing summary cache, so blocks computed by a
    /// previous run (or another engine over the same program) are reused
    /// instead of re-solved.
    pub fn with_cache(mut self, cache: BamCache<W::State, W::Precision>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_max_call_depth(mut self, depth: Option<usize>) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_waitlist_order(mut self, order: WaitlistOrder) -> Self {
        self.waitlist_order = order;
        self
    }

    /// The per-function summaries discovered so far. Inspectable after a run.
    pub fn cache(&self) -> &BamCache<W::State, W::Precision> {
        &self.cache
    }

    pub fn main(&self) -> Signature {
        self.main
    }

    pub fn wrapped(&self) -> &W {
        &self.wrapped
    }

    pub fn into_wrapped(self) -> W {
        self.wrapped
    }

    /// Factory for per-block reached sets. Override the waitlist order via
    /// [`Self::with_waitlist_order`] to change exploration policy globally.
    pub fn fresh_reached_set(&self) -> ReachedSet<W::State> {
        ReachedSet::new()
    }

    /// Factory for per-block waitlists honoring the configured order.
    pub fn fresh_waitlist(&self) -> Waitlist<W::State> {
        Waitlist::new(self.waitlist_order)
    }

    /// Seeds fresh containers with `initial` (a state at the main entry) and
    /// drives the solver to completion. Returns the top-level reached set;
    /// per-function summaries are left in [`Self::cache`].
    pub fn run(
        &mut self,
        initial: W::State,
        precision: &W::Precision,
    ) -> Result<ReachedSet<W::State>, AnalysisError> {
        let mut reached = self.fresh_reached_set();
        let mut waitlist = self.fresh_waitlist();
        reached.push(initial.clone());
        waitlist.push(initial);
        self.run_cpa(&mut reached, &mut waitlist, precision)?;
        Ok(reached)
    }
}

impl<W: Cpa> Cpa for BamCpa<W> {
    type Instr = W::Instr;
    type State = W::State;
    type Precision = W::Precision;

    fn cfa(&self) -> &Cfa<Self::Instr> {
        self.wrapped.cfa()
    }

    fn edge_successors(
        &mut self,
        state: &Self::State,
        edge: EdgeIndex,
        precision: &Self::Precision,
    ) -> Result<Vec<Self::State>, AnalysisError> {
        self.wrapped.edge_successors(state, edge, precision)
    }

    fn successors(
        &mut self,
        state: &Self::State,
        precision: &Self::Precision,
    ) -> Result<Vec<Self::State>, AnalysisError> {
        self.bam_successors(state, precision)
    }

    fn is_less_or_equal(&self, lhs: &Self::State, rhs: &Self::State) -> bool {
        self.wrapped.is_less_or_equal(lhs, rhs)
    }

    fn join(&self, lhs: &Self::State, rhs: &Self::State) -> Self::State {
        self.wrapped.join(lhs, rhs)
    }

    fn merge(
        &self,
        state: &Self::State,
        reached: &Self::State,
        precision: &Self::Precision,
    ) -> Result<Option<Self::State>, AnalysisError> {
        self.wrapped.merge(state, reached, precision)
    }

    fn stop<'a>(
        &self,
        state: &Self::State,
        reached: impl Iterator<Item = &'a Self::State>,
        precision: &Self::Precision,
    ) -> Result<bool, AnalysisError>
    where
        Self::State: 'a,
    {
        self.wrapped.stop(state, reached, precision)
    }

    fn prec(
        &self,
        state: Self::State,
        precision: &Self::Precision,
        reached: &ReachedSet<Self::State>,
    ) -> Result<Self::State, AnalysisError> {
        self.wrapped.prec(state, precision, reached)
    }

    fn should_abort(&self, state: &Self::State) -> bool {
        self.wrapped.should_abort(state)
    }
}
