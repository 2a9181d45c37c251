//! The BAM transfer relation: per-block solving, context-keyed caching,
//! recursion detection through the simulated call stack, and the outer
//! fixed-point loop that re-runs the whole analysis until every function's
//! summary is closed under its own recursive calls.
use super::cache::BlockAbstraction;
use super::{BamCpa, StackEntry};
use crate::analysis::cpa::reached::ReachedSet;
use crate::analysis::cpa::{Cpa, LocationState};
use crate::cfa::{Call, CfaEdge, EdgeIndex, NodeIndex, NodeKind, Signature};
use crate::error::AnalysisError;
use itertools::Itertools;
use tracing::{debug, trace};

impl<W: Cpa> BamCpa<W> {
    /// Entry point substituted for the wrapped transfer relation.
    ///
    /// Top-level main-entry states start the outer fixed-point loop; states
    /// at call sites route each call edge through a block abstraction (or
    /// fall back to the wrapped relation for unknown targets and exhausted
    /// depth); everything else is delegated wholesale.
    pub(super) fn bam_successors(
        &mut self,
        state: &W::State,
        precision: &W::Precision,
    ) -> Result<Vec<W::State>, AnalysisError> {
        let location = state.location();
        let main_entry = self
            .wrapped
            .cfa()
            .entry_node(self.main)
            .ok_or(AnalysisError::MissingMainEntry(self.main))?;
        if self.stack.is_empty() && location == main_entry {
            return self.solve_outer(state, precision);
        }

        let edges = self.wrapped.cfa().leaving_edges(location);
        if !edges.iter().any(|&e| self.wrapped.cfa().is_call_edge(e)) {
            // Ordinary instruction (or exit node with no successors at all).
            return self.wrapped.successors(state, precision);
        }

        let mut out = Vec::new();
        for edge in edges {
            let call = match self.wrapped.cfa().edge(edge) {
                CfaEdge::Call(call) => Some(call.clone()),
                CfaEdge::Op(_) => None,
            };
            match call {
                Some(call)
                    if !self.wrapped.cfa().is_unknown_target(&call) && !self.depth_exceeded() =>
                {
                    out.extend(self.apply_block_abstraction(state, precision, Some(edge))?);
                }
                // Unknown target or depth bound hit: the call is one opaque
                // instruction for the wrapped relation. Non-call edges from
                // the same node are delegated as usual.
                _ => out.extend(self.wrapped.edge_successors(state, edge, precision)?),
            }
        }
        Ok(out.into_iter().unique().collect())
    }

    fn depth_exceeded(&self) -> bool {
        self.max_call_depth
            .is_some_and(|bound| self.stack.len() > bound)
    }

    /// The outer fixed-point loop, entered only for the top-level main
    /// invocation. Each pass re-analyzes the program from the main entry;
    /// any recursive unrolling that grew a summary clears the flag and
    /// forces another pass. The loop only exits once a full pass changes
    /// nothing observable, so callers see final callee summaries.
    fn solve_outer(
        &mut self,
        state: &W::State,
        precision: &W::Precision,
    ) -> Result<Vec<W::State>, AnalysisError> {
        let mut pass = 0usize;
        loop {
            pass += 1;
            self.fixed_point_reached = true;
            debug!(pass, main = %self.main, "interprocedural fixed-point pass");
            let result = self.apply_block_abstraction(state, precision, None)?;
            if self.fixed_point_reached {
                debug!(pass, blocks = self.cache.len(), "fixed point reached");
                return Ok(result);
            }
        }
    }

    /// Analyzes one function invocation as a block: reduce the call state,
    /// detect recursion against the stack, solve (or resume) the block with
    /// the full interprocedural CPA, persist the summary, and translate exit
    /// states back to the caller.
    ///
    /// `call_edge == None` means the top-level main invocation, which is
    /// recomputed every outer pass and deliberately bypasses the cache.
    fn apply_block_abstraction(
        &mut self,
        call_state: &W::State,
        precision: &W::Precision,
        call_edge: Option<EdgeIndex>,
    ) -> Result<Vec<W::State>, AnalysisError> {
        let (entry_node, call) = match call_edge {
            Some(edge) => {
                let CfaEdge::Call(call) = self.wrapped.cfa().edge(edge) else {
                    return Err(AnalysisError::NotACallEdge);
                };
                let call = call.clone();
                let entry = self
                    .wrapped
                    .cfa()
                    .entry_node(call.target)
                    .ok_or(AnalysisError::MissingEntry(call.target))?;
                (entry, Some(call))
            }
            None => (call_state.location(), None),
        };
        let current_fn = self.wrapped.cfa().node(entry_node).signature;

        let reduced = match &call {
            Some(call) => self.reduce.reduce(call_state, entry_node, call),
            None => self.reduce.reduce_entry(call_state, entry_node),
        };

        // Recursion check: an active frame for the same function whose entry
        // dominates ours means this context is already being computed
        // further down; never re-enter it.
        let covering = self.stack.iter().rposition(|frame| {
            frame.function == current_fn
                && self.wrapped.is_less_or_equal(&reduced, &frame.entry_state)
        });
        if let Some(idx) = covering {
            let frame_entry = self.stack[idx].entry_state.clone();
            if let Some(block) = self.cache.get(&frame_entry, precision, current_fn) {
                trace!(function = %current_fn, "recursive call answered from cache");
                let reached = block.reached().clone();
                let ctx = self.result_context(&call, call_edge, entry_node);
                return Ok(self.block_results(call_state, current_fn, ctx, &reached));
            }
            // The bottom frame is the top-level invocation, which is never
            // cached, so a call deferred against it would be re-deferred on
            // every outer pass. Treat it as one opaque instruction instead.
            if idx == 0 {
                if let Some(edge) = call_edge {
                    trace!(function = %current_fn, "recursion through the uncached top level; delegating call");
                    return self.wrapped.edge_successors(call_state, edge, precision);
                }
            }
            // First unrolling of the cycle: defer this call and let the next
            // outer pass retry it against the then-cached summary. The
            // unreduced caller state is recorded, matching the semantics the
            // retry expects.
            trace!(function = %current_fn, "recursion detected; deferring call");
            self.stack[idx].incomplete.push(call_state.clone());
            self.fixed_point_reached = false;
            return Ok(Vec::new());
        }

        let cached = match &call {
            Some(_) => self.cache.get(&reduced, precision, current_fn),
            None => None,
        };
        let (mut reached, mut waitlist) = match cached {
            Some(block) => {
                // A cached summary may be partial (nonempty waitlist), so
                // resume it rather than taking its reached set verbatim.
                trace!(function = %current_fn, pending = block.waitlist().len(), "resuming cached block");
                (block.reached().clone(), block.waitlist().clone())
            }
            None => {
                trace!(function = %current_fn, "analyzing new block");
                let mut reached = self.fresh_reached_set();
                let mut waitlist = self.fresh_waitlist();
                reached.push(reduced.clone());
                waitlist.push(reduced.clone());
                (reached, waitlist)
            }
        };

        self.stack
            .push(StackEntry::new(current_fn, reduced.clone()));
        // Recursive re-entry point: nested calls inside this block come back
        // through bam_successors with this frame on the stack.
        let solved = self.run_cpa(&mut reached, &mut waitlist, precision);
        let frame = self.stack.pop().expect("frame pushed above");
        solved?;

        if !frame.incomplete.is_empty() {
            // Deferred recursive calls: park them on this block's waitlist so
            // a resumed pass picks them up, and surface them to the caller's
            // frame so the retry propagates outward.
            for state in &frame.incomplete {
                waitlist.push(state.clone());
            }
            if let Some(parent) = self.stack.last_mut() {
                parent.incomplete.extend(frame.incomplete.iter().cloned());
            }
        }

        if call.is_some() {
            // Non-merging coverage check of the new exit states against the
            // previous summary: any growth means callers that already
            // consumed the old summary must be revisited.
            let grown = match self.cache.get(&reduced, precision, current_fn) {
                Some(previous) => self.exit_states(current_fn, &reached).into_iter().any(|state| {
                    !previous
                        .reached()
                        .states_at(state.location())
                        .any(|old| self.wrapped.is_less_or_equal(state, old))
                }),
                None => false,
            };
            if grown {
                trace!(function = %current_fn, "summary grew beyond cached version");
                self.fixed_point_reached = false;
                if let Some(parent) = self.stack.last_mut() {
                    parent.incomplete.push(call_state.clone());
                }
            }
            self.cache.put(
                reduced.clone(),
                precision.clone(),
                current_fn,
                BlockAbstraction::new(reached.clone(), waitlist),
            );
        }

        let ctx = self.result_context(&call, call_edge, entry_node);
        Ok(self.block_results(call_state, current_fn, ctx, &reached))
    }

    fn result_context<'c>(
        &self,
        call: &'c Option<Call>,
        call_edge: Option<EdgeIndex>,
        entry_node: NodeIndex,
    ) -> Option<(&'c Call, NodeIndex, NodeIndex)> {
        match (call, call_edge) {
            (Some(call), Some(edge)) => {
                Some((call, entry_node, self.wrapped.cfa().edge_target(edge)))
            }
            _ => None,
        }
    }

    /// Translates a solved block's exit states into caller successors. Real
    /// calls continue only through normal exits (an uncaught exception ends
    /// the path inside the summary); each surviving state is expanded,
    /// rebuilt, relocated to the return site and deduplicated preserving
    /// insertion order. The top-level invocation returns every exit state,
    /// exception exits included, unmodified.
    fn block_results(
        &self,
        call_state: &W::State,
        function: Signature,
        call: Option<(&Call, NodeIndex, NodeIndex)>,
        reached: &ReachedSet<W::State>,
    ) -> Vec<W::State> {
        let exits = self.exit_states(function, reached);
        match call {
            None => exits.into_iter().cloned().collect(),
            Some((call, callee_entry, return_site)) => exits
                .into_iter()
                .filter(|state| self.wrapped.cfa().node(state.location()).kind == NodeKind::Exit)
                .map(|exit| {
                    let expanded = self.expand.expand(call_state, exit, callee_entry, call);
                    let rebuilt = self.rebuild.rebuild(call_state, &expanded);
                    rebuilt.relocated(return_site)
                })
                .unique()
                .collect(),
        }
    }

    fn exit_states<'r>(
        &self,
        function: Signature,
        reached: &'r ReachedSet<W::State>,
    ) -> Vec<&'r W::State> {
        reached
            .iter()
            .filter(|state| {
                let node = self.wrapped.cfa().node(state.location());
                node.signature == function
                    && matches!(node.kind, NodeKind::Exit | NodeKind::ExceptionExit)
            })
            .collect()
    }
}
