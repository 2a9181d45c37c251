/**
Interprocedural abstract interpretation through Block Abstraction Memoization (BAM).

The crate is split into two layers:

- [`analysis::cpa`] is a generic Configurable Program Analysis framework: a
  [`Cpa`](analysis::cpa::Cpa) bundles an abstract domain with transfer, merge,
  stop, precision-adjustment and abort operators, and a worklist fixed-point
  solver drives any such bundle over a control-flow automaton ([`cfa`]).
- [`analysis::bam`] turns any *intra*procedural `Cpa` into an
  *inter*procedural one by caching per-function block abstractions keyed by
  calling context and driving an outer fixed-point loop across (possibly
  recursive) call graphs.

[`analysis::taint`] is a small taint-tracking domain included as a worked
example of plugging a domain into the framework.
*/
pub mod analysis;
pub mod cfa;
mod error;

pub use error::AnalysisError;
