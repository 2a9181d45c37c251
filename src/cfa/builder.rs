use super::{Call, Cfa, CfaEdge, CfaNode, EdgeIndex, NodeIndex, NodeKind, Signature};
use petgraph::graph::DiGraph;
use std::collections::HashMap;

/// Incrementally assembles a [`Cfa`]. The builder owns all node creation, so
/// every method is infallible; entry and exit indices are maintained as nodes
/// are added.
#[derive(Debug)]
pub struct CfaBuilder<I> {
    graph: DiGraph<CfaNode, CfaEdge<I>>,
    entries: HashMap<Signature, NodeIndex>,
    exits: HashMap<Signature, Vec<NodeIndex>>,
}

impl<I> Default for CfaBuilder<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> CfaBuilder<I> {
    pub fn new() -> Self {
        CfaBuilder {
            graph: DiGraph::new(),
            entries: HashMap::new(),
            exits: HashMap::new(),
        }
    }

    pub fn node(&mut self, signature: Signature, offset: u32, kind: NodeKind) -> NodeIndex {
        let id = self.graph.add_node(CfaNode {
            signature,
            offset,
            kind,
        });
        match kind {
            NodeKind::Entry | NodeKind::UnknownTarget => {
                self.entries.insert(signature, id);
            }
            NodeKind::Exit | NodeKind::ExceptionExit => {
                self.exits.entry(signature).or_default().push(id);
            }
            NodeKind::Body => {}
        }
        id
    }

    /// Registers a placeholder entry for a function whose body is unavailable.
    /// Calls resolving to it are delegated to the intraprocedural transfer
    /// relation instead of being summarized.
    pub fn unknown_function(&mut self, signature: Signature) -> NodeIndex {
        self.node(signature, 0, NodeKind::UnknownTarget)
    }

    pub fn op_edge(&mut self, from: NodeIndex, to: NodeIndex, op: I) -> EdgeIndex {
        self.graph.add_edge(from, to, CfaEdge::Op(op))
    }

    /// Adds a call edge from `call_site` to `return_site` (both caller
    /// nodes). The callee body is looked up through the call's target
    /// signature during analysis.
    pub fn call_edge(
        &mut self,
        call_site: NodeIndex,
        return_site: NodeIndex,
        call: Call,
    ) -> EdgeIndex {
        self.graph.add_edge(call_site, return_site, CfaEdge::Call(call))
    }

    pub fn build(self) -> Cfa<I> {
        Cfa {
            graph: self.graph,
            entries: self.entries,
            exits: self.exits,
        }
    }
}
