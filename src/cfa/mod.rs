use internment::Intern;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

pub use builder::CfaBuilder;
pub use petgraph::graph::{EdgeIndex, NodeIndex};

mod builder;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignatureData {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

/// Unique identity of a function: class, name and descriptor, interned so a
/// `Signature` is `Copy` and O(1) to hash and compare. Cache keys and stack
/// frames embed these freely.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(Intern<SignatureData>);

impl Signature {
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Signature(Intern::new(SignatureData {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }))
    }

    pub fn class(&self) -> &str {
        &self.0.class
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn descriptor(&self) -> &str {
        &self.0.descriptor
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}:{}", self.0.class, self.0.name, self.0.descriptor)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Entry,
    Body,
    Exit,
    ExceptionExit,
    /// Placeholder entry for a function whose body is not part of this CFA
    /// (library code, missing class). Calls to it are treated opaquely.
    UnknownTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfaNode {
    pub signature: Signature,
    pub offset: u32,
    pub kind: NodeKind,
}

/// Static information attached to a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Call {
    pub target: Signature,
    pub args: Vec<String>,
}

impl Call {
    pub fn new(target: Signature, args: Vec<String>) -> Self {
        Call { target, args }
    }
}

/// An edge either carries an ordinary instruction of the client's choosing or
/// a call. A call edge runs from the call-site node to the *return-site* node
/// of the caller; the callee body is reached via [`Cfa::entry_node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfaEdge<I> {
    Op(I),
    Call(Call),
}

/// A control-flow automaton for a whole program: one digraph spanning every
/// function body, plus entry/exit indices per function signature. Immutable
/// after construction; build one with [`CfaBuilder`].
#[derive(Debug, Clone)]
pub struct Cfa<I> {
    graph: DiGraph<CfaNode, CfaEdge<I>>,
    entries: HashMap<Signature, NodeIndex>,
    exits: HashMap<Signature, Vec<NodeIndex>>,
}

impl<I> Cfa<I> {
    pub fn entry_node(&self, signature: Signature) -> Option<NodeIndex> {
        self.entries.get(&signature).copied()
    }

    pub fn exit_nodes(&self, signature: Signature) -> &[NodeIndex] {
        self.exits.get(&signature).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node(&self, id: NodeIndex) -> &CfaNode {
        self.graph.node_weight(id).unwrap()
    }

    pub fn edge(&self, id: EdgeIndex) -> &CfaEdge<I> {
        self.graph.edge_weight(id).unwrap()
    }

    pub fn edge_source(&self, id: EdgeIndex) -> NodeIndex {
        self.graph.edge_endpoints(id).unwrap().0
    }

    pub fn edge_target(&self, id: EdgeIndex) -> NodeIndex {
        self.graph.edge_endpoints(id).unwrap().1
    }

    /// Leaving edges of `node`, in insertion order. Petgraph's adjacency
    /// lists iterate newest-first, so the collected list is reversed to keep
    /// successor exploration deterministic and source-ordered.
    pub fn leaving_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self.graph.edges(node).map(|e| e.id()).collect();
        edges.reverse();
        edges
    }

    pub fn is_call_edge(&self, id: EdgeIndex) -> bool {
        matches!(self.edge(id), CfaEdge::Call(_))
    }

    pub fn is_exit_node(&self, id: NodeIndex) -> bool {
        matches!(self.node(id).kind, NodeKind::Exit | NodeKind::ExceptionExit)
    }

    pub fn is_exception_exit(&self, id: NodeIndex) -> bool {
        self.node(id).kind == NodeKind::ExceptionExit
    }

    /// A call target is unknown when no entry node is registered for it, or
    /// when the registered entry is an [`NodeKind::UnknownTarget`] placeholder.
    pub fn is_unknown_target(&self, call: &Call) -> bool {
        match self.entry_node(call.target) {
            None => true,
            Some(entry) => self.node(entry).kind == NodeKind::UnknownTarget,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = Signature> + '_ {
        self.entries.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str) -> Signature {
        Signature::new("Demo", name, "()V")
    }

    #[test]
    fn builder_registers_entries_and_exits() {
        let mut b = CfaBuilder::<u32>::new();
        let f = sig("f");
        let f0 = b.node(f, 0, NodeKind::Entry);
        let f1 = b.node(f, 1, NodeKind::Exit);
        let f2 = b.node(f, 2, NodeKind::ExceptionExit);
        b.op_edge(f0, f1, 7);
        b.op_edge(f0, f2, 8);
        let cfa = b.build();

        assert_eq!(cfa.entry_node(f), Some(f0));
        assert_eq!(cfa.exit_nodes(f), &[f1, f2]);
        assert!(cfa.is_exit_node(f1));
        assert!(cfa.is_exit_node(f2));
        assert!(cfa.is_exception_exit(f2));
        assert!(!cfa.is_exception_exit(f1));
    }

    #[test]
    fn leaving_edges_preserve_insertion_order() {
        let mut b = CfaBuilder::<u32>::new();
        let f = sig("f");
        let f0 = b.node(f, 0, NodeKind::Entry);
        let f1 = b.node(f, 1, NodeKind::Exit);
        let e1 = b.op_edge(f0, f1, 1);
        let e2 = b.op_edge(f0, f1, 2);
        let e3 = b.op_edge(f0, f1, 3);
        let cfa = b.build();

        assert_eq!(cfa.leaving_edges(f0), vec![e1, e2, e3]);
    }

    #[test]
    fn unknown_targets_are_detected() {
        let mut b = CfaBuilder::<u32>::new();
        let main = sig("main");
        let lib = sig("lib");
        let missing = sig("missing");
        let m0 = b.node(main, 0, NodeKind::Entry);
        let m1 = b.node(main, 1, NodeKind::Exit);
        b.unknown_function(lib);
        let call = b.call_edge(m0, m1, Call::new(lib, vec![]));
        let cfa = b.build();

        assert!(cfa.is_call_edge(call));
        assert!(cfa.is_unknown_target(&Call::new(lib, vec![])));
        assert!(cfa.is_unknown_target(&Call::new(missing, vec![])));
        assert!(!cfa.is_unknown_target(&Call::new(main, vec![])));
    }
}
