//! # callgraph
//!
//! Call-site classification and the incrementally built call graph.
//! Node is a (possibly context-qualified) method.
//! Edge (A, B, (K, C)) means A calls B with call kind K at call site C.
//! Both the reachable set and the edge set only ever grow.

mod dump;

pub use dump::{
    compare_call_graph, compare_call_graph_with, dump_call_graph, write_call_graph,
    CALL_EDGE_SEPARATOR,
};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::{Directed, Graph};

use crate::frontend::{opcodes, InvokeExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallKind {
    /// Static call, no receiver.
    Static,
    /// Private, superclass or constructor call: statically bound.
    Special,
    /// Ordinary instance call, dispatched on the receiver's class.
    Virtual,
    /// Call through an interface-typed reference.
    Interface,
    /// Target chosen by a bootstrap mechanism outside the engine.
    Dynamic,
}

impl CallKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CallKind::Static => "invokestatic",
            CallKind::Special => "invokespecial",
            CallKind::Virtual => "invokevirtual",
            CallKind::Interface => "invokeinterface",
            CallKind::Dynamic => "invokedynamic",
        }
    }

    /// Whether the runtime target depends on the receiver object.
    pub fn is_dispatched(self) -> bool {
        matches!(self, CallKind::Virtual | CallKind::Interface)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Classifies an invocation purely by its opcode.
/// `None` means the shape is not an invocation this engine understands.
pub fn classify(invoke: &InvokeExpr) -> Option<CallKind> {
    match invoke.opcode {
        opcodes::INVOKESTATIC => Some(CallKind::Static),
        opcodes::INVOKESPECIAL => Some(CallKind::Special),
        opcodes::INVOKEVIRTUAL => Some(CallKind::Virtual),
        opcodes::INVOKEINTERFACE => Some(CallKind::Interface),
        opcodes::INVOKEDYNAMIC => Some(CallKind::Dynamic),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge<CS, M> {
    pub kind: CallKind,
    pub call_site: CS,
    pub callee: M,
}

pub struct CallGraph<CS, M> {
    graph: Graph<M, (CallKind, CS), Directed>,
    nodes: HashMap<M, NodeIndex>,
    entries: Vec<M>,
    callees: HashMap<CS, HashSet<M>>,
    call_sites_in: HashMap<M, Vec<CS>>,
    edges: HashSet<(CS, M)>,
}

impl<CS, M> Default for CallGraph<CS, M>
where
    CS: Copy + Eq + Hash,
    M: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<CS, M> CallGraph<CS, M>
where
    CS: Copy + Eq + Hash,
    M: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            nodes: HashMap::new(),
            entries: Vec::new(),
            callees: HashMap::new(),
            call_sites_in: HashMap::new(),
            edges: HashSet::new(),
        }
    }

    pub fn add_entry(&mut self, method: M) {
        self.entries.push(method);
        self.add_reachable(method);
    }

    pub fn entries(&self) -> &[M] {
        &self.entries
    }

    /// Returns true if `method` was not reachable before.
    pub fn add_reachable(&mut self, method: M) -> bool {
        if self.nodes.contains_key(&method) {
            return false;
        }
        let idx = self.graph.add_node(method);
        self.nodes.insert(method, idx);
        true
    }

    pub fn contains(&self, method: M) -> bool {
        self.nodes.contains_key(&method)
    }

    /// Records that `call_site` lives in `method`.
    pub fn add_call_site(&mut self, method: M, call_site: CS) {
        self.call_sites_in.entry(method).or_default().push(call_site);
    }

    /// Returns true if the edge is new. The callee is made reachable.
    pub fn add_edge(&mut self, caller: M, edge: Edge<CS, M>) -> bool {
        if !self.edges.insert((edge.call_site, edge.callee)) {
            return false;
        }
        self.add_reachable(caller);
        self.add_reachable(edge.callee);
        let from = self.nodes[&caller];
        let to = self.nodes[&edge.callee];
        self.graph.add_edge(from, to, (edge.kind, edge.call_site));
        self.callees
            .entry(edge.call_site)
            .or_default()
            .insert(edge.callee);
        true
    }

    pub fn callees_of(&self, call_site: CS) -> impl Iterator<Item = M> + '_ {
        self.callees
            .get(&call_site)
            .into_iter()
            .flat_map(|callees| callees.iter().copied())
    }

    pub fn has_edge(&self, call_site: CS, callee: M) -> bool {
        self.edges.contains(&(call_site, callee))
    }

    pub fn call_sites_in(&self, method: M) -> &[CS] {
        self.call_sites_in
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reachable methods in the order they were discovered.
    pub fn reachable_methods(&self) -> impl Iterator<Item = M> + '_ {
        self.graph.raw_nodes().iter().map(|node| node.weight)
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge<CS, M>> + '_ {
        self.graph.edge_references().map(move |e| {
            let (kind, call_site) = *e.weight();
            Edge {
                kind,
                call_site,
                callee: self.graph[e.target()],
            }
        })
    }

    pub fn num_methods(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Methods reachable from `root` along call edges, in BFS order.
    pub fn reachable_from(&self, root: M) -> Vec<M> {
        let mut visited = Vec::new();
        if let Some(&start) = self.nodes.get(&root) {
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                visited.push(self.graph[node]);
            }
        }
        visited
    }

    /// The call graph in dot format, one node per method.
    pub fn dot<F>(&self, label: F) -> String
    where
        F: Fn(M) -> String,
    {
        let labeled = self
            .graph
            .map(|_, m| label(*m), |_, (kind, _)| kind.mnemonic());
        format!("{}", Dot::with_config(&labeled, &[Config::EdgeNoLabel]))
    }
}
