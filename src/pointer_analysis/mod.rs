//! # pointer_analysis
//!
//! Inclusion-based, on-the-fly points-to analysis over a pointer flow graph.
//! Pointer: context-qualified variable or instance field of an abstract object.
//! Edge: `from -> to` means pts(from) is a subset of pts(to).
//! Reachable methods and call edges are discovered while points-to sets grow.
//!
//! Everything the solver computes only grows, so the worklist loop reaches a
//! fixpoint on any finite program.

pub mod context;
mod element;
mod pts;
mod solver;

pub use context::{ContextInsensitive, ContextSelector, Ctx, KCallSite, KObject};
pub use element::{CSCallSite, CSManager, CSMethod, CSVar, Obj, ObjIdx, Pointer, PointerIdx};
pub use pts::PointsToSet;
pub use solver::Solver;

use std::collections::HashSet;

use crate::callgraph::{CallGraph, Edge};
use crate::ir::{CallSiteIdx, Elements, FieldIdx, MethodIdx, StmtIdx, VarIdx};
use context::ContextManager;

/// Everything the solver has computed so far; after solving, the result.
pub struct AnalysisState<'p> {
    pub(crate) elements: Elements<'p>,
    pub(crate) cs: CSManager,
    pub(crate) contexts: ContextManager,
    pub(crate) call_graph: CallGraph<CSCallSite, CSMethod>,
}

impl<'p> AnalysisState<'p> {
    pub(crate) fn new(elements: Elements<'p>) -> Self {
        Self {
            elements,
            cs: CSManager::new(),
            contexts: ContextManager::new(),
            call_graph: CallGraph::new(),
        }
    }

    pub fn elements(&self) -> &Elements<'p> {
        &self.elements
    }

    pub fn cs_manager(&self) -> &CSManager {
        &self.cs
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    /// The context-sensitive call graph.
    pub fn call_graph(&self) -> &CallGraph<CSCallSite, CSMethod> {
        &self.call_graph
    }

    pub fn obj(&self, obj: ObjIdx) -> &Obj {
        self.cs.obj_data(obj)
    }

    pub fn points_to_cs_var(&self, ctx: Ctx, var: VarIdx) -> Vec<ObjIdx> {
        self.points_to(Pointer::Var(CSVar { ctx, var }))
    }

    /// Union of the points-to sets of `var` over all its contexts.
    pub fn points_to_var(&self, var: VarIdx) -> Vec<ObjIdx> {
        let mut objs: Vec<_> = self
            .cs
            .var_pointers(var)
            .iter()
            .flat_map(|&p| self.cs.pts(p).iter())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        objs.sort();
        objs
    }

    pub fn points_to_field(&self, obj: ObjIdx, field: FieldIdx) -> Vec<ObjIdx> {
        self.points_to(Pointer::InstanceField(obj, field))
    }

    fn points_to(&self, pointer: Pointer) -> Vec<ObjIdx> {
        self.cs
            .lookup(pointer)
            .map(|p| self.cs.pts(p).to_sorted_vec())
            .unwrap_or_default()
    }

    /// Allocation sites `var` may point to, ignoring heap contexts.
    pub fn alloc_sites(&self, var: VarIdx) -> Vec<StmtIdx> {
        let mut sites: Vec<_> = self
            .points_to_var(var)
            .into_iter()
            .map(|o| self.cs.obj_data(o).alloc)
            .collect();
        sites.sort();
        sites.dedup();
        sites
    }

    /// Reachable methods in discovery order, each listed once.
    pub fn reachable_methods(&self) -> Vec<MethodIdx> {
        let mut seen = HashSet::new();
        self.call_graph
            .reachable_methods()
            .map(|csm| csm.method)
            .filter(|m| seen.insert(*m))
            .collect()
    }

    /// The call graph with contexts projected away, as dumped and compared.
    pub fn method_call_graph(&self) -> CallGraph<CallSiteIdx, MethodIdx> {
        let mut cg = CallGraph::new();
        for entry in self.call_graph.entries() {
            cg.add_entry(entry.method);
        }
        for m in self.reachable_methods() {
            cg.add_reachable(m);
        }
        // includes the call sites of injected statements
        let mut sites = HashSet::new();
        for cs_method in self.call_graph.reachable_methods() {
            for cs in self.call_graph.call_sites_in(cs_method) {
                if sites.insert(cs.site) {
                    cg.add_call_site(cs_method.method, cs.site);
                }
            }
        }
        for edge in self.call_graph.edges() {
            let caller = self.elements.call_site(edge.call_site.site).method;
            cg.add_edge(
                caller,
                Edge {
                    kind: edge.kind,
                    call_site: edge.call_site.site,
                    callee: edge.callee.method,
                },
            );
        }
        cg
    }
}
