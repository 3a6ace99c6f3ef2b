use std::collections::{HashMap, HashSet};

use log::{debug, info, trace};

use super::context::ContextSelector;
use super::element::{CSCallSite, CSMethod, ObjIdx, Pointer, PointerIdx};
use super::pts::{PointsToSet, WorkEntry, WorkList};
use super::AnalysisState;
use crate::callgraph::{CallKind, Edge};
use crate::error::{Error, Result};
use crate::ir::{Elements, MethodIdx, Stmt, StmtIdx, VarIdx};
use crate::options::WorklistOrder;
use crate::plugin::{CompositePlugin, Plugin, PluginContext};
use crate::util::Graph;

/// Worklist solver for the points-to analysis.
///
/// Entries are seeded by [`Solver::initialize`]; each [`Solver::step`]
/// handles one worklist entry, either a points-to delta flowing into a
/// pointer or a newly discovered call edge.
pub struct Solver<'p> {
    pub(crate) state: AnalysisState<'p>,
    selector: Box<dyn ContextSelector>,
    plugin: CompositePlugin,
    worklist: WorkList,
    pfg: Graph<PointerIdx>,
    entries: Vec<MethodIdx>,
    pub(crate) ignored: HashSet<MethodIdx>,
    seen_methods: HashSet<MethodIdx>,
    /// Injected statements that depend on the pointer of their base variable.
    injected_deps: HashMap<PointerIdx, Vec<StmtIdx>>,
    pub(crate) pending: Vec<(CSMethod, Vec<StmtIdx>)>,
    iterations: usize,
    started: bool,
}

impl<'p> Solver<'p> {
    pub fn new(
        elements: Elements<'p>,
        entries: Vec<MethodIdx>,
        selector: Box<dyn ContextSelector>,
        order: WorklistOrder,
        plugins: Vec<Box<dyn Plugin>>,
    ) -> Self {
        Self {
            state: AnalysisState::new(elements),
            selector,
            plugin: CompositePlugin::new(plugins),
            worklist: WorkList::new(order),
            pfg: Graph::new(),
            entries,
            ignored: HashSet::new(),
            seen_methods: HashSet::new(),
            injected_deps: HashMap::new(),
            pending: Vec::new(),
            iterations: 0,
            started: false,
        }
    }

    pub fn state(&self) -> &AnalysisState<'p> {
        &self.state
    }

    pub fn into_state(self) -> AnalysisState<'p> {
        self.state
    }

    pub fn is_ignored(&self, method: MethodIdx) -> bool {
        self.ignored.contains(&method)
    }

    pub fn pfg(&self) -> &Graph<PointerIdx> {
        &self.pfg
    }

    /// Runs `on_start` and makes the entry methods reachable; only the first call has effect.
    pub fn initialize(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.notify(|plugin, cx| plugin.on_start(cx))?;
        let ctx = self.selector.empty_context();
        for method in self.entries.clone() {
            let entry = CSMethod { ctx, method };
            self.add_reachable(entry)?;
            self.state.call_graph.add_entry(entry);
        }
        Ok(())
    }

    /// Processes one worklist entry.
    /// Returns false once the worklist is exhausted and nothing was done.
    pub fn step(&mut self) -> Result<bool> {
        self.initialize()?;
        let entry = match self.worklist.poll() {
            Some(entry) => entry,
            None => return Ok(false),
        };
        self.iterations += 1;
        match entry {
            WorkEntry::Pointer(pointer, pts) => self.process_pointer(pointer, pts)?,
            WorkEntry::CallEdge(caller, edge) => self.process_call_edge(caller, edge)?,
        }
        Ok(true)
    }

    pub fn solve(&mut self) -> Result<()> {
        self.initialize()?;
        while self.step()? {}
        self.notify(|plugin, cx| plugin.on_finish(cx))?;
        // injections made while finishing still have to reach the fixpoint
        while self.step()? {}
        self.log_statistics();
        Ok(())
    }

    fn log_statistics(&self) {
        info!("-------------- Pointer analysis statistics: --------------");
        info!("#reachable methods: {}", self.state.reachable_methods().len());
        info!("#cs methods: {}", self.state.call_graph.num_methods());
        info!("#call graph edges: {}", self.state.call_graph.num_edges());
        info!("#contexts: {}", self.state.contexts.len());
        info!("#pointers: {}", self.state.cs.num_pointers());
        info!("#objects: {}", self.state.cs.num_objs());
        info!("#pfg edges: {}", self.pfg.num_edges());
        info!("#worklist iterations: {}", self.iterations);
    }

    /// Hands the plugins a context, then injects whatever they queued.
    fn notify<F>(&mut self, hook: F) -> Result<()>
    where
        F: FnOnce(&mut CompositePlugin, &mut PluginContext<'_, 'p>),
    {
        let mut plugin = std::mem::take(&mut self.plugin);
        hook(&mut plugin, &mut PluginContext::new(self));
        self.plugin = plugin;
        for (cs_method, stmts) in std::mem::take(&mut self.pending) {
            self.process_stmts(cs_method, &stmts, true)?;
        }
        Ok(())
    }

    fn add_reachable(&mut self, cs_method: CSMethod) -> Result<()> {
        if !self.state.call_graph.add_reachable(cs_method) {
            return Ok(());
        }
        let method = cs_method.method;
        if self.ignored.contains(&method) {
            debug!(
                "{} is ignored, its body is not analyzed",
                self.state.elements.method_data(method).signature
            );
            return Ok(());
        }
        let stmts = self.state.elements.ir(method)?.stmts.clone();
        if self.seen_methods.insert(method) {
            debug!(
                "new reachable method {}",
                self.state.elements.method_data(method).signature
            );
            self.notify(|plugin, cx| plugin.on_new_method(cx, method))?;
            for &stmt in &stmts {
                self.notify(|plugin, cx| plugin.on_new_stmt(cx, stmt, method))?;
            }
        }
        self.process_stmts(cs_method, &stmts, false)?;
        self.notify(|plugin, cx| plugin.on_new_cs_method(cx, cs_method))
    }

    /// Adds the effects of `stmts` executed in `cs_method`.
    fn process_stmts(
        &mut self,
        cs_method: CSMethod,
        stmts: &[StmtIdx],
        injected: bool,
    ) -> Result<()> {
        let ctx = cs_method.ctx;
        for &s in stmts {
            let stmt = self.state.elements.stmt(s).stmt.clone();
            match stmt {
                Stmt::Allocation { lhs, ty } => {
                    let heap_ctx =
                        self.selector
                            .select_heap_context(&mut self.state.contexts, cs_method, s);
                    let obj = self.state.cs.obj(s, ty, heap_ctx);
                    let pointer = self.state.cs.var_ptr(ctx, lhs);
                    self.worklist
                        .add_pointer(pointer, PointsToSet::singleton(obj));
                }
                Stmt::Assign { lhs, rhs } => {
                    let from = self.state.cs.var_ptr(ctx, rhs);
                    let to = self.state.cs.var_ptr(ctx, lhs);
                    self.add_pfg_edge(from, to);
                }
                Stmt::InstanceLoad { base, .. } | Stmt::InstanceStore { base, .. } => {
                    self.watch(cs_method, base, s, injected)?;
                }
                Stmt::Call { site, .. } => {
                    let call_site = self.state.elements.call_site(site).clone();
                    let cs_call_site = CSCallSite { ctx, site };
                    self.state.call_graph.add_call_site(cs_method, cs_call_site);
                    match call_site.kind {
                        CallKind::Static | CallKind::Special => {
                            let callee = call_site.target;
                            let callee_ctx = self.selector.select_context(
                                &mut self.state.contexts,
                                cs_call_site,
                                None,
                                callee,
                            );
                            self.worklist.add_call_edge(
                                cs_method,
                                Edge {
                                    kind: call_site.kind,
                                    call_site: cs_call_site,
                                    callee: CSMethod {
                                        ctx: callee_ctx,
                                        method: callee,
                                    },
                                },
                            );
                        }
                        CallKind::Virtual | CallKind::Interface => {
                            if let Some(receiver) = call_site.receiver {
                                self.watch(cs_method, receiver, s, injected)?;
                            }
                        }
                        CallKind::Dynamic => {
                            debug!(
                                "leave dynamic call {} unresolved",
                                self.state.elements.call_site_string(site)
                            );
                            self.notify(|plugin, cx| plugin.on_unresolved_call(cx, cs_call_site))?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Makes `stmt` react to the objects `base` points to in `cs_method`'s context.
    fn watch(
        &mut self,
        cs_method: CSMethod,
        base: VarIdx,
        stmt: StmtIdx,
        injected: bool,
    ) -> Result<()> {
        let pointer = self.state.cs.var_ptr(cs_method.ctx, base);
        if injected {
            self.injected_deps.entry(pointer).or_default().push(stmt);
        }
        let pts = self.state.cs.pts(pointer).clone();
        if pts.is_empty() {
            return Ok(());
        }
        self.process_instance_stmt(cs_method, stmt, &pts)
    }

    fn add_pfg_edge(&mut self, from: PointerIdx, to: PointerIdx) {
        if self.pfg.add_edge(from, to) {
            let pts = self.state.cs.pts(from);
            if !pts.is_empty() {
                self.worklist.add_pointer(to, pts.clone());
            }
        }
    }

    /// Merges `pts` into `pointer` and forwards the new objects along the PFG.
    fn propagate(&mut self, pointer: PointerIdx, pts: &PointsToSet) -> PointsToSet {
        let diff = self.state.cs.pts_mut(pointer).add_all(pts);
        if !diff.is_empty() {
            let succs: Vec<_> = self.pfg.succs(pointer).collect();
            for succ in succs {
                self.worklist.add_pointer(succ, diff.clone());
            }
        }
        diff
    }

    fn process_pointer(&mut self, pointer: PointerIdx, pts: PointsToSet) -> Result<()> {
        let diff = self.propagate(pointer, &pts);
        if diff.is_empty() {
            return Ok(());
        }
        let cs_var = match self.state.cs.pointer_data(pointer) {
            Pointer::Var(cs_var) => cs_var,
            Pointer::InstanceField(..) => return Ok(()),
        };
        trace!(
            "{} objects flow into {}",
            diff.len(),
            self.state.elements.var(cs_var.var).name
        );
        self.notify(|plugin, cx| plugin.on_new_points_to_set(cx, cs_var, &diff))?;
        let var = self.state.elements.var(cs_var.var);
        let mut stmts: Vec<StmtIdx> = var
            .loads
            .iter()
            .chain(&var.stores)
            .chain(&var.calls)
            .copied()
            .collect();
        let method = var.method;
        if let Some(injected) = self.injected_deps.get(&pointer) {
            stmts.extend(injected.iter().copied());
        }
        let cs_method = CSMethod {
            ctx: cs_var.ctx,
            method,
        };
        for stmt in stmts {
            self.process_instance_stmt(cs_method, stmt, &diff)?;
        }
        Ok(())
    }

    /// Applies a load, store or dispatched call to newly seen base objects.
    fn process_instance_stmt(
        &mut self,
        cs_method: CSMethod,
        stmt: StmtIdx,
        objs: &PointsToSet,
    ) -> Result<()> {
        let ctx = cs_method.ctx;
        match self.state.elements.stmt(stmt).stmt.clone() {
            Stmt::InstanceLoad { lhs, field, .. } => {
                let to = self.state.cs.var_ptr(ctx, lhs);
                for obj in objs.iter() {
                    let from = self.state.cs.field_ptr(obj, field);
                    self.add_pfg_edge(from, to);
                }
            }
            Stmt::InstanceStore { field, rhs, .. } => {
                let from = self.state.cs.var_ptr(ctx, rhs);
                for obj in objs.iter() {
                    let to = self.state.cs.field_ptr(obj, field);
                    self.add_pfg_edge(from, to);
                }
            }
            Stmt::Call { site, .. } => {
                if self.state.elements.call_site(site).kind.is_dispatched() {
                    for obj in objs.iter() {
                        self.dispatch_call(cs_method, CSCallSite { ctx, site }, obj)?;
                    }
                }
            }
            Stmt::Allocation { .. } | Stmt::Assign { .. } => {}
        }
        Ok(())
    }

    fn dispatch_call(
        &mut self,
        caller: CSMethod,
        call_site: CSCallSite,
        receiver: ObjIdx,
    ) -> Result<()> {
        let elements = &mut self.state.elements;
        let (kind, target) = {
            let site = elements.call_site(call_site.site);
            (site.kind, site.target)
        };
        let subsignature = elements.method_data(target).subsignature.clone();
        let obj = self.state.cs.obj_data(receiver).clone();
        let callee = match elements.dispatch(obj.ty, &subsignature) {
            Some(callee) => callee,
            None => {
                return Err(Error::UnresolvedCall {
                    subsignature,
                    class: elements.type_data(obj.ty).name.clone(),
                    call_site: elements.call_site_string(call_site.site),
                })
            }
        };
        let callee_ctx = self.selector.select_context(
            &mut self.state.contexts,
            call_site,
            Some(&obj),
            callee,
        );
        self.worklist.add_call_edge(
            caller,
            Edge {
                kind,
                call_site,
                callee: CSMethod {
                    ctx: callee_ctx,
                    method: callee,
                },
            },
        );
        if !self.ignored.contains(&callee) {
            if let Some(this) = self.state.elements.ir(callee)?.this {
                let pointer = self.state.cs.var_ptr(callee_ctx, this);
                self.worklist
                    .add_pointer(pointer, PointsToSet::singleton(receiver));
            }
        }
        Ok(())
    }

    fn process_call_edge(
        &mut self,
        caller: CSMethod,
        edge: Edge<CSCallSite, CSMethod>,
    ) -> Result<()> {
        if self.state.call_graph.has_edge(edge.call_site, edge.callee) {
            return Ok(());
        }
        self.add_reachable(edge.callee)?;
        self.state.call_graph.add_edge(caller, edge);
        debug!(
            "new call edge {} -> {}",
            self.state.elements.call_site_string(edge.call_site.site),
            self.state.elements.method_data(edge.callee.method).signature
        );
        self.notify(|plugin, cx| plugin.on_new_call_edge(cx, &edge))?;
        let callee = edge.callee.method;
        if self.ignored.contains(&callee) {
            return Ok(());
        }
        let (this, params, ret_vars) = {
            let method = self.state.elements.ir(callee)?;
            (method.this, method.params.clone(), method.ret_vars.clone())
        };
        let site = edge.call_site.site;
        let call_site = self.state.elements.call_site(site).clone();
        let caller_ctx = edge.call_site.ctx;
        let callee_ctx = edge.callee.ctx;
        for (arg, param) in call_site.args.iter().zip(&params) {
            if let (Some(arg), Some(param)) = (arg, param) {
                let from = self.state.cs.var_ptr(caller_ctx, *arg);
                let to = self.state.cs.var_ptr(callee_ctx, *param);
                self.add_pfg_edge(from, to);
            }
        }
        if let Some(lhs) = self.state.elements.call_result(site) {
            let to = self.state.cs.var_ptr(caller_ctx, lhs);
            for ret in ret_vars {
                let from = self.state.cs.var_ptr(callee_ctx, ret);
                self.add_pfg_edge(from, to);
            }
        }
        // dispatched calls pass each receiver object to `this` on their own
        if edge.kind == CallKind::Special {
            if let (Some(receiver), Some(this)) = (call_site.receiver, this) {
                let from = self.state.cs.var_ptr(caller_ctx, receiver);
                let to = self.state.cs.var_ptr(callee_ctx, this);
                self.add_pfg_edge(from, to);
            }
        }
        Ok(())
    }
}
