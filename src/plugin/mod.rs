//! # plugin
//!
//! Hooks through which analysis extensions observe the solver and feed it
//! extra statements. A plugin never touches points-to sets or the call graph
//! itself; it queues statements through [`PluginContext::add_stmts`].

mod ir_model;

pub use ir_model::{Handler, HandlerRegistry, IrModelPlugin};

use crate::callgraph::Edge;
use crate::frontend::JType;
use crate::ir::{Elements, MethodIdx, StmtIdx, VarIdx};
use crate::pointer_analysis::{AnalysisState, CSCallSite, CSMethod, CSVar, PointsToSet, Solver};

/// Solver callbacks; every hook defaults to doing nothing.
pub trait Plugin {
    /// Called once before any method is reachable.
    fn on_start(&mut self, _cx: &mut PluginContext<'_, '_>) {}

    /// Called once the worklist is exhausted.
    fn on_finish(&mut self, _cx: &mut PluginContext<'_, '_>) {}

    /// Called the first time `method` becomes reachable in any context.
    fn on_new_method(&mut self, _cx: &mut PluginContext<'_, '_>, _method: MethodIdx) {}

    /// Called for each statement of a method that became reachable for the first time.
    fn on_new_stmt(&mut self, _cx: &mut PluginContext<'_, '_>, _stmt: StmtIdx, _container: MethodIdx) {}

    /// Called after the statements of a newly reachable context-qualified method were added.
    fn on_new_cs_method(&mut self, _cx: &mut PluginContext<'_, '_>, _cs_method: CSMethod) {}

    fn on_new_points_to_set(
        &mut self,
        _cx: &mut PluginContext<'_, '_>,
        _var: CSVar,
        _diff: &PointsToSet,
    ) {
    }

    fn on_new_call_edge(&mut self, _cx: &mut PluginContext<'_, '_>, _edge: &Edge<CSCallSite, CSMethod>) {}

    /// Called for dynamic call sites, which get no edge from the solver.
    fn on_unresolved_call(&mut self, _cx: &mut PluginContext<'_, '_>, _call_site: CSCallSite) {}
}

/// Runs its plugins in registration order.
#[derive(Default)]
pub struct CompositePlugin {
    plugins: Vec<Box<dyn Plugin>>,
}

impl CompositePlugin {
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Plugin for CompositePlugin {
    fn on_start(&mut self, cx: &mut PluginContext<'_, '_>) {
        self.plugins.iter_mut().for_each(|p| p.on_start(cx));
    }

    fn on_finish(&mut self, cx: &mut PluginContext<'_, '_>) {
        self.plugins.iter_mut().for_each(|p| p.on_finish(cx));
    }

    fn on_new_method(&mut self, cx: &mut PluginContext<'_, '_>, method: MethodIdx) {
        self.plugins
            .iter_mut()
            .for_each(|p| p.on_new_method(cx, method));
    }

    fn on_new_stmt(&mut self, cx: &mut PluginContext<'_, '_>, stmt: StmtIdx, container: MethodIdx) {
        self.plugins
            .iter_mut()
            .for_each(|p| p.on_new_stmt(cx, stmt, container));
    }

    fn on_new_cs_method(&mut self, cx: &mut PluginContext<'_, '_>, cs_method: CSMethod) {
        self.plugins
            .iter_mut()
            .for_each(|p| p.on_new_cs_method(cx, cs_method));
    }

    fn on_new_points_to_set(
        &mut self,
        cx: &mut PluginContext<'_, '_>,
        var: CSVar,
        diff: &PointsToSet,
    ) {
        self.plugins
            .iter_mut()
            .for_each(|p| p.on_new_points_to_set(cx, var, diff));
    }

    fn on_new_call_edge(&mut self, cx: &mut PluginContext<'_, '_>, edge: &Edge<CSCallSite, CSMethod>) {
        self.plugins
            .iter_mut()
            .for_each(|p| p.on_new_call_edge(cx, edge));
    }

    fn on_unresolved_call(&mut self, cx: &mut PluginContext<'_, '_>, call_site: CSCallSite) {
        self.plugins
            .iter_mut()
            .for_each(|p| p.on_unresolved_call(cx, call_site));
    }
}

/// What a plugin may see and do while one of its hooks runs.
pub struct PluginContext<'s, 'p> {
    solver: &'s mut Solver<'p>,
}

impl<'s, 'p> PluginContext<'s, 'p> {
    pub(crate) fn new(solver: &'s mut Solver<'p>) -> Self {
        Self { solver }
    }

    pub fn state(&self) -> &AnalysisState<'p> {
        &self.solver.state
    }

    pub fn elements(&self) -> &Elements<'p> {
        &self.solver.state.elements
    }

    /// IR tables, for interning and for creating synthetic statements.
    pub fn elements_mut(&mut self) -> &mut Elements<'p> {
        &mut self.solver.state.elements
    }

    pub fn new_temp_var(&mut self, method: MethodIdx, base: &str, jtype: &JType) -> VarIdx {
        self.solver.state.elements.new_temp_var(method, base, jtype)
    }

    /// Keeps the solver from building and solving the body of `method`.
    pub fn add_ignored_method(&mut self, method: MethodIdx) {
        self.solver.ignored.insert(method);
    }

    pub fn is_ignored(&self, method: MethodIdx) -> bool {
        self.solver.ignored.contains(&method)
    }

    /// Queues synthetic statements to run in `cs_method` once the hook returns.
    pub fn add_stmts(&mut self, cs_method: CSMethod, stmts: Vec<StmtIdx>) {
        if !stmts.is_empty() {
            self.solver.pending.push((cs_method, stmts));
        }
    }
}
