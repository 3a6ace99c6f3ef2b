//! Models library methods by substituting generated statements for their calls.
//!
//! A handled method is never analyzed itself. When a reachable method calls
//! it, the handler turns the call site into statements that are kept for the
//! calling method and injected into each of its contexts as it becomes reachable.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use super::{Plugin, PluginContext};
use crate::callgraph::CallKind;
use crate::error::{Error, Result};
use crate::ir::{CallSite, Elements, MethodIdx, Stmt, StmtIdx};
use crate::pointer_analysis::CSMethod;

/// Produces the statements that model one call site.
pub type Handler = Rc<dyn Fn(&CallSite, &mut Elements<'_>) -> Vec<Stmt>>;

/// At most one handler per method.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<MethodIdx, Handler>,
}

impl HandlerRegistry {
    pub fn get(&self, method: MethodIdx) -> Option<&Handler> {
        self.handlers.get(&method)
    }

    pub fn contains(&self, method: MethodIdx) -> bool {
        self.handlers.contains_key(&method)
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodIdx> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub struct IrModelPlugin {
    name: String,
    registry: HandlerRegistry,
    /// Generated statements by the method containing the modeled call.
    generated: HashMap<MethodIdx, Vec<StmtIdx>>,
}

impl IrModelPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: HandlerRegistry::default(),
            generated: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Registers `handler` for each method in `signatures`.
    ///
    /// Signatures absent from the program are skipped; a malformed one or a
    /// method that already has a handler is an error.
    pub fn register<F>(
        &mut self,
        elements: &mut Elements<'_>,
        signatures: &[&str],
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&CallSite, &mut Elements<'_>) -> Vec<Stmt> + 'static,
    {
        let handler: Handler = Rc::new(handler);
        for &signature in signatures {
            let method = match elements.resolve_method(signature)? {
                Some(method) => method,
                None => {
                    debug!("{}: {} is not in the program, skip it", self.name, signature);
                    continue;
                }
            };
            if self.registry.contains(method) {
                return Err(Error::DuplicateHandler {
                    plugin: self.name.clone(),
                    method: signature.to_owned(),
                });
            }
            self.registry.handlers.insert(method, handler.clone());
        }
        Ok(())
    }

    /// Statements generated so far for calls inside `method`.
    pub fn generated_stmts(&self, method: MethodIdx) -> &[StmtIdx] {
        self.generated
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Plugin for IrModelPlugin {
    fn on_start(&mut self, cx: &mut PluginContext<'_, '_>) {
        for method in self.registry.methods() {
            cx.add_ignored_method(method);
        }
    }

    fn on_new_stmt(&mut self, cx: &mut PluginContext<'_, '_>, stmt: StmtIdx, container: MethodIdx) {
        let site = match cx.elements().stmt(stmt).stmt {
            Stmt::Call { site, .. } => site,
            _ => return,
        };
        let call_site = cx.elements().call_site(site).clone();
        if call_site.kind == CallKind::Dynamic {
            return;
        }
        let handler = match self.registry.get(call_site.target) {
            Some(handler) => handler.clone(),
            None => return,
        };
        let elements = cx.elements_mut();
        let stmts = handler(&call_site, &mut *elements);
        let generated = self.generated.entry(container).or_default();
        for s in stmts {
            generated.push(elements.add_stmt(container, s, true));
        }
    }

    fn on_new_cs_method(&mut self, cx: &mut PluginContext<'_, '_>, cs_method: CSMethod) {
        if let Some(stmts) = self.generated.get(&cs_method.method) {
            cx.add_stmts(cs_method, stmts.clone());
        }
    }
}
