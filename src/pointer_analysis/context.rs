//! Contexts and the selectors that choose them.
//!
//! A context is an interned sequence of call sites or allocation sites.
//! The selectors here keep at most `k` of the most recent elements for
//! methods and `k - 1` for heap objects.

use std::collections::HashMap;

use super::element::{CSCallSite, CSMethod, Obj};
use crate::ir::{CallSiteIdx, MethodIdx, StmtIdx};
use crate::util::index_type;

index_type!(Ctx);

impl Ctx {
    pub const EMPTY: Ctx = Ctx(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextElement {
    CallSite(CallSiteIdx),
    AllocSite(StmtIdx),
}

pub struct ContextManager {
    contexts: Vec<Vec<ContextElement>>,
    index: HashMap<Vec<ContextElement>, Ctx>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextManager {
    pub fn new() -> Self {
        let mut manager = Self {
            contexts: Vec::new(),
            index: HashMap::new(),
        };
        manager.get(Vec::new());
        manager
    }

    pub fn get(&mut self, elements: Vec<ContextElement>) -> Ctx {
        if let Some(ctx) = self.index.get(&elements) {
            return *ctx;
        }
        let ctx = Ctx(self.contexts.len() as u32);
        self.contexts.push(elements.clone());
        self.index.insert(elements, ctx);
        ctx
    }

    pub fn elements(&self, ctx: Ctx) -> &[ContextElement] {
        &self.contexts[ctx.index()]
    }

    /// `parent` followed by `element`, keeping the last `limit` elements.
    pub fn append(&mut self, parent: Ctx, element: ContextElement, limit: usize) -> Ctx {
        let mut elements = self.contexts[parent.index()].clone();
        elements.push(element);
        self.suffix(elements, limit)
    }

    /// The last `limit` elements of `ctx`.
    pub fn truncate(&mut self, ctx: Ctx, limit: usize) -> Ctx {
        if self.contexts[ctx.index()].len() <= limit {
            return ctx;
        }
        let elements = self.contexts[ctx.index()].clone();
        self.suffix(elements, limit)
    }

    fn suffix(&mut self, mut elements: Vec<ContextElement>, limit: usize) -> Ctx {
        if elements.len() > limit {
            elements.drain(..elements.len() - limit);
        }
        self.get(elements)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

pub trait ContextSelector {
    fn empty_context(&self) -> Ctx {
        Ctx::EMPTY
    }

    /// Context of `callee` invoked at `call_site`, on `receiver` for dispatched calls.
    fn select_context(
        &self,
        contexts: &mut ContextManager,
        call_site: CSCallSite,
        receiver: Option<&Obj>,
        callee: MethodIdx,
    ) -> Ctx;

    /// Heap context of the object allocated at `alloc` inside `method`.
    fn select_heap_context(
        &self,
        contexts: &mut ContextManager,
        method: CSMethod,
        alloc: StmtIdx,
    ) -> Ctx;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextInsensitive;

impl ContextSelector for ContextInsensitive {
    fn select_context(
        &self,
        _contexts: &mut ContextManager,
        _call_site: CSCallSite,
        _receiver: Option<&Obj>,
        _callee: MethodIdx,
    ) -> Ctx {
        Ctx::EMPTY
    }

    fn select_heap_context(
        &self,
        _contexts: &mut ContextManager,
        _method: CSMethod,
        _alloc: StmtIdx,
    ) -> Ctx {
        Ctx::EMPTY
    }
}

/// k-limited call-string sensitivity.
#[derive(Debug, Clone, Copy)]
pub struct KCallSite {
    pub k: usize,
}

impl ContextSelector for KCallSite {
    fn select_context(
        &self,
        contexts: &mut ContextManager,
        call_site: CSCallSite,
        _receiver: Option<&Obj>,
        _callee: MethodIdx,
    ) -> Ctx {
        contexts.append(call_site.ctx, ContextElement::CallSite(call_site.site), self.k)
    }

    fn select_heap_context(
        &self,
        contexts: &mut ContextManager,
        method: CSMethod,
        _alloc: StmtIdx,
    ) -> Ctx {
        contexts.truncate(method.ctx, self.k.saturating_sub(1))
    }
}

/// k-limited object sensitivity; static calls inherit the caller's context.
///
/// Special calls, constructors included, are bound without a receiver object
/// and inherit the caller's context as well.
#[derive(Debug, Clone, Copy)]
pub struct KObject {
    pub k: usize,
}

impl ContextSelector for KObject {
    fn select_context(
        &self,
        contexts: &mut ContextManager,
        call_site: CSCallSite,
        receiver: Option<&Obj>,
        _callee: MethodIdx,
    ) -> Ctx {
        match receiver {
            Some(obj) => contexts.append(obj.heap_ctx, ContextElement::AllocSite(obj.alloc), self.k),
            None => call_site.ctx,
        }
    }

    fn select_heap_context(
        &self,
        contexts: &mut ContextManager,
        method: CSMethod,
        _alloc: StmtIdx,
    ) -> Ctx {
        contexts.truncate(method.ctx, self.k.saturating_sub(1))
    }
}
