//! Context-qualified elements, abstract objects and pointers.

use std::collections::HashMap;

use super::context::Ctx;
use super::pts::PointsToSet;
use crate::ir::{CallSiteIdx, FieldIdx, MethodIdx, StmtIdx, TypeIdx, VarIdx};
use crate::util::index_type;

index_type!(ObjIdx);
index_type!(PointerIdx);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSMethod {
    pub ctx: Ctx,
    pub method: MethodIdx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSCallSite {
    pub ctx: Ctx,
    pub site: CallSiteIdx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CSVar {
    pub ctx: Ctx,
    pub var: VarIdx,
}

/// An abstract object: one allocation site under one heap context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obj {
    pub alloc: StmtIdx,
    pub ty: TypeIdx,
    pub heap_ctx: Ctx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pointer {
    Var(CSVar),
    InstanceField(ObjIdx, FieldIdx),
}

/// Interns objects and pointers, and owns the points-to set of every pointer.
#[derive(Default)]
pub struct CSManager {
    objs: Vec<Obj>,
    obj_index: HashMap<(StmtIdx, Ctx), ObjIdx>,
    pointers: Vec<Pointer>,
    pts: Vec<PointsToSet>,
    pointer_index: HashMap<Pointer, PointerIdx>,
    var_pointers: HashMap<VarIdx, Vec<PointerIdx>>,
}

impl CSManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn obj(&mut self, alloc: StmtIdx, ty: TypeIdx, heap_ctx: Ctx) -> ObjIdx {
        if let Some(o) = self.obj_index.get(&(alloc, heap_ctx)) {
            return *o;
        }
        let o = ObjIdx(self.objs.len() as u32);
        self.objs.push(Obj { alloc, ty, heap_ctx });
        self.obj_index.insert((alloc, heap_ctx), o);
        o
    }

    pub fn obj_data(&self, o: ObjIdx) -> &Obj {
        &self.objs[o.index()]
    }

    pub fn pointer(&mut self, pointer: Pointer) -> PointerIdx {
        if let Some(p) = self.pointer_index.get(&pointer) {
            return *p;
        }
        let p = PointerIdx(self.pointers.len() as u32);
        self.pointers.push(pointer);
        self.pts.push(PointsToSet::new());
        self.pointer_index.insert(pointer, p);
        if let Pointer::Var(cs_var) = pointer {
            self.var_pointers.entry(cs_var.var).or_default().push(p);
        }
        p
    }

    pub fn var_ptr(&mut self, ctx: Ctx, var: VarIdx) -> PointerIdx {
        self.pointer(Pointer::Var(CSVar { ctx, var }))
    }

    pub fn field_ptr(&mut self, obj: ObjIdx, field: FieldIdx) -> PointerIdx {
        self.pointer(Pointer::InstanceField(obj, field))
    }

    /// The pointer if it has been created; never creates one.
    pub fn lookup(&self, pointer: Pointer) -> Option<PointerIdx> {
        self.pointer_index.get(&pointer).copied()
    }

    pub fn pointer_data(&self, p: PointerIdx) -> Pointer {
        self.pointers[p.index()]
    }

    pub fn pts(&self, p: PointerIdx) -> &PointsToSet {
        &self.pts[p.index()]
    }

    pub(super) fn pts_mut(&mut self, p: PointerIdx) -> &mut PointsToSet {
        &mut self.pts[p.index()]
    }

    /// Pointers of `var` in every context it has been seen in.
    pub fn var_pointers(&self, var: VarIdx) -> &[PointerIdx] {
        self.var_pointers
            .get(&var)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }

    pub fn num_pointers(&self) -> usize {
        self.pointers.len()
    }
}
