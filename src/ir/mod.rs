//! # ir
//!
//! Canonical IR for the pointer analysis.
//! Every entity lives in an arena owned by [`Elements`] and is addressed by a
//! small index, so identity comparison of two handles is identity of the
//! entities they name.
//! Only reference-typed values have variables; anything else is `None`.

mod builder;
mod elements;
mod hierarchy;

pub use elements::Elements;
pub use hierarchy::{parse_signature, MethodSignature};

use crate::callgraph::CallKind;
use crate::frontend::{FieldId, JType, MethodId};
use crate::util::index_type;

index_type!(TypeIdx);
index_type!(MethodIdx);
index_type!(FieldIdx);
index_type!(VarIdx);
index_type!(
    /// A statement; for allocations also the allocation-site identity.
    StmtIdx
);
index_type!(CallSiteIdx);

#[derive(Debug, Clone)]
pub struct Type {
    pub jtype: JType,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub decl: MethodId,
    pub class: TypeIdx,
    /// `<Class: ret name(params)>`
    pub signature: String,
    /// `ret name(params)`
    pub subsignature: String,
    pub is_static: bool,
    pub is_native: bool,
    pub is_abstract: bool,
    pub this: Option<VarIdx>,
    /// One slot per declared parameter; `None` for non-reference parameters.
    pub params: Vec<Option<VarIdx>>,
    pub ret_vars: Vec<VarIdx>,
    pub stmts: Vec<StmtIdx>,
    pub call_sites: Vec<CallSiteIdx>,
    pub(crate) built: bool,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub decl: FieldId,
    pub class: TypeIdx,
    pub ty: TypeIdx,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub ty: TypeIdx,
    pub method: MethodIdx,
    /// Loads whose base is this variable.
    pub loads: Vec<StmtIdx>,
    /// Stores whose base is this variable.
    pub stores: Vec<StmtIdx>,
    /// Calls whose receiver is this variable.
    pub calls: Vec<StmtIdx>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `lhs = new T`
    Allocation { lhs: VarIdx, ty: TypeIdx },
    /// `lhs = rhs`
    Assign { lhs: VarIdx, rhs: VarIdx },
    /// `lhs = base.field`
    InstanceLoad {
        lhs: VarIdx,
        base: VarIdx,
        field: FieldIdx,
    },
    /// `base.field = rhs`
    InstanceStore {
        base: VarIdx,
        field: FieldIdx,
        rhs: VarIdx,
    },
    Call {
        site: CallSiteIdx,
        lhs: Option<VarIdx>,
    },
}

#[derive(Debug, Clone)]
pub struct StmtData {
    pub method: MethodIdx,
    /// Position in the method body; synthetic statements continue after it.
    pub index: usize,
    pub stmt: Stmt,
    /// Injected by a plugin rather than built from the method body.
    pub synthetic: bool,
}

#[derive(Debug, Clone)]
pub struct CallSite {
    pub method: MethodIdx,
    pub kind: CallKind,
    /// The statically referenced target, not necessarily the runtime one.
    pub target: MethodIdx,
    pub receiver: Option<VarIdx>,
    pub args: Vec<Option<VarIdx>>,
    pub call: StmtIdx,
}
