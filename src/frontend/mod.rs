//! # frontend
//!
//! The external program representation consumed by the engine.
//! A front-end (bytecode reader, source parser, test fixture) hands out
//! declarations through small integer handles and, on request, the body of a
//! concrete method as a list of Jimple-like units.
//! The engine calls [`Frontend::body`] at most once per method.

mod program;

pub use program::{BodyBuilder, Program};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

/// Index of a local inside one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// JVM invoke opcodes, used as the syntactic shape of an invocation.
pub mod opcodes {
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Class(ClassId),
    Array(Box<JType>),
    /// Type of the `null` literal.
    Null,
}

impl JType {
    /// Only reference-like values are tracked by the pointer analysis.
    pub fn is_reference(&self) -> bool {
        matches!(self, JType::Class(_) | JType::Array(_) | JType::Null)
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub class: ClassId,
    pub name: String,
    pub param_types: Vec<JType>,
    /// `None` for `void`.
    pub return_type: Option<JType>,
    pub is_static: bool,
    pub is_native: bool,
    pub is_abstract: bool,
    pub is_private: bool,
}

impl MethodDecl {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn has_body(&self) -> bool {
        !self.is_native && !self.is_abstract
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub class: ClassId,
    pub name: String,
    pub ty: JType,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub ty: JType,
}

/// The body of a concrete method.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub this_local: Option<LocalId>,
    pub param_locals: Vec<LocalId>,
    pub locals: Vec<LocalDecl>,
    pub units: Vec<Unit>,
}

impl Body {
    pub fn local(&self, local: LocalId) -> Option<&LocalDecl> {
        self.locals.get(local.0 as usize)
    }
}

#[derive(Debug, Clone)]
pub enum Unit {
    Assign { lhs: Value, rhs: Value },
    /// Binds `this`, a parameter, or a caught exception to a local.
    Identity { local: LocalId },
    Invoke(InvokeExpr),
    Return(Option<Value>),
    Throw(Value),
    Goto(usize),
    If { condition: Value, target: usize },
    Nop,
}

#[derive(Debug, Clone)]
pub enum Value {
    Local(LocalId),
    Null,
    IntConst(i32),
    LongConst(i64),
    DoubleConst(f64),
    StringConst(String),
    ClassConst(ClassId),
    New(ClassId),
    NewArray { element: JType, size: Box<Value> },
    InstanceField { base: LocalId, field: FieldId },
    StaticField(FieldId),
    ArrayElement { base: LocalId, index: Box<Value> },
    Invoke(InvokeExpr),
    Cast { ty: JType, value: Box<Value> },
    BinOp { op: String, lhs: Box<Value>, rhs: Box<Value> },
}

impl Value {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Local(l) => format!("local#{}", l.0),
            Value::Null => "null".to_owned(),
            Value::IntConst(i) => i.to_string(),
            Value::LongConst(l) => format!("{}L", l),
            Value::DoubleConst(d) => d.to_string(),
            Value::StringConst(s) => format!("{:?}", s),
            Value::ClassConst(c) => format!("class#{}", c.0),
            Value::New(c) => format!("new class#{}", c.0),
            Value::NewArray { .. } => "newarray".to_owned(),
            Value::InstanceField { base, field } => format!("local#{}.field#{}", base.0, field.0),
            Value::StaticField(f) => format!("static field#{}", f.0),
            Value::ArrayElement { base, .. } => format!("local#{}[..]", base.0),
            Value::Invoke(invoke) => invoke.to_string(),
            Value::Cast { value, .. } => format!("(cast) {}", value.describe()),
            Value::BinOp { op, lhs, rhs } => {
                format!("{} {} {}", lhs.describe(), op, rhs.describe())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvokeExpr {
    pub opcode: u8,
    pub method: MethodId,
    pub base: Option<Box<Value>>,
    pub args: Vec<Value>,
}

impl fmt::Display for InvokeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invoke[{:#04x}] method#{}", self.opcode, self.method.0)?;
        if let Some(base) = &self.base {
            write!(f, " on {}", base.describe())?;
        }
        Ok(())
    }
}

/// Method-body source queried lazily by the engine.
pub trait Frontend {
    fn class(&self, id: ClassId) -> &ClassDecl;
    fn method(&self, id: MethodId) -> &MethodDecl;
    fn field(&self, id: FieldId) -> &FieldDecl;
    /// `None` for native and abstract methods.
    fn body(&self, id: MethodId) -> Option<&Body>;
    fn class_by_name(&self, name: &str) -> Option<ClassId>;
}
