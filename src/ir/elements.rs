use std::collections::HashMap;

use super::hierarchy::{subsignature, type_name};
use super::{
    builder, CallSite, CallSiteIdx, Field, FieldIdx, Method, MethodIdx, Stmt, StmtData, StmtIdx,
    Type, TypeIdx, Var, VarIdx,
};
use crate::callgraph::CallKind;
use crate::error::Result;
use crate::frontend::{ClassId, FieldId, Frontend, JType, LocalDecl, LocalId, MethodId};

/// Owning statement of a call site that has no `Call` statement yet.
const UNBOUND_CALL: StmtIdx = StmtIdx(u32::MAX);

/// Interning tables for every IR entity of one analysis run.
///
/// Each external declaration maps to exactly one entity for the lifetime of
/// the tables; nothing is ever evicted.
/// Method bodies are translated on the first call to [`Elements::ir`].
pub struct Elements<'p> {
    pub(super) frontend: &'p dyn Frontend,
    pub(super) types: Vec<Type>,
    type_index: HashMap<JType, TypeIdx>,
    pub(super) methods: Vec<Method>,
    method_index: HashMap<MethodId, MethodIdx>,
    fields: Vec<Field>,
    field_index: HashMap<FieldId, FieldIdx>,
    vars: Vec<Var>,
    var_index: HashMap<(MethodIdx, LocalId), VarIdx>,
    stmts: Vec<StmtData>,
    call_sites: Vec<CallSite>,
    var_counters: HashMap<MethodIdx, u32>,
    pub(super) dispatch_cache: HashMap<(TypeIdx, String), Option<MethodIdx>>,
}

impl<'p> Elements<'p> {
    pub fn new(frontend: &'p dyn Frontend) -> Self {
        Self {
            frontend,
            types: Vec::new(),
            type_index: HashMap::new(),
            methods: Vec::new(),
            method_index: HashMap::new(),
            fields: Vec::new(),
            field_index: HashMap::new(),
            vars: Vec::new(),
            var_index: HashMap::new(),
            stmts: Vec::new(),
            call_sites: Vec::new(),
            var_counters: HashMap::new(),
            dispatch_cache: HashMap::new(),
        }
    }

    pub fn frontend(&self) -> &'p dyn Frontend {
        self.frontend
    }

    pub fn get_type(&mut self, jtype: &JType) -> TypeIdx {
        if let Some(ty) = self.type_index.get(jtype) {
            return *ty;
        }
        let ty = TypeIdx(self.types.len() as u32);
        self.types.push(Type {
            jtype: jtype.clone(),
            name: type_name(self.frontend, jtype),
        });
        self.type_index.insert(jtype.clone(), ty);
        ty
    }

    pub fn class_type(&mut self, class: ClassId) -> TypeIdx {
        self.get_type(&JType::Class(class))
    }

    /// Interns the method without translating its body.
    pub fn method(&mut self, id: MethodId) -> MethodIdx {
        if let Some(m) = self.method_index.get(&id) {
            return *m;
        }
        let decl = self.frontend.method(id);
        let class = self.class_type(decl.class);
        let subsignature = subsignature(self.frontend, decl);
        let signature = format!("<{}: {}>", self.types[class.index()].name, subsignature);
        let m = MethodIdx(self.methods.len() as u32);
        self.methods.push(Method {
            decl: id,
            class,
            signature,
            subsignature,
            is_static: decl.is_static,
            is_native: decl.is_native,
            is_abstract: decl.is_abstract,
            this: None,
            params: Vec::new(),
            ret_vars: Vec::new(),
            stmts: Vec::new(),
            call_sites: Vec::new(),
            built: false,
        });
        self.method_index.insert(id, m);
        m
    }

    /// Returns the method with its IR, translating the body on first request.
    pub fn ir(&mut self, m: MethodIdx) -> Result<&Method> {
        if !self.methods[m.index()].built {
            self.methods[m.index()].built = true;
            builder::build(self, m)?;
        }
        Ok(&self.methods[m.index()])
    }

    pub fn is_built(&self, m: MethodIdx) -> bool {
        self.methods[m.index()].built
    }

    pub fn field(&mut self, id: FieldId) -> FieldIdx {
        if let Some(f) = self.field_index.get(&id) {
            return *f;
        }
        let decl = self.frontend.field(id);
        let class = self.class_type(decl.class);
        let ty = self.get_type(&decl.ty);
        let f = FieldIdx(self.fields.len() as u32);
        self.fields.push(Field {
            decl: id,
            class,
            ty,
            name: decl.name.clone(),
        });
        self.field_index.insert(id, f);
        f
    }

    /// The variable for a source-level local, `None` if it is not reference-typed.
    pub fn local_var(
        &mut self,
        method: MethodIdx,
        local: LocalId,
        decl: &LocalDecl,
    ) -> Option<VarIdx> {
        if !decl.ty.is_reference() {
            return None;
        }
        if let Some(v) = self.var_index.get(&(method, local)) {
            return Some(*v);
        }
        let ty = self.get_type(&decl.ty);
        let v = self.push_var(method, decl.name.clone(), ty);
        self.var_index.insert((method, local), v);
        Some(v)
    }

    /// A synthesized variable; `name` must already be unique in `method`.
    pub fn new_var(&mut self, method: MethodIdx, name: &str, jtype: &JType) -> VarIdx {
        let ty = self.get_type(jtype);
        self.push_var(method, name.to_owned(), ty)
    }

    /// A fresh temporary named `<base><n>` with a per-method increasing `n`.
    pub fn new_temp_var(&mut self, method: MethodIdx, base: &str, jtype: &JType) -> VarIdx {
        let counter = self.var_counters.entry(method).or_insert(0);
        *counter += 1;
        let name = format!("{}{}", base, counter);
        self.new_var(method, &name, jtype)
    }

    fn push_var(&mut self, method: MethodIdx, name: String, ty: TypeIdx) -> VarIdx {
        let v = VarIdx(self.vars.len() as u32);
        self.vars.push(Var {
            name,
            ty,
            method,
            loads: Vec::new(),
            stores: Vec::new(),
            calls: Vec::new(),
        });
        v
    }

    pub(super) fn method_mut(&mut self, m: MethodIdx) -> &mut Method {
        &mut self.methods[m.index()]
    }

    /// Appends a statement to `method` and registers it against the variable
    /// whose points-to set it depends on.
    ///
    /// Synthetic statements are neither appended nor registered; the solver
    /// tracks them per context once they are injected.
    pub fn add_stmt(&mut self, method: MethodIdx, stmt: Stmt, synthetic: bool) -> StmtIdx {
        let s = StmtIdx(self.stmts.len() as u32);
        if let Stmt::Call { site, .. } = &stmt {
            let cs = &mut self.call_sites[site.index()];
            if cs.call == UNBOUND_CALL {
                cs.call = s;
            }
        }
        match &stmt {
            _ if synthetic => {}
            Stmt::InstanceLoad { base, .. } => self.vars[base.index()].loads.push(s),
            Stmt::InstanceStore { base, .. } => self.vars[base.index()].stores.push(s),
            Stmt::Call { site, .. } => {
                if let Some(receiver) = self.call_sites[site.index()].receiver {
                    self.vars[receiver.index()].calls.push(s);
                }
            }
            Stmt::Allocation { .. } | Stmt::Assign { .. } => {}
        }
        let body = &mut self.methods[method.index()].stmts;
        let index = if synthetic {
            body.len() + self.stmts.iter().filter(|d| d.method == method && d.synthetic).count()
        } else {
            body.len()
        };
        if !synthetic {
            body.push(s);
        }
        self.stmts.push(StmtData {
            method,
            index,
            stmt,
            synthetic,
        });
        s
    }

    /// Creates a call site in `method`; the first `Call` statement added for
    /// it becomes its owning statement.
    pub fn new_call_site(
        &mut self,
        method: MethodIdx,
        kind: CallKind,
        target: MethodIdx,
        receiver: Option<VarIdx>,
        args: Vec<Option<VarIdx>>,
    ) -> CallSiteIdx {
        let site = CallSiteIdx(self.call_sites.len() as u32);
        self.call_sites.push(CallSite {
            method,
            kind,
            target,
            receiver,
            args,
            call: UNBOUND_CALL,
        });
        site
    }

    /// Creates a call site together with its owning `Call` statement.
    pub fn add_call(
        &mut self,
        method: MethodIdx,
        kind: CallKind,
        target: MethodIdx,
        receiver: Option<VarIdx>,
        args: Vec<Option<VarIdx>>,
        lhs: Option<VarIdx>,
        synthetic: bool,
    ) -> StmtIdx {
        let site = self.new_call_site(method, kind, target, receiver, args);
        let s = self.add_stmt(method, Stmt::Call { site, lhs }, synthetic);
        if !synthetic {
            self.methods[method.index()].call_sites.push(site);
        }
        s
    }

    pub fn type_data(&self, ty: TypeIdx) -> &Type {
        &self.types[ty.index()]
    }

    pub fn method_data(&self, m: MethodIdx) -> &Method {
        &self.methods[m.index()]
    }

    pub fn field_data(&self, f: FieldIdx) -> &Field {
        &self.fields[f.index()]
    }

    pub fn var(&self, v: VarIdx) -> &Var {
        &self.vars[v.index()]
    }

    pub fn stmt(&self, s: StmtIdx) -> &StmtData {
        &self.stmts[s.index()]
    }

    pub fn call_site(&self, cs: CallSiteIdx) -> &CallSite {
        &self.call_sites[cs.index()]
    }

    /// The variable receiving the call's result, if any.
    pub fn call_result(&self, cs: CallSiteIdx) -> Option<VarIdx> {
        match self.stmts[self.call_sites[cs.index()].call.index()].stmt {
            Stmt::Call { lhs, .. } => lhs,
            _ => None,
        }
    }

    /// First variable of `method` named `name`; intended for inspection and tests.
    pub fn var_by_name(&self, method: MethodIdx, name: &str) -> Option<VarIdx> {
        self.vars
            .iter()
            .position(|v| v.method == method && v.name == name)
            .map(|i| VarIdx(i as u32))
    }

    /// An already interned method with the given signature; never interns.
    pub fn find_method(&self, signature: &str) -> Option<MethodIdx> {
        self.methods
            .iter()
            .position(|m| m.signature == signature)
            .map(|i| MethodIdx(i as u32))
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_stmts(&self) -> usize {
        self.stmts.len()
    }

    pub fn stmt_string(&self, s: StmtIdx) -> String {
        let var = |v: VarIdx| self.vars[v.index()].name.as_str();
        let field = |f: FieldIdx| {
            let field = &self.fields[f.index()];
            format!(
                "<{}: {} {}>",
                self.types[field.class.index()].name,
                self.types[field.ty.index()].name,
                field.name
            )
        };
        match &self.stmts[s.index()].stmt {
            Stmt::Allocation { lhs, ty } => {
                format!("{} = new {}", var(*lhs), self.types[ty.index()].name)
            }
            Stmt::Assign { lhs, rhs } => format!("{} = {}", var(*lhs), var(*rhs)),
            Stmt::InstanceLoad { lhs, base, field: f } => {
                format!("{} = {}.{}", var(*lhs), var(*base), field(*f))
            }
            Stmt::InstanceStore { base, field: f, rhs } => {
                format!("{}.{} = {}", var(*base), field(*f), var(*rhs))
            }
            Stmt::Call { site, lhs } => {
                let cs = &self.call_sites[site.index()];
                let mut out = String::new();
                if let Some(lhs) = lhs {
                    out.push_str(var(*lhs));
                    out.push_str(" = ");
                }
                out.push_str(cs.kind.mnemonic());
                out.push(' ');
                if let Some(receiver) = cs.receiver {
                    out.push_str(var(receiver));
                    out.push('.');
                }
                out.push_str(&self.methods[cs.target.index()].signature);
                let args: Vec<&str> = cs
                    .args
                    .iter()
                    .map(|arg| arg.map_or("_", |a| var(a)))
                    .collect();
                out.push('(');
                out.push_str(&args.join(", "));
                out.push(')');
                out
            }
        }
    }

    /// `<container>[index]<call statement>`, the key used by call-graph dumps.
    pub fn call_site_string(&self, cs: CallSiteIdx) -> String {
        let site = &self.call_sites[cs.index()];
        let data = &self.stmts[site.call.index()];
        format!(
            "{}[{}]{}",
            self.methods[site.method.index()].signature,
            data.index,
            self.stmt_string(site.call)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Program;

    #[test]
    fn test_interning_identity() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let a = p.add_class("A", Some(object));
        let f = p.add_field(a, "f", JType::Class(object));
        let m = p.add_method(a, "m", vec![], None);
        let mut elements = Elements::new(&p);
        assert_eq!(elements.class_type(a), elements.class_type(a));
        assert_eq!(elements.get_type(&JType::Class(a)), elements.class_type(a));
        assert_ne!(elements.class_type(a), elements.class_type(object));
        assert_eq!(elements.field(f), elements.field(f));
        assert_eq!(elements.method(m), elements.method(m));
        assert_eq!(elements.num_methods(), 1);
        let local = LocalDecl {
            name: "x".to_owned(),
            ty: JType::Class(a),
        };
        let m = elements.method(m);
        let x1 = elements.local_var(m, LocalId(0), &local);
        let x2 = elements.local_var(m, LocalId(0), &local);
        assert!(x1.is_some());
        assert_eq!(x1, x2);
        let int = LocalDecl {
            name: "i".to_owned(),
            ty: JType::Int,
        };
        assert_eq!(elements.local_var(m, LocalId(1), &int), None);
    }

    #[test]
    fn test_temp_vars_are_unique() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let m = p.add_static_method(object, "m", vec![], None);
        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        let t1 = elements.new_temp_var(m, "null$", &JType::Null);
        let t2 = elements.new_temp_var(m, "null$", &JType::Null);
        assert_ne!(t1, t2);
        assert_eq!(elements.var(t1).name, "null$1");
        assert_eq!(elements.var(t2).name, "null$2");
    }
}
