//! Translation of one external method body into IR statements.

use log::{trace, warn};

use super::{Elements, MethodIdx, Stmt, VarIdx};
use crate::callgraph::classify;
use crate::error::{Error, Result};
use crate::frontend::{Body, InvokeExpr, JType, LocalId, MethodDecl, Unit, Value};

pub(super) fn build(elements: &mut Elements<'_>, method: MethodIdx) -> Result<()> {
    let frontend = elements.frontend;
    let id = elements.method_data(method).decl;
    let decl = frontend.method(id);
    match frontend.body(id) {
        Some(body) => MethodBuilder {
            elements,
            method,
            body,
        }
        .build_concrete(),
        None => {
            if decl.has_body() {
                warn!(
                    "no body available for {}, treating it as opaque",
                    elements.method_data(method).signature
                );
            }
            build_opaque(elements, method, decl);
            Ok(())
        }
    }
}

/// Native and abstract methods: synthesized `this`, parameters and return
/// variable, no statements.
fn build_opaque(elements: &mut Elements<'_>, method: MethodIdx, decl: &MethodDecl) {
    if !decl.is_static {
        let this = elements.new_var(method, "@this", &JType::Class(decl.class));
        elements.method_mut(method).this = Some(this);
    }
    let params: Vec<_> = decl
        .param_types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            if ty.is_reference() {
                Some(elements.new_var(method, &format!("@parameter{}", i), ty))
            } else {
                None
            }
        })
        .collect();
    elements.method_mut(method).params = params;
    if let Some(ret) = decl.return_type.as_ref().filter(|ty| ty.is_reference()) {
        let ret = elements.new_var(method, "@return", ret);
        elements.method_mut(method).ret_vars.push(ret);
    }
}

struct MethodBuilder<'a, 'p> {
    elements: &'a mut Elements<'p>,
    method: MethodIdx,
    body: &'p Body,
}

impl<'a, 'p> MethodBuilder<'a, 'p> {
    fn build_concrete(mut self) -> Result<()> {
        let body = self.body;
        if let Some(this) = body.this_local {
            let this = self.local(this)?;
            self.elements.method_mut(self.method).this = this;
        }
        let params = body
            .param_locals
            .iter()
            .map(|&p| self.local(p))
            .collect::<Result<Vec<_>>>()?;
        self.elements.method_mut(self.method).params = params;
        for unit in &body.units {
            match unit {
                Unit::Assign { lhs, rhs } => self.build_assign(lhs, rhs)?,
                Unit::Invoke(invoke) => self.build_call(invoke, None)?,
                Unit::Return(Some(value)) => self.build_return(value)?,
                // parameters are bound above; caught exceptions and throws are not modeled
                Unit::Identity { .. } | Unit::Throw(_) => {}
                Unit::Return(None) | Unit::Goto(_) | Unit::If { .. } | Unit::Nop => {}
            }
        }
        Ok(())
    }

    /// The variable of a front-end local; `None` for non-reference locals.
    fn local(&mut self, local: LocalId) -> Result<Option<VarIdx>> {
        let body = self.body;
        let decl = body
            .local(local)
            .ok_or_else(|| self.cannot_handle(&Value::Local(local)))?;
        Ok(self.elements.local_var(self.method, local, decl))
    }

    /// Converts an operand to a variable.
    /// `null` becomes a fresh temporary; non-reference values and string/class
    /// constants have no variable.
    fn operand(&mut self, value: &Value) -> Result<Option<VarIdx>> {
        match value {
            Value::Local(local) => self.local(*local),
            Value::Null => Ok(Some(self.elements.new_temp_var(
                self.method,
                "null$",
                &JType::Null,
            ))),
            Value::IntConst(_) | Value::LongConst(_) | Value::DoubleConst(_) => Ok(None),
            Value::StringConst(_) | Value::ClassConst(_) => {
                trace!("skipping constant operand {}", value.describe());
                Ok(None)
            }
            _ => Err(self.cannot_handle(value)),
        }
    }

    fn cannot_handle(&self, value: &Value) -> Error {
        Error::IrConstruction {
            value: value.describe(),
            method: self.elements.method_data(self.method).signature.clone(),
        }
    }

    fn base(&mut self, base: LocalId) -> Result<VarIdx> {
        self.local(base)?
            .ok_or_else(|| self.cannot_handle(&Value::Local(base)))
    }

    fn build_assign(&mut self, lhs: &Value, rhs: &Value) -> Result<()> {
        match lhs {
            Value::Local(local) => {
                let lhs = self.local(*local)?;
                match rhs {
                    // x = new T()
                    Value::New(class) => {
                        if let Some(lhs) = lhs {
                            let ty = self.elements.class_type(*class);
                            self.add(Stmt::Allocation { lhs, ty });
                        }
                    }
                    // x = y
                    Value::Local(rhs) => {
                        if let (Some(lhs), Some(rhs)) = (lhs, self.local(*rhs)?) {
                            self.add(Stmt::Assign { lhs, rhs });
                        }
                    }
                    // x = y.f
                    Value::InstanceField { base, field } => {
                        let base = self.base(*base)?;
                        if let Some(lhs) = lhs {
                            let field = self.elements.field(*field);
                            self.add(Stmt::InstanceLoad { lhs, base, field });
                        }
                    }
                    // x = o.m()
                    Value::Invoke(invoke) => self.build_call(invoke, lhs)?,
                    // x = (T) y, x = new T[], x = y[i], x = T.f, x = "x", x = null, ...
                    _ => self.skip(rhs),
                }
            }
            // x.f = y
            Value::InstanceField { base, field } => {
                let base = self.base(*base)?;
                if let Some(rhs) = self.operand(rhs)? {
                    let field = self.elements.field(*field);
                    self.add(Stmt::InstanceStore { base, field, rhs });
                }
            }
            // T.f = x, x[i] = y
            Value::StaticField(_) | Value::ArrayElement { .. } => self.skip(lhs),
            _ => return Err(self.cannot_handle(lhs)),
        }
        Ok(())
    }

    fn build_call(&mut self, invoke: &InvokeExpr, lhs: Option<VarIdx>) -> Result<()> {
        let kind = classify(invoke).ok_or_else(|| Error::Classification {
            invoke: invoke.to_string(),
            opcode: invoke.opcode,
            method: self.elements.method_data(self.method).signature.clone(),
        })?;
        let target = self.elements.method(invoke.method);
        let receiver = match &invoke.base {
            Some(base) => self.operand(base)?,
            None => None,
        };
        let args = invoke
            .args
            .iter()
            .map(|arg| self.operand(arg))
            .collect::<Result<Vec<_>>>()?;
        self.elements
            .add_call(self.method, kind, target, receiver, args, lhs, false);
        Ok(())
    }

    fn build_return(&mut self, value: &Value) -> Result<()> {
        let frontend = self.elements.frontend;
        let decl = frontend.method(self.elements.method_data(self.method).decl);
        if decl.return_type.as_ref().map_or(false, JType::is_reference) {
            if let Some(ret) = self.operand(value)? {
                let ret_vars = &mut self.elements.method_mut(self.method).ret_vars;
                if !ret_vars.contains(&ret) {
                    ret_vars.push(ret);
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, stmt: Stmt) {
        self.elements.add_stmt(self.method, stmt, false);
    }

    fn skip(&self, value: &Value) {
        trace!(
            "unsupported value {} in {}, skipped",
            value.describe(),
            self.elements.method_data(self.method).signature
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::Stmt;
    use crate::callgraph::CallKind;
    use crate::error::Error;
    use crate::frontend::{opcodes, InvokeExpr, JType, LocalId, Program, Unit, Value};
    use crate::ir::Elements;
    use test_log::test;

    #[test]
    fn test_build_statements() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let a = p.add_class("A", Some(object));
        let f = p.add_field(a, "f", JType::Class(object));
        let callee = p.add_method(a, "id", vec![JType::Class(object), JType::Int], Some(JType::Class(object)));
        let m = p.add_static_method(a, "main", vec![], Some(JType::Class(object)));
        let mut b = p.body_builder(m);
        let x = b.local("x", JType::Class(a));
        let y = b.local("y", JType::Class(object));
        let z = b.local("z", JType::Class(object));
        let i = b.local("i", JType::Int);
        b.new_object(x, a)
            .store(x, f, Value::Local(x))
            .load(y, x, f)
            .assign(z, y)
            .invoke_virtual(Some(z), x, callee, vec![Value::Null, Value::Local(i)])
            .unit(Unit::Assign {
                lhs: Value::StaticField(f),
                rhs: Value::Local(x),
            })
            .unit(Unit::Assign {
                lhs: Value::Local(y),
                rhs: Value::StringConst("s".to_owned()),
            })
            .ret(Some(Value::Local(z)));
        let body = b.finish();
        p.set_body(m, body);

        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        let method = elements.ir(m).unwrap().clone();
        assert_eq!(method.stmts.len(), 5);
        assert_eq!(method.ret_vars.len(), 1);
        assert_eq!(method.call_sites.len(), 1);
        let kinds: Vec<&str> = method
            .stmts
            .iter()
            .map(|s| match elements.stmt(*s).stmt {
                Stmt::Allocation { .. } => "alloc",
                Stmt::Assign { .. } => "assign",
                Stmt::InstanceLoad { .. } => "load",
                Stmt::InstanceStore { .. } => "store",
                Stmt::Call { .. } => "call",
            })
            .collect();
        assert_eq!(kinds, ["alloc", "store", "load", "assign", "call"]);

        let site = elements.call_site(method.call_sites[0]).clone();
        assert_eq!(site.kind, CallKind::Virtual);
        assert_eq!(site.args.len(), 2);
        assert!(site.args[0].is_some());
        assert_eq!(site.args[1], None);
        assert_eq!(elements.var(site.args[0].unwrap()).name, "null$1");
        assert_eq!(elements.call_result(method.call_sites[0]), elements.var_by_name(m, "z"));

        // the load, store and call are registered against their base/receiver
        let x = site.receiver.unwrap();
        assert_eq!(elements.var(x).loads.len(), 1);
        assert_eq!(elements.var(x).stores.len(), 1);
        assert_eq!(elements.var(x).calls.len(), 1);
    }

    #[test]
    fn test_build_is_memoized() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let m = p.add_static_method(object, "main", vec![], None);
        let mut b = p.body_builder(m);
        let x = b.local("x", JType::Class(object));
        b.new_object(x, object);
        let body = b.finish();
        p.set_body(m, body);
        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        assert!(!elements.is_built(m));
        assert_eq!(elements.ir(m).unwrap().stmts.len(), 1);
        assert_eq!(elements.ir(m).unwrap().stmts.len(), 1);
        assert_eq!(elements.num_stmts(), 1);
    }

    #[test]
    fn test_native_method_variables() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let clone = p.add_method(object, "clone", vec![JType::Class(object), JType::Int], Some(JType::Class(object)));
        p.method_mut(clone).is_native = true;
        let hash = p.add_method(object, "hashCode", vec![], Some(JType::Int));
        p.method_mut(hash).is_native = true;
        let mut elements = Elements::new(&p);
        let clone = elements.method(clone);
        let method = elements.ir(clone).unwrap().clone();
        assert!(method.this.is_some());
        assert!(method.params[0].is_some());
        assert!(method.params[1].is_none());
        assert_eq!(method.ret_vars.len(), 1);
        assert!(method.stmts.is_empty());
        let hash = elements.method(hash);
        assert!(elements.ir(hash).unwrap().ret_vars.is_empty());
    }

    #[test]
    fn test_unrecognized_operand_fails() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let callee = p.add_static_method(object, "use", vec![JType::Class(object)], None);
        let m = p.add_static_method(object, "main", vec![], None);
        let mut b = p.body_builder(m);
        b.invoke_static(None, callee, vec![Value::New(object)]);
        let body = b.finish();
        p.set_body(m, body);
        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        match elements.ir(m) {
            Err(Error::IrConstruction { value, method }) => {
                assert_eq!(value, "new class#0");
                assert_eq!(method, "<java.lang.Object: void main()>");
            }
            other => panic!("unexpected result: {:?}", other.map(|m| m.signature.clone())),
        }
    }

    #[test]
    fn test_unrecognized_invoke_fails() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let callee = p.add_static_method(object, "f", vec![], None);
        let m = p.add_static_method(object, "main", vec![], None);
        let mut b = p.body_builder(m);
        b.unit(Unit::Invoke(InvokeExpr {
            opcode: 0x01,
            method: callee,
            base: None,
            args: vec![],
        }));
        b.invoke(None, opcodes::INVOKESTATIC, callee, None, vec![]);
        let body = b.finish();
        p.set_body(m, body);
        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        assert!(matches!(
            elements.ir(m),
            Err(Error::Classification { opcode: 0x01, .. })
        ));
    }

    #[test]
    fn test_casts_are_skipped() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let m = p.add_static_method(object, "main", vec![], None);
        let mut b = p.body_builder(m);
        let x = b.local("x", JType::Class(object));
        let y = b.local("y", JType::Class(object));
        b.new_object(x, object).unit(Unit::Assign {
            lhs: Value::Local(y),
            rhs: Value::Cast {
                ty: JType::Class(object),
                value: Box::new(Value::Local(x)),
            },
        });
        let body = b.finish();
        p.set_body(m, body);
        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        let stmts = elements.ir(m).unwrap().stmts.clone();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(elements.stmt(stmts[0]).stmt, Stmt::Allocation { .. }));
    }

    #[test]
    fn test_undeclared_local_fails() {
        let mut p = Program::new();
        let object = p.add_class("java.lang.Object", None);
        let m = p.add_static_method(object, "main", vec![], None);
        let mut b = p.body_builder(m);
        let x = b.local("x", JType::Class(object));
        b.new_object(x, object).unit(Unit::Assign {
            lhs: Value::Local(x),
            rhs: Value::Local(LocalId(7)),
        });
        let body = b.finish();
        p.set_body(m, body);
        let mut elements = Elements::new(&p);
        let m = elements.method(m);
        match elements.ir(m) {
            Err(Error::IrConstruction { value, method }) => {
                assert_eq!(value, "local#7");
                assert_eq!(method, "<java.lang.Object: void main()>");
            }
            other => panic!("unexpected result: {:?}", other.map(|m| m.signature.clone())),
        }
    }
}
