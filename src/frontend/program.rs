use std::collections::HashMap;

use super::{
    opcodes, Body, ClassDecl, ClassId, FieldDecl, FieldId, Frontend, InvokeExpr, JType, LocalDecl,
    LocalId, MethodDecl, MethodId, Unit, Value,
};

/// An in-memory program.
/// Front-ends translate their own output into this form; tests build it by hand.
#[derive(Debug, Clone, Default)]
pub struct Program {
    classes: Vec<ClassDecl>,
    methods: Vec<MethodDecl>,
    fields: Vec<FieldDecl>,
    bodies: HashMap<MethodId, Body>,
    class_names: HashMap<String, ClassId>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, name: &str, superclass: Option<ClassId>) -> ClassId {
        self.push_class(ClassDecl {
            name: name.to_owned(),
            superclass,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            methods: Vec::new(),
            fields: Vec::new(),
        })
    }

    pub fn add_interface(&mut self, name: &str, superinterfaces: &[ClassId]) -> ClassId {
        self.push_class(ClassDecl {
            name: name.to_owned(),
            superclass: None,
            interfaces: superinterfaces.to_vec(),
            is_interface: true,
            is_abstract: true,
            methods: Vec::new(),
            fields: Vec::new(),
        })
    }

    pub fn push_class(&mut self, decl: ClassDecl) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.class_names.insert(decl.name.clone(), id);
        self.classes.push(decl);
        id
    }

    pub fn implement(&mut self, class: ClassId, interface: ClassId) {
        self.classes[class.0 as usize].interfaces.push(interface);
    }

    pub fn set_abstract(&mut self, class: ClassId) {
        self.classes[class.0 as usize].is_abstract = true;
    }

    pub fn add_field(&mut self, class: ClassId, name: &str, ty: JType) -> FieldId {
        self.push_field(FieldDecl {
            class,
            name: name.to_owned(),
            ty,
            is_static: false,
        })
    }

    pub fn push_field(&mut self, decl: FieldDecl) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.classes[decl.class.0 as usize].fields.push(id);
        self.fields.push(decl);
        id
    }

    /// Adds a concrete instance method.
    pub fn add_method(
        &mut self,
        class: ClassId,
        name: &str,
        param_types: Vec<JType>,
        return_type: Option<JType>,
    ) -> MethodId {
        self.push_method(MethodDecl {
            class,
            name: name.to_owned(),
            param_types,
            return_type,
            is_static: false,
            is_native: false,
            is_abstract: false,
            is_private: false,
        })
    }

    pub fn add_static_method(
        &mut self,
        class: ClassId,
        name: &str,
        param_types: Vec<JType>,
        return_type: Option<JType>,
    ) -> MethodId {
        self.push_method(MethodDecl {
            class,
            name: name.to_owned(),
            param_types,
            return_type,
            is_static: true,
            is_native: false,
            is_abstract: false,
            is_private: false,
        })
    }

    pub fn push_method(&mut self, decl: MethodDecl) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        self.classes[decl.class.0 as usize].methods.push(id);
        self.methods.push(decl);
        id
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDecl {
        &mut self.methods[id.0 as usize]
    }

    pub fn set_body(&mut self, method: MethodId, body: Body) {
        self.bodies.insert(method, body);
    }

    /// Starts a body for `method` with `this` and parameter locals bound.
    pub fn body_builder(&self, method: MethodId) -> BodyBuilder {
        BodyBuilder::new(self.method(method))
    }
}

impl Frontend for Program {
    fn class(&self, id: ClassId) -> &ClassDecl {
        &self.classes[id.0 as usize]
    }

    fn method(&self, id: MethodId) -> &MethodDecl {
        &self.methods[id.0 as usize]
    }

    fn field(&self, id: FieldId) -> &FieldDecl {
        &self.fields[id.0 as usize]
    }

    fn body(&self, id: MethodId) -> Option<&Body> {
        if self.method(id).has_body() {
            self.bodies.get(&id)
        } else {
            None
        }
    }

    fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }
}

/// Appends units to a method body in order.
pub struct BodyBuilder {
    body: Body,
}

impl BodyBuilder {
    pub fn new(decl: &MethodDecl) -> Self {
        let mut builder = Self {
            body: Body::default(),
        };
        if !decl.is_static {
            let this = builder.local("this", JType::Class(decl.class));
            builder.body.this_local = Some(this);
            builder.body.units.push(Unit::Identity { local: this });
        }
        for (i, ty) in decl.param_types.iter().enumerate() {
            let param = builder.local(&format!("arg{}", i), ty.clone());
            builder.body.param_locals.push(param);
            builder.body.units.push(Unit::Identity { local: param });
        }
        builder
    }

    pub fn local(&mut self, name: &str, ty: JType) -> LocalId {
        let id = LocalId(self.body.locals.len() as u32);
        self.body.locals.push(LocalDecl {
            name: name.to_owned(),
            ty,
        });
        id
    }

    pub fn this(&self) -> Option<LocalId> {
        self.body.this_local
    }

    pub fn param(&self, index: usize) -> LocalId {
        self.body.param_locals[index]
    }

    pub fn unit(&mut self, unit: Unit) -> &mut Self {
        self.body.units.push(unit);
        self
    }

    /// `lhs = new T()`
    pub fn new_object(&mut self, lhs: LocalId, class: ClassId) -> &mut Self {
        self.unit(Unit::Assign {
            lhs: Value::Local(lhs),
            rhs: Value::New(class),
        })
    }

    /// `lhs = rhs`
    pub fn assign(&mut self, lhs: LocalId, rhs: LocalId) -> &mut Self {
        self.unit(Unit::Assign {
            lhs: Value::Local(lhs),
            rhs: Value::Local(rhs),
        })
    }

    /// `lhs = base.field`
    pub fn load(&mut self, lhs: LocalId, base: LocalId, field: FieldId) -> &mut Self {
        self.unit(Unit::Assign {
            lhs: Value::Local(lhs),
            rhs: Value::InstanceField { base, field },
        })
    }

    /// `base.field = rhs`
    pub fn store(&mut self, base: LocalId, field: FieldId, rhs: Value) -> &mut Self {
        self.unit(Unit::Assign {
            lhs: Value::InstanceField { base, field },
            rhs,
        })
    }

    pub fn invoke(
        &mut self,
        lhs: Option<LocalId>,
        opcode: u8,
        method: MethodId,
        base: Option<LocalId>,
        args: Vec<Value>,
    ) -> &mut Self {
        let invoke = InvokeExpr {
            opcode,
            method,
            base: base.map(|b| Box::new(Value::Local(b))),
            args,
        };
        match lhs {
            Some(lhs) => self.unit(Unit::Assign {
                lhs: Value::Local(lhs),
                rhs: Value::Invoke(invoke),
            }),
            None => self.unit(Unit::Invoke(invoke)),
        }
    }

    pub fn invoke_virtual(
        &mut self,
        lhs: Option<LocalId>,
        base: LocalId,
        method: MethodId,
        args: Vec<Value>,
    ) -> &mut Self {
        self.invoke(lhs, opcodes::INVOKEVIRTUAL, method, Some(base), args)
    }

    pub fn invoke_static(
        &mut self,
        lhs: Option<LocalId>,
        method: MethodId,
        args: Vec<Value>,
    ) -> &mut Self {
        self.invoke(lhs, opcodes::INVOKESTATIC, method, None, args)
    }

    pub fn invoke_special(
        &mut self,
        lhs: Option<LocalId>,
        base: LocalId,
        method: MethodId,
        args: Vec<Value>,
    ) -> &mut Self {
        self.invoke(lhs, opcodes::INVOKESPECIAL, method, Some(base), args)
    }

    pub fn ret(&mut self, value: Option<Value>) -> &mut Self {
        self.unit(Unit::Return(value))
    }

    pub fn finish(self) -> Body {
        self.body
    }
}
