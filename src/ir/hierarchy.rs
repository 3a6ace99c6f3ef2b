use std::collections::{HashSet, VecDeque};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Elements, MethodIdx, TypeIdx};
use crate::error::{Error, Result};
use crate::frontend::{ClassId, Frontend, JType, MethodDecl, MethodId};

/// `<Class: ret name(p1,p2)>`
static SIGNATURE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<([^:<>\s]+): ([^\s(]+) ([^\s(]+)\(([^()]*)\)>$").unwrap()
});

const OBJECT_CLASS: &str = "java.lang.Object";

/// A parsed full method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub class: String,
    pub return_type: String,
    pub name: String,
    pub params: Vec<String>,
}

impl MethodSignature {
    pub fn subsignature(&self) -> String {
        format!("{} {}({})", self.return_type, self.name, self.params.join(","))
    }
}

pub fn parse_signature(signature: &str) -> Result<MethodSignature> {
    let caps = SIGNATURE_REGEX
        .captures(signature.trim())
        .ok_or_else(|| Error::MalformedSignature(signature.to_owned()))?;
    let params = caps[4]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect();
    Ok(MethodSignature {
        class: caps[1].to_owned(),
        return_type: caps[2].to_owned(),
        name: caps[3].to_owned(),
        params,
    })
}

pub(super) fn type_name(frontend: &dyn Frontend, ty: &JType) -> String {
    match ty {
        JType::Boolean => "boolean".to_owned(),
        JType::Byte => "byte".to_owned(),
        JType::Char => "char".to_owned(),
        JType::Short => "short".to_owned(),
        JType::Int => "int".to_owned(),
        JType::Long => "long".to_owned(),
        JType::Float => "float".to_owned(),
        JType::Double => "double".to_owned(),
        JType::Class(class) => frontend.class(*class).name.clone(),
        JType::Array(elem) => format!("{}[]", type_name(frontend, elem)),
        JType::Null => "null_type".to_owned(),
    }
}

pub(super) fn subsignature(frontend: &dyn Frontend, decl: &MethodDecl) -> String {
    let ret = match &decl.return_type {
        Some(ty) => type_name(frontend, ty),
        None => "void".to_owned(),
    };
    let params: Vec<String> = decl
        .param_types
        .iter()
        .map(|ty| type_name(frontend, ty))
        .collect();
    format!("{} {}({})", ret, decl.name, params.join(","))
}

impl<'p> Elements<'p> {
    /// Looks up the method a full signature names, declared directly on its class.
    pub fn resolve_method(&mut self, signature: &str) -> Result<Option<MethodIdx>> {
        let sig = parse_signature(signature)?;
        let frontend = self.frontend;
        let class = match frontend.class_by_name(&sig.class) {
            Some(class) => class,
            None => return Ok(None),
        };
        let subsig = sig.subsignature();
        let found = frontend
            .class(class)
            .methods
            .iter()
            .copied()
            .find(|&m| subsignature(frontend, frontend.method(m)) == subsig);
        Ok(found.map(|m| self.method(m)))
    }

    /// Standard virtual dispatch: the most-derived non-abstract method with
    /// `subsig` on `ty`'s superclass chain, then default methods of its interfaces.
    pub fn dispatch(&mut self, ty: TypeIdx, subsig: &str) -> Option<MethodIdx> {
        let key = (ty, subsig.to_owned());
        if let Some(cached) = self.dispatch_cache.get(&key) {
            return *cached;
        }
        let frontend = self.frontend;
        let class = match &self.types[ty.index()].jtype {
            JType::Class(class) => Some(*class),
            JType::Array(_) => frontend.class_by_name(OBJECT_CLASS),
            _ => None,
        };
        let resolved = class
            .and_then(|class| lookup(frontend, class, subsig))
            .map(|m| self.method(m));
        self.dispatch_cache.insert(key, resolved);
        resolved
    }

    /// Whether `sub` equals `sup` or inherits from it through classes or interfaces.
    pub fn is_subtype(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut visited = HashSet::new();
        let mut worklist = VecDeque::new();
        worklist.push_back(sub);
        while let Some(class) = worklist.pop_front() {
            if class == sup {
                return true;
            }
            if !visited.insert(class) {
                continue;
            }
            let decl = self.frontend.class(class);
            worklist.extend(decl.superclass);
            worklist.extend(decl.interfaces.iter().copied());
        }
        false
    }
}

fn lookup(frontend: &dyn Frontend, class: ClassId, subsig: &str) -> Option<MethodId> {
    let declares = |class: ClassId| {
        frontend.class(class).methods.iter().copied().find(|&m| {
            let decl = frontend.method(m);
            !decl.is_abstract && !decl.is_static && subsignature(frontend, decl) == subsig
        })
    };
    let mut interfaces = VecDeque::new();
    let mut current = Some(class);
    while let Some(c) = current {
        if let Some(m) = declares(c) {
            return Some(m);
        }
        let decl = frontend.class(c);
        interfaces.extend(decl.interfaces.iter().copied());
        current = decl.superclass;
    }
    let mut visited = HashSet::new();
    while let Some(interface) = interfaces.pop_front() {
        if !visited.insert(interface) {
            continue;
        }
        if let Some(m) = declares(interface) {
            return Some(m);
        }
        interfaces.extend(frontend.class(interface).interfaces.iter().copied());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Program;

    #[test]
    fn test_parse_signature() {
        let sig = parse_signature("<java.lang.System: void arraycopy(java.lang.Object,int,java.lang.Object,int,int)>").unwrap();
        assert_eq!(sig.class, "java.lang.System");
        assert_eq!(sig.return_type, "void");
        assert_eq!(sig.name, "arraycopy");
        assert_eq!(sig.params.len(), 5);
        assert_eq!(
            sig.subsignature(),
            "void arraycopy(java.lang.Object,int,java.lang.Object,int,int)"
        );
        let init = parse_signature("<A: void <init>()>").unwrap();
        assert_eq!(init.name, "<init>");
        assert!(init.params.is_empty());
    }

    #[test]
    fn test_malformed_signature() {
        for bad in &["A.foo()", "<A foo()>", "<A: foo>", ""] {
            assert!(matches!(
                parse_signature(bad),
                Err(Error::MalformedSignature(_))
            ));
        }
    }

    #[test]
    fn test_dispatch_most_derived() {
        let mut p = Program::new();
        let object = p.add_class(OBJECT_CLASS, None);
        let a = p.add_class("A", Some(object));
        let b = p.add_class("B", Some(a));
        let c = p.add_class("C", Some(b));
        let a_foo = p.add_method(a, "foo", vec![], None);
        let b_foo = p.add_method(b, "foo", vec![], None);
        let a_bar = p.add_method(a, "bar", vec![JType::Int], None);
        let mut elements = Elements::new(&p);
        let c_ty = elements.class_type(c);
        let a_ty = elements.class_type(a);
        let b_foo = elements.method(b_foo);
        let a_foo = elements.method(a_foo);
        let a_bar = elements.method(a_bar);
        assert_eq!(elements.dispatch(c_ty, "void foo()"), Some(b_foo));
        assert_eq!(elements.dispatch(a_ty, "void foo()"), Some(a_foo));
        assert_eq!(elements.dispatch(c_ty, "void bar(int)"), Some(a_bar));
        assert_eq!(elements.dispatch(c_ty, "void baz()"), None);
        assert!(elements.is_subtype(c, a));
        assert!(!elements.is_subtype(a, c));
    }

    #[test]
    fn test_dispatch_default_method() {
        let mut p = Program::new();
        let object = p.add_class(OBJECT_CLASS, None);
        let i = p.add_interface("I", &[]);
        let j = p.add_interface("J", &[i]);
        let k = p.add_class("K", Some(object));
        p.implement(k, j);
        let i_run = p.add_method(i, "run", vec![], None);
        let mut elements = Elements::new(&p);
        let k_ty = elements.class_type(k);
        let i_run = elements.method(i_run);
        assert_eq!(elements.dispatch(k_ty, "void run()"), Some(i_run));
    }

    #[test]
    fn test_resolve_method() {
        let mut p = Program::new();
        let object = p.add_class(OBJECT_CLASS, None);
        let a = p.add_class("A", Some(object));
        let id = p.add_method(a, "id", vec![JType::Class(object)], Some(JType::Class(object)));
        let mut elements = Elements::new(&p);
        let expected = elements.method(id);
        assert_eq!(
            elements
                .resolve_method("<A: java.lang.Object id(java.lang.Object)>")
                .unwrap(),
            Some(expected)
        );
        assert_eq!(elements.resolve_method("<A: void missing()>").unwrap(), None);
        assert_eq!(elements.resolve_method("<Missing: void id()>").unwrap(), None);
        assert_eq!(elements.method_data(expected).signature, "<A: java.lang.Object id(java.lang.Object)>");
    }
}
