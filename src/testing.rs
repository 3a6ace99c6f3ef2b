//! Small programs shared by the unit tests.

use crate::frontend::{JType, Program, Value};
use crate::ir::{FieldIdx, Stmt};
use crate::pointer_analysis::AnalysisState;

pub(crate) const MAIN: &str = "<Main: void main()>";

/// ```text
/// class A { Object f; Object foo(); void set(Object); Object get(); A self(); }
/// class B extends A { Object foo(); }
/// class C extends A {}
/// ```
/// `Main` holds one static entry per scenario; every allocation is assigned
/// to a variable with a name unique in the program.
pub(crate) fn zoo() -> Program {
    let mut p = Program::new();
    let object = p.add_class("java.lang.Object", None);
    let a = p.add_class("A", Some(object));
    let b = p.add_class("B", Some(a));
    let c = p.add_class("C", Some(a));
    let main = p.add_class("Main", Some(object));
    let obj = JType::Class(object);
    let f = p.add_field(a, "f", obj.clone());

    let a_foo = p.add_method(a, "foo", vec![], Some(obj.clone()));
    let mut body = p.body_builder(a_foo);
    let r = body.local("fooA", obj.clone());
    body.new_object(r, object).ret(Some(Value::Local(r)));
    p.set_body(a_foo, body.finish());

    let b_foo = p.add_method(b, "foo", vec![], Some(obj.clone()));
    let mut body = p.body_builder(b_foo);
    let r = body.local("fooB", obj.clone());
    body.new_object(r, b).ret(Some(Value::Local(r)));
    p.set_body(b_foo, body.finish());

    let set = p.add_method(a, "set", vec![obj.clone()], None);
    let mut body = p.body_builder(set);
    let (this, v) = (body.this().unwrap(), body.param(0));
    body.store(this, f, Value::Local(v)).ret(None);
    p.set_body(set, body.finish());

    let get = p.add_method(a, "get", vec![], Some(obj.clone()));
    let mut body = p.body_builder(get);
    let this = body.this().unwrap();
    let got = body.local("got", obj.clone());
    body.load(got, this, f).ret(Some(Value::Local(got)));
    p.set_body(get, body.finish());

    let a_self = p.add_method(a, "self", vec![], Some(JType::Class(a)));
    let mut body = p.body_builder(a_self);
    let this = body.this().unwrap();
    body.ret(Some(Value::Local(this)));
    p.set_body(a_self, body.finish());

    let id = p.add_static_method(main, "id", vec![obj.clone()], Some(obj.clone()));
    let mut body = p.body_builder(id);
    let arg = body.param(0);
    body.ret(Some(Value::Local(arg)));
    p.set_body(id, body.finish());

    let lp = p.add_static_method(main, "loop", vec![obj.clone()], Some(obj.clone()));
    let mut body = p.body_builder(lp);
    let arg = body.param(0);
    let q = body.local("q", obj.clone());
    body.invoke_static(Some(q), lp, vec![Value::Local(arg)])
        .ret(Some(Value::Local(arg)));
    p.set_body(lp, body.finish());

    // a = objB; a = objC; r = a.foo(); o = new Object; a.set(o); g = a.get(); s = id(o)
    let entry = p.add_static_method(main, "main", vec![], None);
    let mut body = p.body_builder(entry);
    let local_a = body.local("a", JType::Class(a));
    let (obj_b, obj_c) = (body.local("objB", JType::Class(b)), body.local("objC", JType::Class(c)));
    let (r, o, g, s) = (
        body.local("r", obj.clone()),
        body.local("o", obj.clone()),
        body.local("g", obj.clone()),
        body.local("s", obj.clone()),
    );
    body.new_object(obj_b, b)
        .new_object(obj_c, c)
        .assign(local_a, obj_b)
        .assign(local_a, obj_c)
        .invoke_virtual(Some(r), local_a, a_foo, vec![])
        .new_object(o, object)
        .invoke_virtual(None, local_a, set, vec![Value::Local(o)])
        .invoke_virtual(Some(g), local_a, get, vec![])
        .invoke_static(Some(s), id, vec![Value::Local(o)])
        .ret(None);
    p.set_body(entry, body.finish());

    let unreachable = p.add_static_method(main, "unreachable", vec![], None);
    let mut body = p.body_builder(unreachable);
    let u = body.local("u", obj.clone());
    body.new_object(u, object).ret(None);
    p.set_body(unreachable, body.finish());

    // sb = new B; ss = sb.<A: A self()>(); sf = sb.<A: Object foo()>(), both invokespecial
    let special = p.add_static_method(main, "special", vec![], None);
    let mut body = p.body_builder(special);
    let sb = body.local("sb", JType::Class(b));
    let ss = body.local("ss", JType::Class(a));
    let sf = body.local("sf", obj.clone());
    body.new_object(sb, b)
        .invoke_special(Some(ss), sb, a_self, vec![])
        .invoke_special(Some(sf), sb, a_foo, vec![])
        .ret(None);
    p.set_body(special, body.finish());

    // bo = new Object; br = bo.<A: Object foo()>()
    let bad = p.add_static_method(main, "bad", vec![], None);
    let mut body = p.body_builder(bad);
    let bo = body.local("bo", JType::Class(a));
    let br = body.local("br", obj.clone());
    body.new_object(bo, object)
        .invoke_virtual(Some(br), bo, a_foo, vec![])
        .ret(None);
    p.set_body(bad, body.finish());

    // lo = new Object; lr = loop(lo)
    let recursive = p.add_static_method(main, "recursive", vec![], None);
    let mut body = p.body_builder(recursive);
    let lo = body.local("lo", obj.clone());
    let lr = body.local("lr", obj.clone());
    body.new_object(lo, object)
        .invoke_static(Some(lr), lp, vec![Value::Local(lo)])
        .ret(None);
    p.set_body(recursive, body.finish());

    // o1 = new Object; o2 = new Object; s1 = id(o1); s2 = id(o2)
    let twice = p.add_static_method(main, "twice", vec![], None);
    let mut body = p.body_builder(twice);
    let (o1, o2) = (body.local("o1", obj.clone()), body.local("o2", obj.clone()));
    let (s1, s2) = (body.local("s1", obj.clone()), body.local("s2", obj));
    body.new_object(o1, object)
        .new_object(o2, object)
        .invoke_static(Some(s1), id, vec![Value::Local(o1)])
        .invoke_static(Some(s2), id, vec![Value::Local(o2)])
        .ret(None);
    p.set_body(twice, body.finish());

    p
}

/// Names of the variables that received the objects `var` of `method` points to.
pub(crate) fn pts_names(state: &AnalysisState<'_>, method: &str, var: &str) -> Vec<String> {
    let elements = state.elements();
    let m = elements.find_method(method).unwrap();
    let v = elements.var_by_name(m, var).unwrap();
    let mut names: Vec<String> = state
        .points_to_var(v)
        .into_iter()
        .map(|o| match elements.stmt(state.obj(o).alloc).stmt {
            Stmt::Allocation { lhs, .. } => elements.var(lhs).name.clone(),
            ref other => panic!("{:?} is not an allocation", other),
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

pub(crate) fn reachable_signatures(state: &AnalysisState<'_>) -> Vec<String> {
    let mut signatures: Vec<String> = state
        .reachable_methods()
        .into_iter()
        .map(|m| state.elements().method_data(m).signature.clone())
        .collect();
    signatures.sort();
    signatures
}

pub(crate) fn field_named(state: &AnalysisState<'_>, name: &str) -> FieldIdx {
    let elements = state.elements();
    (0..elements.num_fields())
        .map(|i| FieldIdx(i as u32))
        .find(|&f| elements.field_data(f).name == name)
        .unwrap()
}
