//! Contract tests for the interpreter API
//!
//! These pin the observable laws of the runtime: parameter binding, rest
//! collection, sparse arrays, key retention, and bind-operator chaining.

use core_types::Value;
use interpreter::{Exception, FromValue, IntoValue, Vm};
use parser::CompileOptions;
use proptest::prelude::*;

fn run_in(vm: &mut Vm, source: &str) -> Value {
    let proto = parser::compile(source, CompileOptions::default()).expect("compile");
    vm.run(proto).expect("run")
}

/// `Vm::run()` returns the script's top-level return value
#[test]
fn test_vm_run_contract() {
    let mut vm = Vm::new();
    assert_eq!(run_in(&mut vm, "return 6 * 7;"), Value::Number(42.0));
}

/// `Vm::call_value()` calls script functions stored in globals
#[test]
fn test_vm_call_value_contract() {
    let mut vm = Vm::new();
    run_in(&mut vm, "function greet(name) { return \"hi \" + name; }");
    let greet = vm.get_global("greet").unwrap();
    let result = vm.call_value(&greet, &[Value::from("bob")]).unwrap();
    assert_eq!(result, Value::from("hi bob"));
}

/// A throw inside `call_value` comes back as `Exception::Throw`
#[test]
fn test_vm_call_value_throw_contract() {
    let mut vm = Vm::new();
    run_in(&mut vm, "function bad() { throw \"no\"; }");
    let bad = vm.get_global("bad").unwrap();
    match vm.call_value(&bad, &[]) {
        Err(Exception::Throw(value)) => assert_eq!(value, Value::from("no")),
        other => panic!("expected a throw, got {:?}", other),
    }
    assert_eq!(vm.call_depth(), 0);
}

/// Natives are ordinary callable values
#[test]
fn test_register_native_contract() {
    fn count(_vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
        Ok(Value::Number(args.len() as f64))
    }
    let mut vm = Vm::new();
    vm.register_native("count", count);
    assert_eq!(run_in(&mut vm, "return count(1, 2, ...[3, 4]);"), Value::Number(4.0));
    assert_eq!(run_in(&mut vm, "return typeof count;"), Value::from("function"));
}

/// Marshalling round trip through the bridge traits
#[test]
fn test_marshalling_contract() {
    let mut vm = Vm::new();
    let value = vec!["a".to_string(), "b".to_string()].into_value(&mut vm);
    assert_eq!(
        Vec::<String>::from_value(&vm, &value),
        Some(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(bool::from_value(&vm, &Value::Number(1.0)), None);
    assert_eq!(7usize.into_value(&mut vm), Value::Number(7.0));
}

/// `collect_garbage()` keeps everything reachable from globals
#[test]
fn test_collect_garbage_contract() {
    let mut vm = Vm::new();
    run_in(&mut vm, "let keep = [[1], {a: [2]}]; function f() { let tmp = [3]; }");
    run_in(&mut vm, "f(); f();");
    let report = vm.collect_garbage();
    assert!(report.freed >= 2);
    assert_eq!(
        run_in(&mut vm, "return keep[1].a[0] + keep[0][0];"),
        Value::Number(3.0)
    );
}

proptest! {
    #[test]
    fn prop_sparse_array_fills_with_null(index in 0usize..64) {
        let mut vm = Vm::new();
        let result = run_in(&mut vm, &format!("let a = []; a[{}] = true; return a;", index));
        let items = vm.array_elements(&result).unwrap();
        prop_assert_eq!(items.len(), index + 1);
        prop_assert!(items[..index].iter().all(Value::is_null));
        prop_assert_eq!(&items[index], &Value::Boolean(true));
    }

    #[test]
    fn prop_default_applies_only_to_missing_or_null(arg in prop::option::of(-1000i32..1000)) {
        let mut vm = Vm::new();
        let call = match arg {
            Some(n) => format!("f({})", n),
            None => "f(null)".to_string(),
        };
        let source = format!("function f(a = 99) {{ return a; }} return {};", call);
        let expected = arg.map_or(99.0, f64::from);
        prop_assert_eq!(run_in(&mut vm, &source), Value::Number(expected));
    }

    #[test]
    fn prop_rest_takes_trailing_arguments(args in prop::collection::vec(0u8..100, 0..8), fixed in 0usize..3) {
        let mut vm = Vm::new();
        let params: Vec<String> = (0..fixed).map(|i| format!("p{}", i)).collect();
        let mut list = params.clone();
        list.push("...rest".to_string());
        let source = format!(
            "function f({}) {{ return rest; }} return f(...[{}]);",
            list.join(", "),
            args.iter().map(u8::to_string).collect::<Vec<_>>().join(", ")
        );
        let result = run_in(&mut vm, &source);
        let expected: Vec<Value> = args.iter().skip(fixed).map(|n| Value::Number(f64::from(*n))).collect();
        prop_assert_eq!(vm.array_elements(&result).unwrap(), expected);
    }

    #[test]
    fn prop_null_assignment_retains_keys(keys in prop::collection::btree_set("[a-z]{1,6}", 1..6)) {
        let mut vm = Vm::new();
        let mut source = String::from("let o = {};");
        for key in &keys {
            source.push_str(&format!(" o[\"{}\"] = 1;", key));
        }
        for key in &keys {
            source.push_str(&format!(" o[\"{}\"] = null;", key));
        }
        source.push_str(" return o;");
        let result = run_in(&mut vm, &source);
        let found: Vec<String> = vm.object_entries(&result).unwrap().into_iter().map(|(k, _)| k.to_string()).collect();
        let expected: Vec<String> = keys.iter().cloned().collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_bind_chain_matches_nested_calls(x in -50i32..50, y in -50i32..50) {
        let mut vm = Vm::new();
        let source = format!(
            "function f(a, b) {{ return a * 3 + b; }} function g(a) {{ return a - 1; }} \
             return [({x})::f({y})::g(), g(f({x}, {y}))];",
            x = x,
            y = y
        );
        let result = run_in(&mut vm, &source);
        let pair = vm.array_elements(&result).unwrap();
        prop_assert_eq!(&pair[0], &pair[1]);
    }
}
