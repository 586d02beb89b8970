//! Strings, arrays, numbers, serialization and introspection natives

use super::Session;
use core_types::Value;
use proptest::prelude::*;

#[test]
fn test_length_of_each_kind() {
    let mut s = Session::new();
    assert_eq!(s.show("return [length('héllo'), length([1, 2]), length({a: 1})];"), "[5,2,1]");
    assert!(s.error("return length(3);").contains("length"));
    assert!(s.error("return length();").contains("expected 1 argument"));
}

#[test]
fn test_tostring_and_todump() {
    let mut s = Session::new();
    assert_eq!(s.run("return tostring([1, 'a', null]);"), Value::from("[1,'a',null]"));
    assert_eq!(s.run("return todump('a\\nb');"), Value::from("'a\\nb'"));
    assert_eq!(s.run("return tostring('plain');"), Value::from("plain"));
}

#[test]
fn test_json_round_trip() {
    let mut s = Session::new();
    let text = s.run("let v = fromjson('{\"b\": [1, 2.5, \"x\"], \"a\": null}'); return tojson(v);");
    assert_eq!(text, Value::from(r#"{"b":[1,2.5,"x"],"a":null}"#));
    assert!(s.error("return fromjson('{');").contains("Invalid JSON"));
    assert!(s.error("return tojson(print);").contains("cannot serialize"));
}

#[test]
fn test_deeply_nested_values_serialize_safely() {
    let mut s = Session::new();
    let build = "let a = []; for (let i = 0; i < 200000; i++) { a = [a]; }";
    let shown = s.run(&format!("{} return length(tostring(a)) + length(todump(a));", build));
    assert_eq!(shown, Value::Number(800_002.0));
    let mut s = Session::new();
    let caught = s.run(&format!(
        "{} try {{ tojson(a); }} catch (e) {{ return [e.name, startswith(e.message, 'tojson')]; }}",
        build
    ));
    assert_eq!(s.vm.display(&caught), "['RangeError',true]");
    assert_eq!(s.run("return tojson([[[1]]]);"), Value::from("[[[1]]]"));
}

#[test]
fn test_string_case_and_affixes() {
    let mut s = Session::new();
    assert_eq!(s.show("return [toupper('abc'), tolower('DeF')];"), "['ABC','def']");
    assert_eq!(s.run("return startswith('banana', 'x', 'ba');"), Value::Boolean(true));
    assert_eq!(s.run("return endswith('banana', 'x', 'y');"), Value::Boolean(false));
}

#[test]
fn test_split_and_join() {
    let mut s = Session::new();
    assert_eq!(s.show("return split('a--b--', '--');"), "['a','b','']");
    assert_eq!(s.show("return split('abc');"), "['abc']");
    assert_eq!(s.run("return join(split('x y z', ' '), '+');"), Value::from("x+y+z"));
    assert!(s.error("return join([1, 2], ',');").contains("must be a string"));
}

#[test]
fn test_format_placeholders() {
    let mut s = Session::new();
    assert_eq!(
        s.run("let name = 'Ada'; return format('${0} ${name}, ${1}!', 'hi', [1]);"),
        Value::from("hi Ada, [1]!")
    );
    assert_eq!(s.run("return format('cost: $5');"), Value::from("cost: $5"));
    assert!(s.error("return format('${nobody}');").starts_with("ReferenceError"));
}

#[test]
fn test_match_returns_groups() {
    let mut s = Session::new();
    assert_eq!(s.show("return match('v1.22', '^v(\\\\d+)\\\\.(\\\\d+)$');"), "['v1.22','1','22']");
    assert_eq!(s.run("return match('abc', '\\\\d');"), Value::Null);
    assert!(s.error("return match('abc', '(');").contains("Invalid regular expression"));
}

#[test]
fn test_push_and_pop() {
    let mut s = Session::new();
    assert_eq!(s.show("let a = [1]; let r = push(a, 2, 3); return [r, pop(a), a];"), "[null,3,[1,2]]");
    assert!(s.error("return pop([]);").starts_with("RangeError"));
}

#[test]
fn test_sort_with_comparator_is_stable() {
    let mut s = Session::new();
    let source = r#"
        let people = [{n: "b", age: 2}, {n: "a", age: 1}, {n: "c", age: 2}, {n: "d", age: 1}];
        sort(people, function(x, y) { return x.age - y.age; });
        return map(people, function(p) { return p.n; });
    "#;
    assert_eq!(s.show(source), "['a','d','b','c']");
}

#[test]
fn test_sort_comparator_errors_propagate() {
    let mut s = Session::new();
    assert!(s
        .error("return sort([2, 1], function(a, b) { return true; });")
        .contains("comparator must return a number"));
    let caught = s.run(
        "try { sort([2, 1], function(a, b) { throw 'stop'; }); } catch (e) { return e; }",
    );
    assert_eq!(caught, Value::from("stop"));
}

#[test]
fn test_filter_map_reduce() {
    let mut s = Session::new();
    let source = r#"
        let xs = [1, 2, 3, 4, 5];
        let evens = filter(xs, function(x) { return x % 2 == 0; });
        let squares = map(evens, function(x) { return x * x; });
        return [squares, reduce(squares, function(acc, v) { return acc + v; }), reduce([], function(a, b) { return a; })];
    "#;
    assert_eq!(s.show(source), "[[4,16],20,null]");
    assert_eq!(s.run("return reduce([1, 2], function(a, b) { return a + b; }, 10);"), Value::Number(13.0));
    assert!(s
        .error("return filter([1], function(x) { return 1; });")
        .contains("predicate must return boolean"));
}

#[test]
fn test_natural_compare() {
    let mut s = Session::new();
    let source = r#"
        let files = ["f10", "f2", "f1"];
        sort(files, natural_compare);
        return files;
    "#;
    assert_eq!(s.show(source), "['f1','f2','f10']");
}

#[test]
fn test_rounding_functions() {
    let mut s = Session::new();
    assert_eq!(
        s.show("return [floor(-1.5), ceil(-1.5), round(2.5), trunc(-2.7), modf(3.25)];"),
        "[-2,-1,3,-2,[3,0.25]]"
    );
    assert_eq!(s.run("return tonumber('1e3');"), Value::Number(1000.0));
    assert!(s.error("return tonumber('12abc');").contains("not a valid number"));
}

#[test]
fn test_gc_reports_freed_objects() {
    let mut s = Session::new();
    let freed = s.run("function f() { let t = [[1], [2]]; } f(); return gc();");
    assert!(matches!(freed, Value::Number(n) if n >= 3.0));
}

#[test]
fn test_dump_writes_state() {
    let mut s = Session::new();
    s.run("let marker = 'here'; dump();");
    let text = s.output.text();
    assert!(text.contains("frames:"));
    assert!(text.contains("marker = 'here'"));
}

#[test]
fn test_callbacks_survive_gc_stress() {
    use interpreter::VmConfig;
    use memory_manager::GcConfig;

    let mut s = Session::new();
    s.vm = interpreter::Vm::with_config(VmConfig::default().with_gc(GcConfig::default().with_stress(true)));
    builtins::install(&mut s.vm, &[]);
    let source = r#"
        let xs = [];
        for (let i = 0; i < 30; i++) { xs[i] = {v: 30 - i}; }
        let ys = map(xs, function(o) { return [o.v, {w: o.v}]; });
        sort(ys, function(a, b) { return a[0] - b[0]; });
        return reduce(map(ys, function(p) { return p[1].w; }), function(a, b) { return a * 0 + b; });
    "#;
    assert_eq!(s.run(source), Value::Number(30.0));
}

proptest! {
    #[test]
    fn prop_sort_orders_numbers(xs in prop::collection::vec(-1000i32..1000, 0..40)) {
        let mut s = Session::new();
        let list = xs.iter().map(i32::to_string).collect::<Vec<_>>().join(", ");
        let result = s.run(&format!("return sort([{}], function(a, b) {{ return a - b; }});", list));
        let mut expected = xs.clone();
        expected.sort();
        let expected: Vec<Value> = expected.into_iter().map(|n| Value::Number(f64::from(n))).collect();
        prop_assert_eq!(s.vm.array_elements(&result).unwrap(), expected);
    }

    #[test]
    fn prop_split_join_inverse(parts in prop::collection::vec("[a-z]{0,4}", 1..6)) {
        let mut s = Session::new();
        let text = parts.join(",");
        let result = s.run(&format!("return join(split('{}', ','), ',');", text));
        prop_assert_eq!(result, Value::from(text));
    }
}
