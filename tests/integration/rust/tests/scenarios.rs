//! The behavioural scenarios and laws of the runtime, checked end to end
//! through printed output

use integration_tests::run;
use proptest::prelude::*;

#[test]
fn scenario_default_parameters() {
    let out = run("function f(a, b = 2) { return a + b; } print(f(5), f(5, null), f(5, 1));");
    assert_eq!(out.unwrap(), "7 7 6\n");
}

#[test]
fn scenario_counter_factory() {
    let source = r#"
        function counter() {
            let n = 0;
            return [function() { n += 1; }, function() { return n; }];
        }
        let c = counter();
        let increment = c[0];
        let get = c[1];
        increment();
        increment();
        print(get());
    "#;
    assert_eq!(run(source).unwrap(), "2\n");
}

#[test]
fn scenario_sparse_array() {
    let source = r#"let a = []; a[3] = "x"; print(length(a), a[0], a[1], a[2], a);"#;
    assert_eq!(run(source).unwrap(), "4 null null null [null,null,null,'x']\n");
}

#[test]
fn scenario_null_keeps_key() {
    let source = r#"
        let o = {};
        o.a = 1;
        o.a = null;
        let keys = [];
        for (let k in o) { push(keys, k); }
        print(keys, length(o), o);
        delete o.a;
        print(length(o));
    "#;
    assert_eq!(run(source).unwrap(), "['a'] 1 {'a':null}\n0\n");
}

#[test]
fn scenario_self_passing_fibonacci() {
    let source = r#"
        function fib(n, g) {
            if (n <= 2) { return 1; }
            return g(n - 1, g) + g(n - 2, g);
        }
        print(fib(10, fib));
    "#;
    assert_eq!(run(source).unwrap(), "55\n");
}

#[test]
fn scenario_native_argument_errors_are_catchable() {
    let source = r#"
        try { length(); } catch (e) { print(e.name, e.message); }
        try { length(42); } catch (e) { print(e.name, startswith(e.message, "length")); }
    "#;
    assert_eq!(
        run(source).unwrap(),
        "TypeError length: expected 1 argument(s), got 0\nTypeError true\n"
    );
}

#[test]
fn law_optional_chain_skips_the_rest() {
    let source = r#"
        let calls = 0;
        function touch() { calls++; return 1; }
        let o = null;
        let r = o?.a[touch()].b(touch());
        print(r, calls);
    "#;
    assert_eq!(run(source).unwrap(), "null 0\n");
}

#[test]
fn law_bind_operator() {
    let source = r#"
        function f(x, y, z) { return [x, y, z]; }
        function inc(x) { return x + 1; }
        function dbl(x) { return x * 2; }
        print(1::f(2, 3), 4::inc()::dbl());
    "#;
    assert_eq!(run(source).unwrap(), "[1,2,3] 10\n");
}

#[test]
fn law_aliasing_between_sibling_closures() {
    let source = r#"
        function pair() {
            let shared = 0;
            return {set: function(v) { shared = v; }, get: function() { return shared; }};
        }
        let p = pair();
        let q = pair();
        p.set(5);
        print(p.get(), q.get());
    "#;
    assert_eq!(run(source).unwrap(), "5 0\n");
}

#[test]
fn uncaught_error_reports_thrown_value() {
    let err = run("function boom() { throw {name: \"Bad\", message: \"worse\"}; }\nboom();").unwrap_err();
    assert_eq!(err, "Bad: worse");
    let err = run("throw [1, 2];").unwrap_err();
    assert_eq!(err, "[1,2]");
}

proptest! {
    #[test]
    fn prop_rest_law(n in 0usize..10) {
        let args: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let source = format!(
            "function f(a, b, ...rest) {{ return rest; }} print(length(f({})));",
            args.join(", ")
        );
        prop_assert_eq!(run(&source).unwrap(), format!("{}\n", n.saturating_sub(2)));
    }

    #[test]
    fn prop_sparse_law(first in 0usize..20, second in 0usize..20) {
        let source = format!(
            "let a = []; a[{}] = 1; a[{}] = 2; let nulls = 0; for (let v of a) {{ if (v == null) {{ nulls++; }} }} print(length(a), nulls);",
            first, second
        );
        let len = first.max(second) + 1;
        let filled = if first == second { 1 } else { 2 };
        prop_assert_eq!(run(&source).unwrap(), format!("{} {}\n", len, len - filled));
    }
}
