//! Parser -> scope resolver -> bytecode -> VM -> standard library

use core_types::{ErrorKind, Value};
use integration_tests::{run, vm_with_output};
use interpreter::VmConfig;
use parser::CompileOptions;

#[test]
fn test_compiled_listing_names_nested_functions() {
    let proto = parser::compile(
        "function outer() { let x = 1; return function inner() { return x; }; }",
        CompileOptions::default(),
    )
    .unwrap();
    let listing = proto.to_string();
    assert!(listing.contains("outer"));
    assert!(listing.contains("inner"));
}

#[test]
fn test_syntax_errors_carry_positions() {
    let err = parser::compile("let x = ;\n", CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert!(err.source_position.is_some());
}

#[test]
fn test_control_flow_program() {
    let source = r#"
        let out = [];
        for (let i = 0; i < 10; i++) {
            if (i % 2 == 0) { continue; }
            if (i > 7) { break; }
            push(out, i);
        }
        let j = 0;
        do { j += 3; } while (j < 10);
        let k = 0;
        while (true) { k++; if (k == 4) { break; } }
        print(out, j, k, j > k ? "j" : "k");
    "#;
    assert_eq!(run(source).unwrap(), "[1,3,5,7] 12 4 j\n");
}

#[test]
fn test_iteration_kinds() {
    let source = r#"
        let s = "";
        for (let i in [7, 8]) { s += i; }
        for (let c of "hi") { s += c; }
        for (let k in {x: 1, y: 2}) { s += k; }
        for (let v of {x: 3, y: 4}) { s += v; }
        print(s);
    "#;
    assert_eq!(run(source).unwrap(), "01hixy34\n");
}

#[test]
fn test_string_escapes_and_concatenation() {
    let source = r#"print("tab\tend", 'q\'s', "uA" + 1 + true + null);"#;
    assert_eq!(run(source).unwrap(), "tab\tend q's uA1truenull\n");
}

#[test]
fn test_operator_type_errors() {
    assert!(run("print([] + 1);").unwrap_err().starts_with("TypeError"));
    assert!(run("print(-'a');").unwrap_err().starts_with("TypeError"));
    assert!(run("if (null) { }").unwrap_err().contains("Condition must be boolean"));
    assert!(run("print(missing);").unwrap_err().starts_with("ReferenceError"));
}

#[test]
fn test_script_return_value_and_globals() {
    let (mut vm, output) = vm_with_output(VmConfig::default());
    let proto = parser::compile("let answer = 6 * 7; print('set'); return answer;", CompileOptions::default()).unwrap();
    assert_eq!(vm.run(proto).unwrap(), Value::Number(42.0));
    assert_eq!(vm.get_global("answer"), Some(Value::Number(42.0)));
    assert_eq!(output.text(), "set\n");
}

#[test]
fn test_native_callbacks_rethrow_into_script_handlers() {
    let source = r#"
        let seen = [];
        try {
            map([1, 2, 3], function(x) {
                push(seen, x);
                if (x == 2) { throw {name: "Stop", message: "at " + x}; }
                return x;
            });
        } catch (e) {
            print(e.name, e.message, seen);
        }
    "#;
    assert_eq!(run(source).unwrap(), "Stop at 2 [1,2]\n");
}

#[test]
fn test_deep_recursion_limit_is_catchable() {
    let source = r#"
        function down(n) { return down(n + 1); }
        try { down(0); } catch (e) { print(e.name); }
    "#;
    let out = integration_tests::run_with(VmConfig::default().with_max_call_depth(100), source);
    assert_eq!(out.unwrap(), "RangeError\n");
}

#[test]
fn test_deeply_nested_array_prints() {
    let source = r#"
        let a = [];
        for (let i = 0; i < 200000; i++) { a = [a]; }
        print(length(tostring(a)), length("" + a));
    "#;
    assert_eq!(run(source).unwrap(), "400002 400002\n");
}

#[test]
fn test_far_sparse_write_is_catchable() {
    let source = r#"
        let a = [1];
        try { a[4294967295] = 1; } catch (e) { print(e.name, length(a)); }
        a[5] = 2;
        print(length(a));
    "#;
    assert_eq!(run(source).unwrap(), "RangeError 1\n6\n");
}
