//! Garbage collection while scripts, natives and host resources interact

use core_types::Value;
use integration_tests::{run_with, vm_with_output};
use interpreter::VmConfig;
use memory_manager::GcConfig;
use parser::CompileOptions;

fn stress() -> VmConfig {
    VmConfig::default().with_gc(GcConfig::default().with_stress(true))
}

#[test]
fn test_cyclic_closures_are_collected() {
    let (mut vm, _) = vm_with_output(VmConfig::default());
    let source = r#"
        function make() {
            let o = {};
            o.self = o;
            o.f = function() { return o; };
            return 1;
        }
        for (let i = 0; i < 10; i++) { make(); }
    "#;
    let proto = parser::compile(source, CompileOptions::default()).unwrap();
    vm.run(proto).unwrap();
    let report = vm.collect_garbage();
    assert!(report.freed >= 30, "freed {}", report.freed);
}

#[test]
fn test_closures_survive_stress_collection() {
    let source = r#"
        function adders() {
            let fs = [];
            for (let i = 0; i < 25; i++) { let k = i; push(fs, function(x) { return x + k; }); }
            return fs;
        }
        let total = 0;
        for (let f of adders()) { total = f(total); }
        print(total);
    "#;
    assert_eq!(run_with(stress(), source).unwrap(), "300\n");
}

#[test]
fn test_stdlib_allocations_under_stress() {
    let source = r#"
        let words = split("delta alpha charlie bravo", " ");
        sort(words, natural_compare);
        let json = tojson(map(words, function(w) { return {w: w, n: length(w)}; }));
        let back = fromjson(json);
        print(join(map(back, function(o) { return o.w; }), ","), back[0].n);
    "#;
    assert_eq!(run_with(stress(), source).unwrap(), "alpha,bravo,charlie,delta 5\n");
}

#[test]
fn test_gc_native_and_stats() {
    let (mut vm, output) = vm_with_output(VmConfig::default());
    let proto = parser::compile(
        "function junk() { let a = [[], [], []]; } junk(); print(gc() >= 4);",
        CompileOptions::default(),
    )
    .unwrap();
    vm.run(proto).unwrap();
    assert_eq!(output.text(), "true\n");
    assert!(vm.gc_stats().collections >= 1);
}

#[test]
fn test_globals_keep_values_alive_across_runs() {
    let (mut vm, _) = vm_with_output(stress());
    let first = parser::compile("let keep = {list: [1, 2, 3]};", CompileOptions::default()).unwrap();
    vm.run(first).unwrap();
    vm.collect_garbage();
    let second = parser::compile("return keep.list[2];", CompileOptions::default()).unwrap();
    assert_eq!(vm.run(second).unwrap(), Value::Number(3.0));
}
