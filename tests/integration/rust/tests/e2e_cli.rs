//! End-to-end runs through the banana_cli Runtime: files, argv, exit status

use std::io::Write;

use banana_cli::{CliError, Runtime};
use core_types::{ErrorKind, Value};
use interpreter::VmConfig;

fn script(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".bn").tempfile().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn test_script_sees_its_arguments() {
    let file = script(&["return [argc, argv[1], exists(argv[0])];"]);
    let path = file.path().to_str().unwrap().to_string();
    let mut runtime = Runtime::new(VmConfig::default(), &[path.clone(), "first".to_string()]);
    let result = runtime.execute_file(&path).unwrap();
    let items = runtime.vm().array_elements(&result).unwrap();
    assert_eq!(items, vec![Value::Number(2.0), Value::from("first"), Value::Boolean(true)]);
}

#[test]
fn test_script_reads_a_sibling_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.txt"), "3\n4\n").unwrap();
    let main = dir.path().join("main.bn");
    std::fs::write(
        &main,
        "let total = 0;\nread(dirname(argv[0]) + pathsep + 'data.txt', false, function(l) { total += tonumber(l); });\nreturn total;\n",
    )
    .unwrap();
    let path = main.to_str().unwrap().to_string();
    let mut runtime = Runtime::new(VmConfig::default(), &[path.clone()]);
    assert_eq!(runtime.execute_file(&path).unwrap(), Value::Number(7.0));
}

#[test]
fn test_exit_status_propagates() {
    let file = script(&["print('bye');", "exit(42);", "print('unreachable');"]);
    let mut runtime = Runtime::new(VmConfig::default(), &[]);
    runtime.vm().set_output(Box::new(std::io::sink()));
    let err = runtime.execute_file(file.path().to_str().unwrap()).unwrap_err();
    assert_eq!(err.exit_status(), 42);
    assert!(matches!(err, CliError::Runtime(ref e) if e.kind == ErrorKind::Exit(42)));
}

#[test]
fn test_uncaught_error_exits_with_one() {
    let file = script(&["function f() {", "  return null.x;", "}", "f();"]);
    let mut runtime = Runtime::new(VmConfig::default(), &[]);
    let err = runtime.execute_file(file.path().to_str().unwrap()).unwrap_err();
    assert_eq!(err.exit_status(), 1);
    match err {
        CliError::Runtime(e) => {
            assert_eq!(e.kind, ErrorKind::Uncaught);
            assert_eq!(e.stack[0].function_name.as_deref(), Some("f"));
            assert_eq!(e.stack[0].line, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}
