//! Contract tests for core_types: the public surface other components rely on

use core_types::{ErrorKind, GcRef, ScriptError, Value};

#[test]
fn test_value_is_a_closed_set_of_kinds() {
    let values = [
        Value::Null,
        Value::Boolean(true),
        Value::Number(1.0),
        Value::from("s"),
        Value::Array(GcRef::from_index(0)),
        Value::Object(GcRef::from_index(1)),
        Value::Function(GcRef::from_index(2)),
    ];
    let names: Vec<_> = values.iter().map(|v| v.type_of()).collect();
    assert_eq!(
        names,
        vec!["null", "boolean", "number", "string", "array", "object", "function"]
    );
}

#[test]
fn test_script_error_carries_kind_and_message() {
    let error = ScriptError::new(ErrorKind::RangeError, "Maximum call depth exceeded");
    assert_eq!(error.kind, ErrorKind::RangeError);
    assert_eq!(error.message, "Maximum call depth exceeded");
    assert!(error.stack.is_empty());
}
