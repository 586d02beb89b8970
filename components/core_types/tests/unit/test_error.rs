//! Unit tests for ScriptError

use core_types::{ErrorKind, ScriptError, SourcePosition, StackFrame};

#[test]
fn test_error_with_position_display() {
    let error = ScriptError::new(ErrorKind::ReferenceError, "x is not defined")
        .with_position(SourcePosition::new(1, 5, 4));
    assert_eq!(error.to_string(), "ReferenceError: x is not defined at 1:5");
}

#[test]
fn test_error_is_std_error() {
    fn takes_error(_: &dyn std::error::Error) {}
    takes_error(&ScriptError::new(ErrorKind::InternalError, "bad"));
}

#[test]
fn test_stack_trace_multiple_frames() {
    let frames = vec![
        StackFrame {
            function_name: Some("inner".to_string()),
            source_url: None,
            line: 4,
            column: 12,
        },
        StackFrame {
            function_name: None,
            source_url: None,
            line: 9,
            column: 1,
        },
    ];
    let error = ScriptError::new(ErrorKind::Uncaught, "boom").with_stack(frames);
    assert_eq!(error.stack_trace(), "    at inner (4:12)\n    at <anonymous> (9:1)");
}
