//! Unit tests for FunctionProto construction

use bytecode_system::{Capture, Constant, FunctionProto, Opcode, Param};
use core_types::SourcePosition;

fn pos() -> SourcePosition {
    SourcePosition::new(1, 1, 0)
}

#[test]
fn test_nested_listing_is_indented() {
    let mut inner = FunctionProto::new(Some("inner".to_string()));
    inner.captures.push(Capture::Cell(0));
    inner.emit(Opcode::LoadUpvalue(0), pos());
    inner.emit(Opcode::Return, pos());

    let mut outer = FunctionProto::new(Some("outer".to_string()));
    outer.cell_count = 1;
    let idx = outer.add_nested(inner);
    outer.emit(Opcode::MakeClosure(idx), pos());
    outer.emit(Opcode::Return, pos());

    let listing = outer.to_string();
    assert!(listing.contains("function outer() locals=0 cells=1"));
    assert!(listing.contains("  function inner()"));
    assert!(listing.contains("upvalue 0 <- cell 0"));
    assert!(listing.contains("; function inner"));
}

#[test]
fn test_params_render_defaults_and_rest() {
    let mut proto = FunctionProto::new(Some("f".to_string()));
    proto.params = vec![
        Param {
            name: "a".to_string(),
            has_default: false,
            rest: false,
        },
        Param {
            name: "b".to_string(),
            has_default: true,
            rest: false,
        },
        Param {
            name: "c".to_string(),
            has_default: false,
            rest: true,
        },
    ];
    assert!(proto.to_string().starts_with("function f(a, b = ?, ...c)"));
}

#[test]
fn test_string_constant_display_is_escaped() {
    assert_eq!(Constant::String("a\nb".into()).to_string(), "\"a\\nb\"");
    assert_eq!(Constant::Number(2.5).to_string(), "2.5");
}

#[test]
fn test_position_lookup() {
    let mut proto = FunctionProto::new(None);
    proto.emit(Opcode::LoadNull, SourcePosition::new(4, 2, 30));
    assert_eq!(proto.position_at(0).map(|p| p.line), Some(4));
    assert_eq!(proto.position_at(1), None);
}
