//! Unit tests for Value

use core_types::{format_number, GcRef, NativeId, Value};
use proptest::prelude::*;

#[test]
fn test_strings_compare_by_content() {
    assert_eq!(Value::from("abc"), Value::from(String::from("abc")));
    assert_ne!(Value::from("abc"), Value::from("abd"));
}

#[test]
fn test_mixed_kinds_are_unequal() {
    assert_ne!(Value::Null, Value::Boolean(false));
    assert_ne!(Value::Number(0.0), Value::Boolean(false));
    assert_ne!(Value::from("1"), Value::Number(1.0));
}

#[test]
fn test_heap_ref_only_for_heap_kinds() {
    assert_eq!(Value::Object(GcRef::from_index(4)).heap_ref(), Some(GcRef::from_index(4)));
    assert_eq!(Value::Function(GcRef::from_index(5)).heap_ref(), Some(GcRef::from_index(5)));
    assert_eq!(Value::NativeFunction(NativeId::from_index(1)).heap_ref(), None);
    assert_eq!(Value::from("s").heap_ref(), None);
}

#[test]
fn test_callable_kinds() {
    assert!(Value::Function(GcRef::from_index(0)).is_callable());
    assert!(Value::NativeFunction(NativeId::from_index(0)).is_callable());
    assert!(!Value::Object(GcRef::from_index(0)).is_callable());
}

proptest! {
    #[test]
    fn prop_integral_numbers_format_without_point(n in -1_000_000_000i64..1_000_000_000i64) {
        prop_assert_eq!(format_number(n as f64), n.to_string());
    }

    #[test]
    fn prop_number_equality_is_ieee(a in any::<f64>(), b in any::<f64>()) {
        prop_assert_eq!(Value::Number(a) == Value::Number(b), a == b);
    }
}
