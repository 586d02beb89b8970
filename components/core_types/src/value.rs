//! Runtime value representation.
//!
//! [`Value`] is the closed set of kinds a script can observe. Primitives
//! (`Null`, `Boolean`, `Number`) and strings are carried inline; arrays,
//! objects, closures and host resources live in the garbage-collected heap
//! and are referenced through a [`GcRef`].

use std::fmt;
use std::rc::Rc;

use crate::{format_number, GcRef, NativeId};

/// A runtime value.
///
/// Cloning a `Value` never duplicates a heap object: the clone refers to the
/// same array, object or closure.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let s = Value::from("hello");
/// assert_eq!(s.type_of(), "string");
/// assert_eq!(s, Value::from("hello"));
///
/// // IEEE-754 equality
/// assert_eq!(Value::Number(-0.0), Value::Number(0.0));
/// assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
/// ```
#[derive(Clone)]
pub enum Value {
    /// Absence of a value; also fills unset array slots and unbound parameters
    Null,
    /// Boolean primitive
    Boolean(bool),
    /// Double-precision number
    Number(f64),
    /// Immutable string, compared by content
    String(Rc<str>),
    /// Heap array, compared by identity
    Array(GcRef),
    /// Heap object with insertion-ordered keys, compared by identity
    Object(GcRef),
    /// Script closure, compared by identity
    Function(GcRef),
    /// Host function registered with the VM
    NativeFunction(NativeId),
    /// Heap object wrapping a host resource such as an open file
    Resource(GcRef),
}

impl Value {
    /// The name reported by `typeof`
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) | Value::NativeFunction(_) => "function",
            Value::Resource(_) => "resource",
        }
    }

    /// Heap handle for values that live in the collected heap
    pub fn heap_ref(&self) -> Option<GcRef> {
        match self {
            Value::Array(r) | Value::Object(r) | Value::Function(r) | Value::Resource(r) => Some(*r),
            _ => None,
        }
    }

    /// Check for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check whether the value can be called
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::NativeFunction(_))
    }

    /// Boolean payload, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Number payload, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret a number as a non-negative integer index
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Script equality: by value for primitives and strings, by identity
    /// for heap objects.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a == b,
            (Value::Resource(a), Value::Resource(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Number(n) => write!(f, "Number({})", format_number(*n)),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(r) => write!(f, "Array({:?})", r),
            Value::Object(r) => write!(f, "Object({:?})", r),
            Value::Function(r) => write!(f, "Function({:?})", r),
            Value::NativeFunction(id) => write!(f, "NativeFunction({:?})", id),
            Value::Resource(r) => write!(f, "Resource({:?})", r),
        }
    }
}

/// Display without heap access.
///
/// Heap values render as a placeholder naming their kind; the VM provides a
/// full rendering that walks the heap.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) => write!(f, "<array>"),
            Value::Object(_) => write!(f, "<object>"),
            Value::Function(_) => write!(f, "<function>"),
            Value::NativeFunction(_) => write!(f, "<native>"),
            Value::Resource(_) => write!(f, "<resource>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}
