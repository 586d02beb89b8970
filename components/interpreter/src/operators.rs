//! Operator semantics and member access
//!
//! Arithmetic requires numbers, `+` also concatenates when either side is a
//! string, and comparisons are numeric or lexicographic on matching kinds.

use std::mem;
use std::rc::Rc;

use bytecode_system::IterKind;
use core_types::Value;
use memory_manager::HeapObject;

use crate::exception::Exception;
use crate::vm::Vm;

/// Binary operators evaluated by [`Vm::binary_op`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }
}

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Pow => a.powf(b),
        _ => f64::NAN,
    }
}

fn compare<T: PartialOrd + ?Sized>(op: BinaryOp, a: &T, b: &T) -> bool {
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => false,
    }
}

impl Vm {
    /// Apply a binary operator
    pub fn binary_op(&mut self, op: BinaryOp, a: &Value, b: &Value) -> Result<Value, Exception> {
        match (op, a, b) {
            (_, Value::Number(x), Value::Number(y)) if op.is_comparison() => {
                Ok(Value::Boolean(compare(op, x, y)))
            }
            (_, Value::String(x), Value::String(y)) if op.is_comparison() => {
                Ok(Value::Boolean(compare(op, &**x, &**y)))
            }
            (_, Value::Number(x), Value::Number(y)) if !op.is_comparison() => {
                Ok(Value::Number(arithmetic(op, *x, *y)))
            }
            (BinaryOp::Add, Value::String(_), _) | (BinaryOp::Add, _, Value::String(_)) => {
                let mut text = self.display(a);
                text.push_str(&self.display(b));
                Ok(Value::from(text))
            }
            _ => {
                let message = if op == BinaryOp::Add {
                    format!(
                        "Operands of '+' must be numbers or strings, got {} and {}",
                        a.type_of(),
                        b.type_of()
                    )
                } else if op.is_comparison() {
                    format!(
                        "Cannot compare {} with {} using '{}'",
                        a.type_of(),
                        b.type_of(),
                        op.symbol()
                    )
                } else {
                    format!(
                        "Operands of '{}' must be numbers, got {} and {}",
                        op.symbol(),
                        a.type_of(),
                        b.type_of()
                    )
                };
                Err(self.type_error(message))
            }
        }
    }

    /// Read `container[key]`.
    ///
    /// Missing object keys and out-of-range indices read as null.
    pub fn get_member(&mut self, container: &Value, key: &Value) -> Result<Value, Exception> {
        match (container, key) {
            (Value::Object(r), Value::String(k)) => match self.heap.get(*r) {
                Some(HeapObject::Object(props)) => Ok(props.get(&**k).cloned().unwrap_or(Value::Null)),
                _ => Err(Exception::internal("object value without object storage")),
            },
            (Value::Array(r), Value::Number(_)) => match self.heap.get(*r) {
                Some(HeapObject::Array(items)) => Ok(key
                    .as_index()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or(Value::Null)),
                _ => Err(Exception::internal("array value without array storage")),
            },
            (Value::String(s), Value::Number(_)) => Ok(key
                .as_index()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::from(c.to_string()))
                .unwrap_or(Value::Null)),
            _ => {
                let message = format!(
                    "Cannot read member of {} with a {} key",
                    container.type_of(),
                    key.type_of()
                );
                Err(self.type_error(message))
            }
        }
    }

    /// Write `container[key] = value`.
    ///
    /// Writing past the end of an array fills the gap with null. Writing
    /// null to an object key keeps the key.
    pub fn set_member(&mut self, container: &Value, key: &Value, value: Value) -> Result<(), Exception> {
        match (container, key) {
            (Value::Object(r), Value::String(k)) => {
                let grew = match self.heap.get_mut(*r) {
                    Some(HeapObject::Object(props)) => props.insert(k.clone(), value).is_none(),
                    _ => return Err(Exception::internal("object value without object storage")),
                };
                if grew {
                    self.heap
                        .record_growth(*r, k.len() + mem::size_of::<(Rc<str>, Value)>());
                }
                Ok(())
            }
            (Value::Array(r), Value::Number(_)) => {
                let index = match key.as_index() {
                    Some(index) => index,
                    None => {
                        let message = format!("Invalid array index {}", self.display(key));
                        return Err(self.range_error(message));
                    }
                };
                let len = match self.heap.get(*r) {
                    Some(HeapObject::Array(items)) => items.len(),
                    _ => 0,
                };
                if index > len.saturating_add(self.config.max_array_gap) {
                    let message = format!("Array index {} is too far past the end (length {})", index, len);
                    return Err(self.range_error(message));
                }
                let added = match self.heap.get_mut(*r) {
                    Some(HeapObject::Array(items)) => {
                        let before = items.len();
                        if index >= items.len() {
                            items.resize(index + 1, Value::Null);
                        }
                        items[index] = value;
                        items.len() - before
                    }
                    _ => return Err(Exception::internal("array value without array storage")),
                };
                if added > 0 {
                    self.heap.record_growth(*r, added * mem::size_of::<Value>());
                }
                Ok(())
            }
            _ => {
                let message = format!(
                    "Cannot set member of {} with a {} key",
                    container.type_of(),
                    key.type_of()
                );
                Err(self.type_error(message))
            }
        }
    }

    /// `delete container[key]`: removes an object key, nulls an array slot
    pub fn delete_member(&mut self, container: &Value, key: &Value) -> Result<(), Exception> {
        match (container, key) {
            (Value::Object(r), Value::String(k)) => {
                if let Some(HeapObject::Object(props)) = self.heap.get_mut(*r) {
                    props.shift_remove(&**k);
                }
                Ok(())
            }
            (Value::Array(r), Value::Number(_)) => {
                if let (Some(index), Some(HeapObject::Array(items))) = (key.as_index(), self.heap.get_mut(*r)) {
                    if let Some(slot) = items.get_mut(index) {
                        *slot = Value::Null;
                    }
                }
                Ok(())
            }
            _ => {
                let message = format!(
                    "Cannot delete member of {} with a {} key",
                    container.type_of(),
                    key.type_of()
                );
                Err(self.type_error(message))
            }
        }
    }

    /// Append values to an array
    pub(crate) fn array_append(&mut self, array: &Value, values: Vec<Value>) -> Result<(), Exception> {
        let r = match array {
            Value::Array(r) => *r,
            _ => return Err(Exception::internal("append target is not an array")),
        };
        let added = values.len();
        match self.heap.get_mut(r) {
            Some(HeapObject::Array(items)) => items.extend(values),
            _ => return Err(Exception::internal("array value without array storage")),
        }
        self.heap.record_growth(r, added * mem::size_of::<Value>());
        Ok(())
    }

    /// Snapshot of what a `for in`/`for of` loop visits
    pub(crate) fn iteration_items(&mut self, kind: IterKind, iterable: &Value) -> Result<Vec<Value>, Exception> {
        match (kind, iterable) {
            (IterKind::Keys, Value::Array(r)) => match self.heap.get(*r) {
                Some(HeapObject::Array(items)) => Ok((0..items.len()).map(|i| Value::Number(i as f64)).collect()),
                _ => Err(Exception::internal("array value without array storage")),
            },
            (IterKind::Values, Value::Array(r)) => match self.heap.get(*r) {
                Some(HeapObject::Array(items)) => Ok(items.clone()),
                _ => Err(Exception::internal("array value without array storage")),
            },
            (IterKind::Keys, Value::Object(r)) => match self.heap.get(*r) {
                Some(HeapObject::Object(props)) => Ok(props.keys().map(|k| Value::String(k.clone())).collect()),
                _ => Err(Exception::internal("object value without object storage")),
            },
            (IterKind::Values, Value::Object(r)) => match self.heap.get(*r) {
                Some(HeapObject::Object(props)) => Ok(props.values().cloned().collect()),
                _ => Err(Exception::internal("object value without object storage")),
            },
            (IterKind::Keys, Value::String(s)) => {
                Ok((0..s.chars().count()).map(|i| Value::Number(i as f64)).collect())
            }
            (IterKind::Values, Value::String(s)) => {
                Ok(s.chars().map(|c| Value::from(c.to_string())).collect())
            }
            _ => {
                let message = format!("Value of type '{}' is not iterable", iterable.type_of());
                Err(self.type_error(message))
            }
        }
    }
}
