//! Native bridge
//!
//! Host functions receive the VM and their arguments and return a value or
//! an [`Exception`]. They can re-enter the VM through [`Vm::call_value`] to
//! run script callbacks; a throw inside the callback comes back as `Err`
//! and is normally propagated with `?`, which makes it look as if the native
//! itself threw.
//!
//! # Example
//!
//! ```
//! use core_types::Value;
//! use interpreter::{Args, Exception, Vm};
//!
//! fn twice(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
//!     let args = Args::new("twice", args);
//!     args.expect_count(vm, 1)?;
//!     let n = args.number(vm, 0)?;
//!     Ok(Value::Number(n * 2.0))
//! }
//!
//! let mut vm = Vm::new();
//! let f = vm.register_native("twice", twice);
//! assert_eq!(vm.call_value(&f, &[Value::Number(4.0)]).unwrap(), Value::Number(8.0));
//! ```

use std::rc::Rc;

use core_types::{GcRef, Value};
use memory_manager::{HeapObject, HostResource, PropertyMap};

use crate::dispatch::CallOutcome;
use crate::exception::Exception;
use crate::vm::Vm;

/// Signature of a host function
pub type NativeFn = fn(&mut Vm, &[Value]) -> Result<Value, Exception>;

impl Vm {
    /// Call a script or native function from host code.
    ///
    /// The call runs to completion on the current operand stack; handlers
    /// registered by frames below the call are not visible to it.
    pub fn call_value(&mut self, callee: &Value, args: &[Value]) -> Result<Value, Exception> {
        let height = self.stack.len();
        let frame_floor = self.frames.len();
        let handler_floor = self.handlers.len();
        self.stack.push(callee.clone());
        self.stack.extend_from_slice(args);
        let result = match self.call_on_stack(args.len()) {
            Ok(CallOutcome::Entered) => self.dispatch(frame_floor, handler_floor),
            Ok(CallOutcome::Completed) => self.pop(),
            Err(exception) => Err(exception),
        };
        self.stack.truncate(height);
        result
    }

    /// Build an error object `{name, message}` and wrap it as a throw
    pub fn error(&mut self, name: &str, message: impl Into<String>) -> Exception {
        let message: String = message.into();
        let object = self.new_object(vec![
            ("name".to_string(), Value::from(name)),
            ("message".to_string(), Value::from(message)),
        ]);
        Exception::Throw(object)
    }

    /// Throw a `TypeError`
    pub fn type_error(&mut self, message: impl Into<String>) -> Exception {
        self.error("TypeError", message)
    }

    /// Throw a `ReferenceError`
    pub fn reference_error(&mut self, message: impl Into<String>) -> Exception {
        self.error("ReferenceError", message)
    }

    /// Throw a `RangeError`
    pub fn range_error(&mut self, message: impl Into<String>) -> Exception {
        self.error("RangeError", message)
    }

    /// Allocate an array
    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::Array(self.heap.alloc_array(items))
    }

    /// Allocate an object with the given entries, in order
    pub fn new_object(&mut self, entries: Vec<(String, Value)>) -> Value {
        let props: PropertyMap = entries
            .into_iter()
            .map(|(key, value)| (Rc::from(key), value))
            .collect();
        Value::Object(self.heap.alloc_object(props))
    }

    /// Copy of an array's elements
    pub fn array_elements(&mut self, value: &Value) -> Result<Vec<Value>, Exception> {
        Ok(self.array_mut(value)?.clone())
    }

    /// Mutable access to an array's storage
    pub fn array_mut(&mut self, value: &Value) -> Result<&mut Vec<Value>, Exception> {
        match value {
            Value::Array(r) => match self.heap.get_mut(*r) {
                Some(HeapObject::Array(items)) => Ok(items),
                _ => Err(Exception::internal("array value without array storage")),
            },
            other => {
                let message = format!("Expected an array, got {}", other.type_of());
                Err(self.type_error(message))
            }
        }
    }

    /// Append values to an array, accounting for the growth
    pub fn array_push(&mut self, array: &Value, values: Vec<Value>) -> Result<(), Exception> {
        match array {
            Value::Array(_) => self.array_append(array, values),
            other => {
                let message = format!("Expected an array, got {}", other.type_of());
                Err(self.type_error(message))
            }
        }
    }

    /// Copy of an object's entries in insertion order
    pub fn object_entries(&mut self, value: &Value) -> Result<Vec<(Rc<str>, Value)>, Exception> {
        match value {
            Value::Object(r) => match self.heap.get(*r) {
                Some(HeapObject::Object(props)) => Ok(props
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()),
                _ => Err(Exception::internal("object value without object storage")),
            },
            other => {
                let message = format!("Expected an object, got {}", other.type_of());
                Err(self.type_error(message))
            }
        }
    }

    /// Wrap a host resource in a heap object; its finalizer runs when the
    /// collector reclaims it
    pub fn alloc_resource(&mut self, resource: Box<dyn HostResource>) -> Value {
        Value::Resource(self.heap.alloc_resource(resource))
    }

    /// Downcast a resource value to its host type
    pub fn resource_mut<T: HostResource>(&mut self, value: &Value) -> Option<&mut T> {
        match value {
            Value::Resource(r) => match self.heap.get_mut(*r) {
                Some(HeapObject::Resource(resource)) => resource.as_any_mut().downcast_mut::<T>(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Keep a value alive until the running native returns
    pub fn push_root(&mut self, value: Value) {
        self.temp_roots.push(value);
    }
}

/// Argument list of a native call with checked accessors.
///
/// Every violation raises a `TypeError` naming the function.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    function: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    /// Wrap the arguments of `function`
    pub fn new(function: &'a str, values: &'a [Value]) -> Self {
        Self { function, values }
    }

    /// Number of arguments passed
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no arguments were passed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw argument, null when absent
    pub fn get(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Null)
    }

    /// Raise a `TypeError` about this call
    pub fn error(&self, vm: &mut Vm, message: impl std::fmt::Display) -> Exception {
        vm.type_error(format!("{}: {}", self.function, message))
    }

    /// Require exactly `count` arguments
    pub fn expect_count(&self, vm: &mut Vm, count: usize) -> Result<(), Exception> {
        if self.values.len() == count {
            Ok(())
        } else {
            Err(self.error(
                vm,
                format_args!("expected {} argument(s), got {}", count, self.values.len()),
            ))
        }
    }

    /// Require between `min` and `max` arguments
    pub fn expect_range(&self, vm: &mut Vm, min: usize, max: usize) -> Result<(), Exception> {
        let n = self.values.len();
        if (min..=max).contains(&n) {
            Ok(())
        } else {
            Err(self.error(
                vm,
                format_args!("expected {} to {} arguments, got {}", min, max, n),
            ))
        }
    }

    fn mismatch(&self, vm: &mut Vm, index: usize, expected: &str) -> Exception {
        let got = self.values.get(index).map_or("nothing", Value::type_of);
        self.error(
            vm,
            format_args!("argument {} must be {}, got {}", index + 1, expected, got),
        )
    }

    /// Number argument
    pub fn number(&self, vm: &mut Vm, index: usize) -> Result<f64, Exception> {
        match self.values.get(index) {
            Some(Value::Number(n)) => Ok(*n),
            _ => Err(self.mismatch(vm, index, "a number")),
        }
    }

    /// Non-negative integer argument
    pub fn index(&self, vm: &mut Vm, index: usize) -> Result<usize, Exception> {
        match self.values.get(index).and_then(Value::as_index) {
            Some(i) => Ok(i),
            None => Err(self.mismatch(vm, index, "a non-negative integer")),
        }
    }

    /// String argument
    pub fn string(&self, vm: &mut Vm, index: usize) -> Result<Rc<str>, Exception> {
        match self.values.get(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(self.mismatch(vm, index, "a string")),
        }
    }

    /// Boolean argument
    pub fn boolean(&self, vm: &mut Vm, index: usize) -> Result<bool, Exception> {
        match self.values.get(index) {
            Some(Value::Boolean(b)) => Ok(*b),
            _ => Err(self.mismatch(vm, index, "a boolean")),
        }
    }

    /// Array argument
    pub fn array(&self, vm: &mut Vm, index: usize) -> Result<Value, Exception> {
        match self.values.get(index) {
            Some(value @ Value::Array(_)) => Ok(value.clone()),
            _ => Err(self.mismatch(vm, index, "an array")),
        }
    }

    /// Object argument
    pub fn object(&self, vm: &mut Vm, index: usize) -> Result<Value, Exception> {
        match self.values.get(index) {
            Some(value @ Value::Object(_)) => Ok(value.clone()),
            _ => Err(self.mismatch(vm, index, "an object")),
        }
    }

    /// Callable argument
    pub fn function(&self, vm: &mut Vm, index: usize) -> Result<Value, Exception> {
        match self.values.get(index) {
            Some(value) if value.is_callable() => Ok(value.clone()),
            _ => Err(self.mismatch(vm, index, "a function")),
        }
    }

    /// Resource argument
    pub fn resource(&self, vm: &mut Vm, index: usize) -> Result<GcRef, Exception> {
        match self.values.get(index) {
            Some(Value::Resource(r)) => Ok(*r),
            _ => Err(self.mismatch(vm, index, "a resource")),
        }
    }

    /// Number argument, `None` when absent or null
    pub fn optional_number(&self, vm: &mut Vm, index: usize) -> Result<Option<f64>, Exception> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.number(vm, index).map(Some),
        }
    }

    /// String argument, `None` when absent or null
    pub fn optional_string(&self, vm: &mut Vm, index: usize) -> Result<Option<Rc<str>>, Exception> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.string(vm, index).map(Some),
        }
    }

    /// Boolean argument, `None` when absent or null
    pub fn optional_boolean(&self, vm: &mut Vm, index: usize) -> Result<Option<bool>, Exception> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.boolean(vm, index).map(Some),
        }
    }

    /// Callable argument, `None` when absent or null
    pub fn optional_function(&self, vm: &mut Vm, index: usize) -> Result<Option<Value>, Exception> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.function(vm, index).map(Some),
        }
    }
}

/// Conversion of host values into script values
pub trait IntoValue {
    /// Convert, allocating on the VM heap when needed
    fn into_value(self, vm: &mut Vm) -> Value;
}

impl IntoValue for Value {
    fn into_value(self, _vm: &mut Vm) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self, _vm: &mut Vm) -> Value {
        Value::Null
    }
}

impl IntoValue for bool {
    fn into_value(self, _vm: &mut Vm) -> Value {
        Value::Boolean(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self, _vm: &mut Vm) -> Value {
        Value::Number(self)
    }
}

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(impl IntoValue for $t {
            fn into_value(self, _vm: &mut Vm) -> Value {
                Value::Number(self as f64)
            }
        })*
    };
}

int_into_value!(i32, i64, u32, u64, usize);

impl IntoValue for &str {
    fn into_value(self, _vm: &mut Vm) -> Value {
        Value::from(self)
    }
}

impl IntoValue for String {
    fn into_value(self, _vm: &mut Vm) -> Value {
        Value::from(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self, vm: &mut Vm) -> Value {
        match self {
            Some(value) => value.into_value(vm),
            None => Value::Null,
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self, vm: &mut Vm) -> Value {
        let roots = vm.temp_roots.len();
        for item in self {
            let value = item.into_value(vm);
            vm.temp_roots.push(value);
        }
        let items = vm.temp_roots.split_off(roots);
        vm.new_array(items)
    }
}

/// Conversion of script values into host values
pub trait FromValue: Sized {
    /// Convert, or `None` when the value has the wrong kind
    fn from_value(vm: &Vm, value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(_vm: &Vm, value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(_vm: &Vm, value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for f64 {
    fn from_value(_vm: &Vm, value: &Value) -> Option<Self> {
        value.as_number()
    }
}

impl FromValue for String {
    fn from_value(_vm: &Vm, value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(vm: &Vm, value: &Value) -> Option<Self> {
        match value {
            Value::Array(r) => match vm.heap.get(*r) {
                Some(HeapObject::Array(items)) => items.iter().map(|v| T::from_value(vm, v)).collect(),
                _ => None,
            },
            _ => None,
        }
    }
}
