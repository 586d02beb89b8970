//! Core value types and error handling for the banana scripting runtime.
//!
//! This crate provides the foundational types shared by every other
//! component: the tagged runtime value, heap handles, error types, and
//! source location tracking.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of runtime values
//! - [`GcRef`] - Handle to an object owned by the garbage-collected heap
//! - [`NativeId`] - Handle to a registered host function
//! - [`ScriptError`] - Host-facing error with stack trace
//! - [`ErrorKind`] - Categories of runtime errors
//! - [`SourcePosition`] - Source code location
//! - [`StackFrame`] - Call stack frame information
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, ScriptError, Value};
//!
//! let num = Value::Number(42.0);
//! assert_eq!(num.type_of(), "number");
//! assert_eq!(num.to_string(), "42");
//!
//! let error = ScriptError::new(ErrorKind::TypeError, "null is not callable");
//! assert_eq!(error.to_string(), "TypeError: null is not callable");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod handle;
mod number;
mod source;
mod value;

pub use error::{ErrorKind, ScriptError};
pub use handle::{GcRef, NativeId};
pub use number::{escape_string, format_number};
pub use source::{SourcePosition, StackFrame};
pub use value::Value;
