//! Bytecode interpreter for the banana runtime
//!
//! This crate provides the virtual machine that executes compiled
//! [`FunctionProto`](bytecode_system::FunctionProto)s:
//! - Stack-based dispatch over call frames with heap cells for captured locals
//! - Operator semantics and member access on arrays, objects and strings
//! - Handler-stack exception unwinding
//! - Garbage collection at allocation safepoints
//! - A native bridge for host functions, including re-entrant calls
//!
//! # Example
//!
//! ```
//! use interpreter::Vm;
//! use parser::CompileOptions;
//! use core_types::Value;
//!
//! let proto = parser::compile("let x = 20; return x + 22;", CompileOptions::default()).unwrap();
//! let mut vm = Vm::new();
//! assert_eq!(vm.run(proto).unwrap(), Value::Number(42.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod call_frame;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod exception;
pub mod gc_integration;
pub mod operators;
pub mod vm;

pub use bridge::{Args, FromValue, IntoValue, NativeFn};
pub use call_frame::{CallFrame, Handler};
pub use config::VmConfig;
pub use exception::Exception;
pub use operators::BinaryOp;
pub use vm::Vm;
