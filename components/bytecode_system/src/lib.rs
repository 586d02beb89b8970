//! Bytecode system for the banana runtime
//!
//! This crate defines the stack-machine instruction set and the code object
//! ([`FunctionProto`]) the compiler produces and the VM executes. Every
//! variable access is resolved before it reaches this crate: instructions
//! name a stack slot, a cell slot, an upvalue index, or a global name.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{Constant, FunctionProto, Opcode};
//! use core_types::SourcePosition;
//!
//! let mut proto = FunctionProto::new(Some("answer".to_string()));
//! let idx = proto.add_constant(Constant::Number(42.0));
//! proto.emit(Opcode::LoadConst(idx), SourcePosition::default());
//! proto.emit(Opcode::Return, SourcePosition::default());
//!
//! assert_eq!(proto.instructions.len(), 2);
//! assert!(proto.to_string().contains("LoadConst"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod disassemble;
pub mod instruction;
pub mod opcode;
pub mod proto;

pub use instruction::Instruction;
pub use opcode::{IterKind, Opcode};
pub use proto::{Capture, Constant, FunctionProto, Param};
