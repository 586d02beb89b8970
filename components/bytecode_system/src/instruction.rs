//! Bytecode instruction representation

use core_types::SourcePosition;

use crate::opcode::Opcode;

/// A single bytecode instruction with its source mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// The opcode for this instruction
    pub opcode: Opcode,
    /// Position of the source construct that produced it
    pub source_position: SourcePosition,
}

impl Instruction {
    /// Create a new instruction
    pub fn new(opcode: Opcode, source_position: SourcePosition) -> Self {
        Self {
            opcode,
            source_position,
        }
    }
}
