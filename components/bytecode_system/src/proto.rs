//! Code objects produced by the compiler
//!
//! A [`FunctionProto`] is immutable once compiled and is shared by every
//! closure created from it.

use std::rc::Rc;

use core_types::SourcePosition;

use crate::instruction::Instruction;
use crate::opcode::Opcode;

/// Constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Number literal
    Number(f64),
    /// String literal, identifier name, or property key
    String(Rc<str>),
}

impl Constant {
    fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }
}

/// Parameter descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Declared name
    pub name: String,
    /// Whether a default expression is evaluated for a missing or null argument
    pub has_default: bool,
    /// Whether this is the trailing rest parameter
    pub rest: bool,
}

/// Where a closure's upvalue comes from, relative to the frame creating it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// A cell slot of the creating frame
    Cell(u32),
    /// An upvalue of the creating closure
    Upvalue(u32),
}

/// A compiled function body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionProto {
    /// Declared name, if any
    pub name: Option<String>,
    /// Parameter descriptors in declaration order
    pub params: Vec<Param>,
    /// Upvalue descriptors, indexed by `LoadUpvalue`/`StoreUpvalue`
    pub captures: Vec<Capture>,
    /// Constant pool
    pub constants: Vec<Constant>,
    /// Instruction stream
    pub instructions: Vec<Instruction>,
    /// Number of stack slots reserved for locals and temporaries
    pub local_count: u32,
    /// Number of cell slots for captured locals
    pub cell_count: u32,
    /// Prototypes of nested function literals, indexed by `MakeClosure`
    pub nested: Vec<Rc<FunctionProto>>,
    /// Name of the source this was compiled from
    pub source_name: Option<Rc<str>>,
}

impl FunctionProto {
    /// Create an empty prototype
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Append an instruction and return its index
    pub fn emit(&mut self, opcode: Opcode, position: SourcePosition) -> usize {
        self.instructions.push(Instruction::new(opcode, position));
        self.instructions.len() - 1
    }

    /// Add a constant, reusing an identical existing entry
    pub fn add_constant(&mut self, constant: Constant) -> u32 {
        if let Some(idx) = self.constants.iter().position(|c| c.same_as(&constant)) {
            return idx as u32;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    /// Add a string constant
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.add_constant(Constant::String(Rc::from(s)))
    }

    /// Add a nested prototype and return its index
    pub fn add_nested(&mut self, proto: FunctionProto) -> u32 {
        self.nested.push(Rc::new(proto));
        (self.nested.len() - 1) as u32
    }

    /// Index the next emitted instruction will have
    pub fn current_offset(&self) -> u32 {
        self.instructions.len() as u32
    }

    /// Point the jump at `at` to the next instruction
    pub fn patch_jump(&mut self, at: usize) {
        let target = self.current_offset();
        self.patch_jump_to(at, target);
    }

    /// Point the jump at `at` to `target`
    pub fn patch_jump_to(&mut self, at: usize, target: u32) {
        if let Some(inst) = self.instructions.get_mut(at) {
            inst.opcode.set_jump_target(target);
        }
    }

    /// Number of declared positional parameters, excluding rest
    pub fn arity(&self) -> usize {
        self.params.iter().filter(|p| !p.rest).count()
    }

    /// Display name used in stack traces and dumps
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Source position of an instruction, if in range
    pub fn position_at(&self, ip: usize) -> Option<SourcePosition> {
        self.instructions.get(ip).map(|inst| inst.source_position)
    }
}
