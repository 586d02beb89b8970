//! Bytecode opcodes for the stack-based VM
//!
//! Operands are slot indices, constant-pool indices, argument counts, or
//! absolute jump targets (instruction indices).

/// What a `for` loop iterates over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKind {
    /// `for (x in e)`: indices of arrays and strings, keys of objects
    Keys,
    /// `for (x of e)`: elements of arrays, values of objects, characters of strings
    Values,
}

/// Bytecode opcodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    // Literals
    /// Push constant from the pool
    LoadConst(u32),
    /// Push null
    LoadNull,
    /// Push true
    LoadTrue,
    /// Push false
    LoadFalse,

    // Stack
    /// Discard top value
    Pop,
    /// Duplicate top value
    Dup,
    /// Duplicate the top two values, preserving order
    Dup2,

    // Variables
    /// Push a stack slot of the current frame
    LoadLocal(u32),
    /// Pop into a stack slot of the current frame
    StoreLocal(u32),
    /// Give a cell slot a fresh heap cell holding null
    MakeCell(u32),
    /// Push the content of the current frame's cell
    LoadCell(u32),
    /// Pop into the current frame's cell
    StoreCell(u32),
    /// Push the content of a captured cell
    LoadUpvalue(u32),
    /// Pop into a captured cell
    StoreUpvalue(u32),
    /// Push a global by name (constant index); ReferenceError when missing
    LoadGlobal(u32),
    /// Pop into an existing global; ReferenceError when missing
    StoreGlobal(u32),
    /// Pop into a global, creating it if needed
    DefineGlobal(u32),
    /// Remove a global from the table
    DeleteGlobal(u32),

    // Operators
    /// Addition or string concatenation
    Add,
    /// Numeric subtraction
    Sub,
    /// Numeric multiplication
    Mul,
    /// Numeric division
    Div,
    /// Numeric remainder
    Mod,
    /// Numeric exponentiation
    Pow,
    /// Numeric negation
    Neg,
    /// Numeric identity (unary plus)
    Plus,
    /// Add one to a number
    Increment,
    /// Subtract one from a number
    Decrement,
    /// Boolean negation
    Not,
    /// Push the `typeof` name of the top value
    TypeOf,
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,

    // Control flow
    /// Unconditional jump
    Jump(u32),
    /// Pop a boolean; jump when false
    JumpIfFalse(u32),
    /// Pop a boolean; jump when true
    JumpIfTrue(u32),
    /// Peek a boolean; jump keeping it when false, otherwise pop it
    JumpIfFalseOrPop(u32),
    /// Peek a boolean; jump keeping it when true, otherwise pop it
    JumpIfTrueOrPop(u32),
    /// Peek; jump keeping the value when it is null
    JumpIfNull(u32),
    /// Peek; jump keeping the value when it is not null
    JumpIfNotNull(u32),
    /// Require the top value to be a boolean
    CheckBoolean,

    // Arrays and objects
    /// Push a new empty array
    NewArray,
    /// Pop a value and append it to the array below it
    ArrayPush,
    /// Pop an array and append its elements to the array below it
    ArraySpread,
    /// Push a new empty object
    NewObject,
    /// Pop a value and insert it under a constant key into the object below it
    ObjectInsert(u32),
    /// Pop key and container, push the member value
    GetMember,
    /// Pop value, key and container, store the member, push the value
    SetMember,
    /// Pop key and container, remove the member
    DeleteMember,

    // Iteration
    /// Pop an iterable, push a snapshot array and a cursor
    IterInit(IterKind),
    /// Advance the cursor below the top; push the next item or jump when exhausted
    IterNext(u32),

    // Functions
    /// Create a closure from a nested prototype
    MakeClosure(u32),
    /// Call with the given number of arguments on the stack
    Call(u32),
    /// Call with the arguments collected in an array on top of the stack
    CallSpread,
    /// Return the top value from the current frame
    Return,
    /// Push argument N of the current call, or null when absent
    LoadArgument(u32),
    /// Push an array of the arguments from index N on
    LoadRestArguments(u32),

    // Exceptions
    /// Register a handler that resumes at the target
    PushHandler(u32),
    /// Remove the innermost handler
    PopHandler,
    /// Throw the top value
    Throw,
}

impl Opcode {
    /// Jump target, for instructions that transfer control
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Opcode::Jump(t)
            | Opcode::JumpIfFalse(t)
            | Opcode::JumpIfTrue(t)
            | Opcode::JumpIfFalseOrPop(t)
            | Opcode::JumpIfTrueOrPop(t)
            | Opcode::JumpIfNull(t)
            | Opcode::JumpIfNotNull(t)
            | Opcode::IterNext(t)
            | Opcode::PushHandler(t) => Some(*t),
            _ => None,
        }
    }

    /// Replace the jump target; no-op for other instructions
    pub fn set_jump_target(&mut self, target: u32) {
        match self {
            Opcode::Jump(t)
            | Opcode::JumpIfFalse(t)
            | Opcode::JumpIfTrue(t)
            | Opcode::JumpIfFalseOrPop(t)
            | Opcode::JumpIfTrueOrPop(t)
            | Opcode::JumpIfNull(t)
            | Opcode::JumpIfNotNull(t)
            | Opcode::IterNext(t)
            | Opcode::PushHandler(t) => *t = target,
            _ => {}
        }
    }

    /// Check if this instruction never falls through
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Jump(_) | Opcode::Return | Opcode::Throw)
    }

    /// Check if this instruction may allocate heap objects
    pub fn allocates(&self) -> bool {
        matches!(
            self,
            Opcode::MakeCell(_)
                | Opcode::NewArray
                | Opcode::NewObject
                | Opcode::ArrayPush
                | Opcode::ArraySpread
                | Opcode::ObjectInsert(_)
                | Opcode::SetMember
                | Opcode::IterInit(_)
                | Opcode::MakeClosure(_)
                | Opcode::Call(_)
                | Opcode::CallSpread
                | Opcode::LoadRestArguments(_)
        )
    }
}
