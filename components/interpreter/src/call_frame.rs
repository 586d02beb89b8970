//! Call frames and exception handlers

use std::rc::Rc;

use bytecode_system::FunctionProto;
use core_types::{GcRef, StackFrame, Value};
use memory_manager::{RootSource, Tracer};

/// Activation record of a running script function
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Closure being executed
    pub closure: GcRef,
    /// Its prototype
    pub proto: Rc<FunctionProto>,
    /// Cells captured by the closure, indexed by `LoadUpvalue`
    pub upvalues: Vec<GcRef>,
    /// Next instruction
    pub ip: usize,
    /// Operand stack index of local slot 0
    pub base: usize,
    /// Cells created by `MakeCell` in this activation
    pub cells: Vec<Option<GcRef>>,
    /// Arguments as passed by the caller
    pub arguments: Vec<Value>,
}

impl CallFrame {
    /// Create a frame starting at instruction 0
    pub fn new(closure: GcRef, proto: Rc<FunctionProto>, upvalues: Vec<GcRef>, base: usize, arguments: Vec<Value>) -> Self {
        let cells = vec![None; proto.cell_count as usize];
        Self {
            closure,
            proto,
            upvalues,
            ip: 0,
            base,
            cells,
            arguments,
        }
    }

    /// Stack trace entry for the instruction last executed in this frame
    pub fn stack_frame(&self) -> StackFrame {
        let position = self
            .proto
            .position_at(self.ip.saturating_sub(1))
            .unwrap_or_default();
        StackFrame {
            function_name: Some(self.proto.display_name().to_string()),
            source_url: self.proto.source_name.as_deref().map(str::to_string),
            line: position.line,
            column: position.column,
        }
    }
}

impl RootSource for CallFrame {
    fn trace_roots(&self, tracer: &mut Tracer) {
        tracer.mark_ref(self.closure);
        for cell in self.cells.iter().flatten() {
            tracer.mark_ref(*cell);
        }
        for upvalue in &self.upvalues {
            tracer.mark_ref(*upvalue);
        }
        self.arguments.trace_roots(tracer);
    }
}

/// An active `try` region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// Index of the frame that registered the handler
    pub frame_depth: usize,
    /// Where the catch code starts in that frame
    pub catch_ip: usize,
    /// Operand stack height to restore before resuming
    pub stack_height: usize,
}
