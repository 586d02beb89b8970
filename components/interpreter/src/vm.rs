//! Virtual Machine for bytecode execution
//!
//! A [`Vm`] is the single runtime context of one script: heap, global
//! table, operand stack, frames, handler stack and native table all live
//! here and are torn down with it.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use bytecode_system::FunctionProto;
use core_types::{ErrorKind, GcRef, NativeId, ScriptError, StackFrame, Value};
use memory_manager::{Closure, GcStats, Heap, HeapObject};
use tracing::debug;

use crate::bridge::NativeFn;
use crate::call_frame::{CallFrame, Handler};
use crate::config::VmConfig;
use crate::exception::Exception;

pub(crate) struct NativeEntry {
    pub(crate) name: Rc<str>,
    pub(crate) function: NativeFn,
}

/// Virtual Machine for executing compiled scripts
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use bytecode_system::{Constant, FunctionProto, Opcode};
/// use core_types::{SourcePosition, Value};
/// use interpreter::Vm;
///
/// let mut proto = FunctionProto::new(Some("<script>".to_string()));
/// let idx = proto.add_constant(Constant::Number(42.0));
/// proto.emit(Opcode::LoadConst(idx), SourcePosition::default());
/// proto.emit(Opcode::Return, SourcePosition::default());
///
/// let mut vm = Vm::new();
/// assert_eq!(vm.run(Rc::new(proto)).unwrap(), Value::Number(42.0));
/// ```
pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) handlers: Vec<Handler>,
    pub(crate) globals: HashMap<Rc<str>, Value>,
    pub(crate) natives: Vec<NativeEntry>,
    pub(crate) temp_roots: Vec<Value>,
    pub(crate) pending_trace: Option<Vec<StackFrame>>,
    output: Box<dyn Write>,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("stack_depth", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("handlers", &self.handlers.len())
            .field("globals", &self.globals.len())
            .field("natives", &self.natives.len())
            .field("heap_objects", &self.heap.len())
            .finish()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a VM with the default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with the given configuration
    pub fn with_config(config: VmConfig) -> Self {
        let heap = Heap::new(config.gc.clone());
        Self {
            config,
            heap,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(64),
            handlers: Vec::new(),
            globals: HashMap::new(),
            natives: Vec::new(),
            temp_roots: Vec::new(),
            pending_trace: None,
            output: Box::new(io::stdout()),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Run a compiled script to completion.
    ///
    /// Returns the script's result value (the operand of a top-level
    /// `return`, or null). A throw that no handler catches becomes an
    /// [`ErrorKind::Uncaught`] error; `exit(n)` becomes [`ErrorKind::Exit`].
    pub fn run(&mut self, proto: Rc<FunctionProto>) -> Result<Value, ScriptError> {
        self.reset_execution_state();
        let closure = self.heap.alloc_closure(Closure {
            proto: proto.clone(),
            upvalues: Vec::new(),
        });
        let locals = proto.local_count as usize;
        self.stack.resize(locals, Value::Null);
        self.frames.push(CallFrame::new(closure, proto, Vec::new(), 0, Vec::new()));

        let result = self.dispatch(0, 0);
        let outcome = match result {
            Ok(value) => Ok(value),
            Err(exception) => Err(self.into_script_error(exception)),
        };
        self.reset_execution_state();
        outcome
    }

    fn reset_execution_state(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.handlers.clear();
        self.temp_roots.clear();
        self.pending_trace = None;
    }

    /// Convert an escaped exception into the host-facing error
    pub(crate) fn into_script_error(&mut self, exception: Exception) -> ScriptError {
        match exception {
            Exception::Throw(value) => {
                let stack = self.pending_trace.take().unwrap_or_default();
                let message = self.describe_thrown(&value);
                debug!(%message, "uncaught exception");
                let error = ScriptError::new(ErrorKind::Uncaught, message);
                let position = stack.first().map(|frame| {
                    core_types::SourcePosition::new(frame.line, frame.column, 0)
                });
                let error = error.with_stack(stack);
                match position {
                    Some(position) => error.with_position(position),
                    None => error,
                }
            }
            Exception::Exit(status) => {
                ScriptError::new(ErrorKind::Exit(status), format!("exit({})", status))
            }
            Exception::Fatal(error) => error,
        }
    }

    /// `Name: message` for error objects, display text for anything else
    pub fn describe_thrown(&self, value: &Value) -> String {
        if let Value::Object(r) = value {
            if let Some(HeapObject::Object(props)) = self.heap.get(*r) {
                if let (Some(Value::String(name)), Some(Value::String(message))) =
                    (props.get("name"), props.get("message"))
                {
                    return format!("{}: {}", name, message);
                }
            }
        }
        self.display(value)
    }

    /// Read a global
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Create or overwrite a global
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(Rc::from(name), value);
    }

    /// Remove a global, returning its value
    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        self.globals.remove(name)
    }

    /// Register a host function and bind it to a global of the same name
    pub fn register_native(&mut self, name: &str, function: NativeFn) -> Value {
        let id = NativeId::from_index(self.natives.len());
        self.natives.push(NativeEntry {
            name: Rc::from(name),
            function,
        });
        let value = Value::NativeFunction(id);
        self.set_global(name, value.clone());
        value
    }

    /// Registered name of a native
    pub fn native_name(&self, id: NativeId) -> Option<&str> {
        self.natives.get(id.index()).map(|entry| &*entry.name)
    }

    /// The collected heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Collector statistics
    pub fn gc_stats(&self) -> &GcStats {
        self.heap.stats()
    }

    /// Number of script frames currently executing
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Redirect script output (`print`, `dump`)
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    /// Writer for script output
    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Look up a closure's prototype name, for display
    pub(crate) fn closure_name(&self, r: GcRef) -> Option<&str> {
        match self.heap.get(r) {
            Some(HeapObject::Closure(closure)) => Some(closure.proto.display_name()),
            _ => None,
        }
    }

    /// Snapshot of the script frames, innermost first
    pub fn stack_trace(&self) -> Vec<StackFrame> {
        self.frames.iter().rev().map(CallFrame::stack_frame).collect()
    }
}
