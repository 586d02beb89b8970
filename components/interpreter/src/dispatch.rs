//! Dispatch loop for bytecode execution
//!
//! Handles individual opcode execution, calls and returns, and unwinding
//! to the nearest exception handler.

use std::rc::Rc;

use bytecode_system::{Capture, Constant, Opcode};
use core_types::{GcRef, NativeId, Value};
use memory_manager::{Closure, HeapObject, PropertyMap};

use crate::call_frame::{CallFrame, Handler};
use crate::exception::Exception;
use crate::operators::BinaryOp;
use crate::vm::Vm;

/// What a call instruction did
pub(crate) enum CallOutcome {
    /// A script frame was pushed; the result arrives on its return
    Entered,
    /// A native ran; its result is on top of the stack
    Completed,
}

impl Vm {
    /// Run frames until the frame at `frame_floor` returns.
    ///
    /// Handlers below `handler_floor` belong to an outer activation of the
    /// loop and are never used here; a throw that finds no handler above
    /// the floor abandons this activation and is returned to the caller.
    pub(crate) fn dispatch(&mut self, frame_floor: usize, handler_floor: usize) -> Result<Value, Exception> {
        loop {
            match self.step(frame_floor) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(Exception::Throw(value)) => {
                    if self.pending_trace.is_none() {
                        self.pending_trace = Some(self.stack_trace());
                    }
                    self.unwind(value, frame_floor, handler_floor)?;
                }
                Err(other) => {
                    self.abandon(frame_floor, handler_floor);
                    return Err(other);
                }
            }
        }
    }

    fn unwind(&mut self, value: Value, frame_floor: usize, handler_floor: usize) -> Result<(), Exception> {
        if self.handlers.len() > handler_floor {
            if let Some(handler) = self.handlers.pop() {
                self.frames.truncate(handler.frame_depth + 1);
                self.stack.truncate(handler.stack_height);
                self.stack.push(value);
                if let Some(frame) = self.frames.last_mut() {
                    frame.ip = handler.catch_ip;
                }
                self.pending_trace = None;
                return Ok(());
            }
        }
        self.abandon(frame_floor, handler_floor);
        Err(Exception::Throw(value))
    }

    fn abandon(&mut self, frame_floor: usize, handler_floor: usize) {
        self.frames.truncate(frame_floor);
        self.handlers.truncate(handler_floor);
    }

    fn frame(&self) -> Result<&CallFrame, Exception> {
        self.frames.last().ok_or_else(|| Exception::internal("no active frame"))
    }

    fn frame_mut(&mut self) -> Result<&mut CallFrame, Exception> {
        self.frames
            .last_mut()
            .ok_or_else(|| Exception::internal("no active frame"))
    }

    pub(crate) fn pop(&mut self) -> Result<Value, Exception> {
        self.stack
            .pop()
            .ok_or_else(|| Exception::internal("operand stack underflow"))
    }

    fn peek(&self) -> Result<&Value, Exception> {
        self.stack
            .last()
            .ok_or_else(|| Exception::internal("operand stack underflow"))
    }

    fn constant(&self, index: u32) -> Result<Value, Exception> {
        match self.frame()?.proto.constants.get(index as usize) {
            Some(Constant::Number(n)) => Ok(Value::Number(*n)),
            Some(Constant::String(s)) => Ok(Value::String(s.clone())),
            None => Err(Exception::internal(format!("constant {} out of range", index))),
        }
    }

    fn constant_name(&self, index: u32) -> Result<Rc<str>, Exception> {
        match self.frame()?.proto.constants.get(index as usize) {
            Some(Constant::String(s)) => Ok(s.clone()),
            _ => Err(Exception::internal(format!("constant {} is not a name", index))),
        }
    }

    fn local_index(&self, slot: u32) -> Result<usize, Exception> {
        let index = self.frame()?.base + slot as usize;
        if index < self.stack.len() {
            Ok(index)
        } else {
            Err(Exception::internal(format!("local slot {} out of range", slot)))
        }
    }

    fn cell_ref(&self, slot: u32) -> Result<GcRef, Exception> {
        self.frame()?
            .cells
            .get(slot as usize)
            .copied()
            .flatten()
            .ok_or_else(|| Exception::internal(format!("cell {} not created", slot)))
    }

    fn upvalue_ref(&self, index: u32) -> Result<GcRef, Exception> {
        self.frame()?
            .upvalues
            .get(index as usize)
            .copied()
            .ok_or_else(|| Exception::internal(format!("upvalue {} out of range", index)))
    }

    fn read_cell(&self, cell: GcRef) -> Result<Value, Exception> {
        match self.heap.get(cell) {
            Some(HeapObject::Cell(value)) => Ok(value.clone()),
            _ => Err(Exception::internal("dangling cell")),
        }
    }

    fn write_cell(&mut self, cell: GcRef, value: Value) -> Result<(), Exception> {
        match self.heap.get_mut(cell) {
            Some(HeapObject::Cell(slot)) => {
                *slot = value;
                Ok(())
            }
            _ => Err(Exception::internal("dangling cell")),
        }
    }

    /// Branch condition; only booleans are accepted
    fn condition(&mut self, value: &Value) -> Result<bool, Exception> {
        match value {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.type_error("Condition must be boolean")),
        }
    }

    /// Execute one instruction. Returns a value when the frame at
    /// `frame_floor` returns.
    fn step(&mut self, frame_floor: usize) -> Result<Option<Value>, Exception> {
        let (opcode, ip) = {
            let frame = self.frame_mut()?;
            let ip = frame.ip;
            let opcode = match frame.proto.instructions.get(ip) {
                Some(instruction) => instruction.opcode,
                None => return Err(Exception::internal("instruction pointer out of range")),
            };
            frame.ip += 1;
            (opcode, ip)
        };

        if opcode.allocates() {
            self.safepoint();
        }

        match opcode {
            Opcode::LoadConst(index) => {
                let value = self.constant(index)?;
                self.stack.push(value);
            }
            Opcode::LoadNull => self.stack.push(Value::Null),
            Opcode::LoadTrue => self.stack.push(Value::Boolean(true)),
            Opcode::LoadFalse => self.stack.push(Value::Boolean(false)),
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let value = self.peek()?.clone();
                self.stack.push(value);
            }
            Opcode::Dup2 => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(Exception::internal("operand stack underflow"));
                }
                let pair = [self.stack[len - 2].clone(), self.stack[len - 1].clone()];
                self.stack.extend(pair);
            }

            Opcode::LoadLocal(slot) => {
                let index = self.local_index(slot)?;
                let value = self.stack[index].clone();
                self.stack.push(value);
            }
            Opcode::StoreLocal(slot) => {
                let value = self.pop()?;
                let index = self.local_index(slot)?;
                self.stack[index] = value;
            }
            Opcode::MakeCell(slot) => {
                let cell = self.heap.alloc_cell(Value::Null);
                let frame = self.frame_mut()?;
                match frame.cells.get_mut(slot as usize) {
                    Some(entry) => *entry = Some(cell),
                    None => return Err(Exception::internal(format!("cell {} out of range", slot))),
                }
            }
            Opcode::LoadCell(slot) => {
                let value = self.read_cell(self.cell_ref(slot)?)?;
                self.stack.push(value);
            }
            Opcode::StoreCell(slot) => {
                let value = self.pop()?;
                let cell = self.cell_ref(slot)?;
                self.write_cell(cell, value)?;
            }
            Opcode::LoadUpvalue(index) => {
                let value = self.read_cell(self.upvalue_ref(index)?)?;
                self.stack.push(value);
            }
            Opcode::StoreUpvalue(index) => {
                let value = self.pop()?;
                let cell = self.upvalue_ref(index)?;
                self.write_cell(cell, value)?;
            }
            Opcode::LoadGlobal(index) => {
                let name = self.constant_name(index)?;
                match self.globals.get(&name) {
                    Some(value) => {
                        let value = value.clone();
                        self.stack.push(value);
                    }
                    None => return Err(self.reference_error(format!("'{}' is not defined", name))),
                }
            }
            Opcode::StoreGlobal(index) => {
                let name = self.constant_name(index)?;
                let value = self.pop()?;
                match self.globals.get_mut(&name) {
                    Some(slot) => *slot = value,
                    None => return Err(self.reference_error(format!("'{}' is not defined", name))),
                }
            }
            Opcode::DefineGlobal(index) => {
                let name = self.constant_name(index)?;
                let value = self.pop()?;
                self.globals.insert(name, value);
            }
            Opcode::DeleteGlobal(index) => {
                let name = self.constant_name(index)?;
                self.globals.remove(&name);
            }

            Opcode::Add => self.binary(BinaryOp::Add)?,
            Opcode::Sub => self.binary(BinaryOp::Sub)?,
            Opcode::Mul => self.binary(BinaryOp::Mul)?,
            Opcode::Div => self.binary(BinaryOp::Div)?,
            Opcode::Mod => self.binary(BinaryOp::Mod)?,
            Opcode::Pow => self.binary(BinaryOp::Pow)?,
            Opcode::Lt => self.binary(BinaryOp::Lt)?,
            Opcode::Le => self.binary(BinaryOp::Le)?,
            Opcode::Gt => self.binary(BinaryOp::Gt)?,
            Opcode::Ge => self.binary(BinaryOp::Ge)?,
            Opcode::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(a == b));
            }
            Opcode::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(a != b));
            }
            Opcode::Neg => {
                let n = self.pop_number("-")?;
                self.stack.push(Value::Number(-n));
            }
            Opcode::Plus => {
                let n = self.pop_number("+")?;
                self.stack.push(Value::Number(n));
            }
            Opcode::Increment => {
                let n = self.pop_number("++")?;
                self.stack.push(Value::Number(n + 1.0));
            }
            Opcode::Decrement => {
                let n = self.pop_number("--")?;
                self.stack.push(Value::Number(n - 1.0));
            }
            Opcode::Not => {
                let value = self.pop()?;
                let b = self.condition(&value)?;
                self.stack.push(Value::Boolean(!b));
            }
            Opcode::TypeOf => {
                let value = self.pop()?;
                self.stack.push(Value::from(value.type_of()));
            }

            Opcode::Jump(target) => {
                if (target as usize) <= ip {
                    self.safepoint();
                }
                self.frame_mut()?.ip = target as usize;
            }
            Opcode::JumpIfFalse(target) => {
                let value = self.pop()?;
                if !self.condition(&value)? {
                    self.frame_mut()?.ip = target as usize;
                }
            }
            Opcode::JumpIfTrue(target) => {
                let value = self.pop()?;
                if self.condition(&value)? {
                    if (target as usize) <= ip {
                        self.safepoint();
                    }
                    self.frame_mut()?.ip = target as usize;
                }
            }
            Opcode::JumpIfFalseOrPop(target) => {
                let value = self.peek()?.clone();
                if self.condition(&value)? {
                    self.pop()?;
                } else {
                    self.frame_mut()?.ip = target as usize;
                }
            }
            Opcode::JumpIfTrueOrPop(target) => {
                let value = self.peek()?.clone();
                if self.condition(&value)? {
                    self.frame_mut()?.ip = target as usize;
                } else {
                    self.pop()?;
                }
            }
            Opcode::JumpIfNull(target) => {
                if self.peek()?.is_null() {
                    self.frame_mut()?.ip = target as usize;
                }
            }
            Opcode::JumpIfNotNull(target) => {
                if !self.peek()?.is_null() {
                    self.frame_mut()?.ip = target as usize;
                }
            }
            Opcode::CheckBoolean => {
                let value = self.peek()?.clone();
                self.condition(&value)?;
            }

            Opcode::NewArray => {
                let array = self.heap.alloc_array(Vec::new());
                self.stack.push(Value::Array(array));
            }
            Opcode::ArrayPush => {
                let value = self.pop()?;
                let array = self.peek()?.clone();
                self.array_append(&array, vec![value])?;
            }
            Opcode::ArraySpread => {
                let source = self.pop()?;
                let items = match &source {
                    Value::Array(_) => self.array_elements(&source)?,
                    other => {
                        let message = format!("Cannot spread a value of type '{}'", other.type_of());
                        return Err(self.type_error(message));
                    }
                };
                let array = self.peek()?.clone();
                self.array_append(&array, items)?;
            }
            Opcode::NewObject => {
                let object = self.heap.alloc_object(PropertyMap::new());
                self.stack.push(Value::Object(object));
            }
            Opcode::ObjectInsert(index) => {
                let key = self.constant_name(index)?;
                let value = self.pop()?;
                let object = self.peek()?.clone();
                self.set_member(&object, &Value::String(key), value)?;
            }
            Opcode::GetMember => {
                let key = self.pop()?;
                let container = self.pop()?;
                let value = self.get_member(&container, &key)?;
                self.stack.push(value);
            }
            Opcode::SetMember => {
                let value = self.pop()?;
                let key = self.pop()?;
                let container = self.pop()?;
                self.set_member(&container, &key, value.clone())?;
                self.stack.push(value);
            }
            Opcode::DeleteMember => {
                let key = self.pop()?;
                let container = self.pop()?;
                self.delete_member(&container, &key)?;
            }

            Opcode::IterInit(kind) => {
                let iterable = self.pop()?;
                let items = self.iteration_items(kind, &iterable)?;
                let snapshot = self.heap.alloc_array(items);
                self.stack.push(Value::Array(snapshot));
                self.stack.push(Value::Number(0.0));
            }
            Opcode::IterNext(target) => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(Exception::internal("iterator state missing"));
                }
                let cursor = self.stack[len - 1].as_index().unwrap_or(usize::MAX);
                let item = match &self.stack[len - 2] {
                    Value::Array(r) => match self.heap.get(*r) {
                        Some(HeapObject::Array(items)) => items.get(cursor).cloned(),
                        _ => None,
                    },
                    _ => None,
                };
                match item {
                    Some(item) => {
                        self.stack[len - 1] = Value::Number((cursor + 1) as f64);
                        self.stack.push(item);
                    }
                    None => self.frame_mut()?.ip = target as usize,
                }
            }

            Opcode::MakeClosure(index) => {
                let closure = self.make_closure(index)?;
                self.stack.push(Value::Function(closure));
            }
            Opcode::Call(argc) => {
                self.safepoint();
                self.call_on_stack(argc as usize)?;
            }
            Opcode::CallSpread => {
                self.safepoint();
                let args = self.pop()?;
                let items = match &args {
                    Value::Array(_) => self.array_elements(&args)?,
                    _ => return Err(Exception::internal("spread call without argument array")),
                };
                let argc = items.len();
                self.stack.extend(items);
                self.call_on_stack(argc)?;
            }
            Opcode::Return => {
                let value = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| Exception::internal("return without frame"))?;
                let depth = self.frames.len();
                while self.handlers.last().map_or(false, |h| h.frame_depth >= depth) {
                    self.handlers.pop();
                }
                self.stack.truncate(frame.base);
                if depth <= frame_floor {
                    return Ok(Some(value));
                }
                self.stack.push(value);
            }
            Opcode::LoadArgument(index) => {
                let value = self
                    .frame()?
                    .arguments
                    .get(index as usize)
                    .cloned()
                    .unwrap_or(Value::Null);
                self.stack.push(value);
            }
            Opcode::LoadRestArguments(index) => {
                let rest: Vec<Value> = self
                    .frame()?
                    .arguments
                    .iter()
                    .skip(index as usize)
                    .cloned()
                    .collect();
                let array = self.heap.alloc_array(rest);
                self.stack.push(Value::Array(array));
            }

            Opcode::PushHandler(target) => {
                let handler = Handler {
                    frame_depth: self.frames.len() - 1,
                    catch_ip: target as usize,
                    stack_height: self.stack.len(),
                };
                self.handlers.push(handler);
            }
            Opcode::PopHandler => {
                self.handlers.pop();
            }
            Opcode::Throw => {
                let value = self.pop()?;
                return Err(Exception::Throw(value));
            }
        }
        Ok(None)
    }

    fn pop_number(&mut self, operator: &str) -> Result<f64, Exception> {
        match self.pop()? {
            Value::Number(n) => Ok(n),
            other => {
                let message = format!("Operand of '{}' must be a number, got {}", operator, other.type_of());
                Err(self.type_error(message))
            }
        }
    }

    fn binary(&mut self, op: BinaryOp) -> Result<(), Exception> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = self.binary_op(op, &a, &b)?;
        self.stack.push(result);
        Ok(())
    }

    fn make_closure(&mut self, index: u32) -> Result<GcRef, Exception> {
        let frame = self.frame()?;
        let proto = frame
            .proto
            .nested
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Exception::internal(format!("nested function {} out of range", index)))?;
        let mut upvalues = Vec::with_capacity(proto.captures.len());
        for capture in &proto.captures {
            let cell = match capture {
                Capture::Cell(slot) => frame.cells.get(*slot as usize).copied().flatten(),
                Capture::Upvalue(i) => frame.upvalues.get(*i as usize).copied(),
            };
            upvalues.push(cell.ok_or_else(|| Exception::internal("capture of a missing cell"))?);
        }
        Ok(self.heap.alloc_closure(Closure { proto, upvalues }))
    }

    /// Call the value below the top `argc` stack entries.
    ///
    /// Script callees get a new frame whose base replaces the callee slot;
    /// natives run immediately with their arguments still on the stack so
    /// they stay rooted for the duration of the call.
    pub(crate) fn call_on_stack(&mut self, argc: usize) -> Result<CallOutcome, Exception> {
        let callee_index = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or_else(|| Exception::internal("operand stack underflow"))?;
        let callee = self.stack[callee_index].clone();
        match callee {
            Value::Function(r) => {
                if self.frames.len() >= self.config.max_call_depth {
                    let message = format!("Maximum call depth of {} exceeded", self.config.max_call_depth);
                    return Err(self.range_error(message));
                }
                let (proto, upvalues) = match self.heap.get(r) {
                    Some(HeapObject::Closure(closure)) => (closure.proto.clone(), closure.upvalues.clone()),
                    _ => return Err(Exception::internal("function value without closure")),
                };
                let arguments = self.stack.split_off(callee_index + 1);
                self.stack.truncate(callee_index);
                let base = self.stack.len();
                self.stack.resize(base + proto.local_count as usize, Value::Null);
                self.frames.push(CallFrame::new(r, proto, upvalues, base, arguments));
                Ok(CallOutcome::Entered)
            }
            Value::NativeFunction(id) => {
                let args = self.stack[callee_index + 1..].to_vec();
                let result = self.invoke_native(id, &args)?;
                self.stack.truncate(callee_index);
                self.stack.push(result);
                Ok(CallOutcome::Completed)
            }
            other => {
                let message = format!("Value of type '{}' is not callable", other.type_of());
                Err(self.type_error(message))
            }
        }
    }

    fn invoke_native(&mut self, id: NativeId, args: &[Value]) -> Result<Value, Exception> {
        let function = self
            .natives
            .get(id.index())
            .map(|entry| entry.function)
            .ok_or_else(|| Exception::internal(format!("unknown native {:?}", id)))?;
        let roots = self.temp_roots.len();
        let result = function(self, args);
        self.temp_roots.truncate(roots);
        result
    }
}
