//! Bytecode generation from the resolved AST.
//!
//! One [`FunctionProto`] is produced per function literal, nested inside the
//! prototype of the function that creates it. Variable storage is chosen
//! here from the [`Resolution`] table: captured bindings get a cell slot,
//! other bindings a stack slot, and script top-level bindings live in the
//! global table.

use std::collections::HashMap;
use std::rc::Rc;

use bytecode_system::{Capture, Constant, FunctionProto, IterKind, Opcode, Param};
use core_types::{ErrorKind, ScriptError, SourcePosition};
use tracing::trace;

use crate::ast::*;
use crate::error::syntax_error;
use crate::scope::{direct_bindings, Resolution};

/// Options for one compilation
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Return the value of a trailing expression statement from the script
    pub repl: bool,
    /// Source name recorded in every prototype
    pub source_name: Option<String>,
}

impl CompileOptions {
    /// Options for interactive input
    pub fn repl() -> Self {
        Self {
            repl: true,
            source_name: Some("<repl>".to_string()),
        }
    }

    /// Set the source name
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
enum Storage {
    Local(u32),
    Cell(u32),
    Global(String),
}

#[derive(Debug, Clone)]
enum Location {
    Local(u32),
    Cell(u32),
    Upvalue(u32),
    Global(u32),
}

#[derive(Debug, Default)]
struct LoopContext {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
    continue_target: Option<u32>,
    try_depth: usize,
}

#[derive(Debug, Clone)]
struct TryRegion {
    handler_active: bool,
    finally: Option<Vec<Statement>>,
}

#[derive(Debug)]
struct FunctionState {
    proto: FunctionProto,
    storage: HashMap<BindingId, Storage>,
    captures: Vec<BindingId>,
    next_local: u32,
    next_cell: u32,
    max_local: u32,
    max_cell: u32,
    loops: Vec<LoopContext>,
    try_stack: Vec<TryRegion>,
}

impl FunctionState {
    fn new(proto: FunctionProto) -> Self {
        Self {
            proto,
            storage: HashMap::new(),
            captures: Vec::new(),
            next_local: 0,
            next_cell: 0,
            max_local: 0,
            max_cell: 0,
            loops: Vec::new(),
            try_stack: Vec::new(),
        }
    }

    fn alloc_local(&mut self) -> u32 {
        let slot = self.next_local;
        self.next_local += 1;
        self.max_local = self.max_local.max(self.next_local);
        slot
    }

    fn alloc_cell(&mut self) -> u32 {
        let slot = self.next_cell;
        self.next_cell += 1;
        self.max_cell = self.max_cell.max(self.next_cell);
        slot
    }

    fn finish(mut self) -> FunctionProto {
        self.proto.local_count = self.max_local;
        self.proto.cell_count = self.max_cell;
        self.proto
    }
}

type Slots = (u32, u32);

/// Bytecode generator that turns a resolved program into a script prototype
pub struct BytecodeGenerator<'r> {
    resolution: &'r Resolution,
    options: CompileOptions,
    source_name: Option<Rc<str>>,
    enclosing: Vec<FunctionState>,
    current: FunctionState,
}

impl<'r> BytecodeGenerator<'r> {
    /// Create a generator over a resolution table
    pub fn new(resolution: &'r Resolution, options: CompileOptions) -> Self {
        let source_name: Option<Rc<str>> = options.source_name.as_deref().map(Rc::from);
        let mut script = FunctionProto::new(Some("<script>".to_string()));
        script.source_name = source_name.clone();
        Self {
            resolution,
            options,
            source_name,
            enclosing: Vec::new(),
            current: FunctionState::new(script),
        }
    }

    /// Generate the script prototype
    pub fn generate(mut self, program: &Program) -> Result<FunctionProto, ScriptError> {
        let saved = self.enter_block(&program.body)?;
        let last = program.body.len().checked_sub(1);
        for (i, statement) in program.body.iter().enumerate() {
            match statement {
                Statement::ExpressionStatement {
                    expression,
                    position,
                } if self.options.repl && Some(i) == last => {
                    self.compile_expression(expression)?;
                    self.emit(Opcode::Return, *position);
                }
                _ => self.compile_statement(statement)?,
            }
        }
        self.exit_block(saved);

        let end = self.end_position();
        self.emit(Opcode::LoadNull, end);
        self.emit(Opcode::Return, end);

        let proto = self.current.finish();
        trace!(
            instructions = proto.instructions.len(),
            locals = proto.local_count,
            cells = proto.cell_count,
            "compiled <script>"
        );
        Ok(proto)
    }

    fn emit(&mut self, opcode: Opcode, position: SourcePosition) -> usize {
        self.current.proto.emit(opcode, position)
    }

    fn offset(&self) -> u32 {
        self.current.proto.current_offset()
    }

    fn patch(&mut self, at: usize) {
        self.current.proto.patch_jump(at);
    }

    fn patch_to(&mut self, at: usize, target: u32) {
        self.current.proto.patch_jump_to(at, target);
    }

    fn end_position(&self) -> SourcePosition {
        self.current
            .proto
            .instructions
            .last()
            .map(|inst| inst.source_position)
            .unwrap_or_default()
    }

    fn string_constant(&mut self, s: &str) -> u32 {
        self.current.proto.add_string(s)
    }

    fn level(&self) -> usize {
        self.enclosing.len()
    }

    fn state_at(&mut self, level: usize) -> &mut FunctionState {
        if level >= self.enclosing.len() {
            &mut self.current
        } else {
            &mut self.enclosing[level]
        }
    }

    // Scopes and storage

    fn declare_binding(&mut self, binding: &Binding) {
        let storage = if self.resolution.is_global(binding.id) {
            Storage::Global(binding.name.clone())
        } else if self.resolution.is_captured(binding.id) {
            let slot = self.current.alloc_cell();
            self.emit(Opcode::MakeCell(slot), binding.position);
            Storage::Cell(slot)
        } else {
            Storage::Local(self.current.alloc_local())
        };
        self.current.storage.insert(binding.id, storage);
    }

    /// Declare a block's bindings and create its hoisted functions
    fn enter_block(&mut self, body: &[Statement]) -> Result<Slots, ScriptError> {
        let saved = (self.current.next_local, self.current.next_cell);
        for binding in direct_bindings(body) {
            self.declare_binding(binding);
        }
        for statement in body {
            if let Statement::FunctionDeclaration { binding, function } = statement {
                self.compile_function(function)?;
                self.store_binding(binding)?;
            }
        }
        Ok(saved)
    }

    fn exit_block(&mut self, saved: Slots) {
        self.current.next_local = saved.0;
        self.current.next_cell = saved.1;
    }

    fn compile_block(&mut self, body: &[Statement]) -> Result<(), ScriptError> {
        let saved = self.enter_block(body)?;
        for statement in body {
            self.compile_statement(statement)?;
        }
        self.exit_block(saved);
        Ok(())
    }

    fn compile_substatement(&mut self, statement: &Statement) -> Result<(), ScriptError> {
        match statement {
            Statement::Block { body, .. } => self.compile_block(body),
            other => self.compile_block(std::slice::from_ref(other)),
        }
    }

    fn binding_location(&mut self, id: BindingId, name: &str) -> Result<Location, ScriptError> {
        match self.current.storage.get(&id).cloned() {
            Some(Storage::Local(slot)) => Ok(Location::Local(slot)),
            Some(Storage::Cell(slot)) => Ok(Location::Cell(slot)),
            Some(Storage::Global(name)) => Ok(Location::Global(self.string_constant(&name))),
            None if self.resolution.is_global(id) => Ok(Location::Global(self.string_constant(name))),
            None => {
                let level = self.level();
                Ok(Location::Upvalue(self.resolve_upvalue(level, id, name)?))
            }
        }
    }

    fn resolve_upvalue(&mut self, level: usize, id: BindingId, name: &str) -> Result<u32, ScriptError> {
        if let Some(index) = self.state_at(level).captures.iter().position(|b| *b == id) {
            return Ok(index as u32);
        }
        if level == 0 {
            return Err(ScriptError::new(
                ErrorKind::InternalError,
                format!("Unresolvable captured variable '{}'", name),
            ));
        }
        let parent_storage = self.state_at(level - 1).storage.get(&id).cloned();
        let capture = match parent_storage {
            Some(Storage::Cell(slot)) => Capture::Cell(slot),
            Some(_) => {
                return Err(ScriptError::new(
                    ErrorKind::InternalError,
                    format!("Captured variable '{}' has no cell", name),
                ))
            }
            None => Capture::Upvalue(self.resolve_upvalue(level - 1, id, name)?),
        };
        let state = self.state_at(level);
        state.captures.push(id);
        state.proto.captures.push(capture);
        Ok((state.captures.len() - 1) as u32)
    }

    fn identifier_location(&mut self, identifier: &Identifier) -> Result<Location, ScriptError> {
        match self.resolution.binding_of(identifier.ref_id) {
            Some(id) => self.binding_location(id, &identifier.name),
            None => Ok(Location::Global(self.string_constant(&identifier.name))),
        }
    }

    fn emit_load(&mut self, location: Location, position: SourcePosition) {
        let opcode = match location {
            Location::Local(slot) => Opcode::LoadLocal(slot),
            Location::Cell(slot) => Opcode::LoadCell(slot),
            Location::Upvalue(index) => Opcode::LoadUpvalue(index),
            Location::Global(name) => Opcode::LoadGlobal(name),
        };
        self.emit(opcode, position);
    }

    fn emit_store(&mut self, location: Location, position: SourcePosition) {
        let opcode = match location {
            Location::Local(slot) => Opcode::StoreLocal(slot),
            Location::Cell(slot) => Opcode::StoreCell(slot),
            Location::Upvalue(index) => Opcode::StoreUpvalue(index),
            Location::Global(name) => Opcode::StoreGlobal(name),
        };
        self.emit(opcode, position);
    }

    /// Pop the top value into a declaration; globals are created if needed
    fn store_binding(&mut self, binding: &Binding) -> Result<(), ScriptError> {
        match self.binding_location(binding.id, &binding.name)? {
            Location::Global(name) => {
                self.emit(Opcode::DefineGlobal(name), binding.position);
            }
            location => self.emit_store(location, binding.position),
        }
        Ok(())
    }

    // Statements

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), ScriptError> {
        match statement {
            Statement::LetDeclaration { declarations, .. } => {
                for declarator in declarations {
                    match &declarator.init {
                        Some(init) => self.compile_expression(init)?,
                        None => {
                            self.emit(Opcode::LoadNull, declarator.binding.position);
                        }
                    }
                    self.store_binding(&declarator.binding)?;
                }
            }
            Statement::ExpressionStatement {
                expression,
                position,
            } => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, *position);
            }
            Statement::Block { body, .. } => self.compile_block(body)?,
            Statement::If {
                test,
                consequent,
                alternate,
                position,
            } => {
                self.compile_expression(test)?;
                let to_else = self.emit(Opcode::JumpIfFalse(0), *position);
                self.compile_substatement(consequent)?;
                match alternate {
                    Some(alternate) => {
                        let to_end = self.emit(Opcode::Jump(0), *position);
                        self.patch(to_else);
                        self.compile_substatement(alternate)?;
                        self.patch(to_end);
                    }
                    None => self.patch(to_else),
                }
            }
            Statement::While {
                test,
                body,
                position,
            } => {
                let start = self.offset();
                self.compile_expression(test)?;
                let exit = self.emit(Opcode::JumpIfFalse(0), *position);
                self.push_loop(Some(start));
                self.compile_substatement(body)?;
                self.emit(Opcode::Jump(start), *position);
                self.patch(exit);
                self.pop_loop();
            }
            Statement::DoWhile {
                body,
                test,
                position,
            } => {
                let start = self.offset();
                self.push_loop(None);
                self.compile_substatement(body)?;
                self.patch_continues();
                self.compile_expression(test)?;
                self.emit(Opcode::JumpIfTrue(start), *position);
                self.pop_loop();
            }
            Statement::For {
                init,
                test,
                update,
                body,
                position,
            } => self.compile_for(init.as_deref(), test.as_ref(), update.as_ref(), body, *position)?,
            Statement::ForEach {
                kind,
                binding,
                iterable,
                body,
                position,
            } => self.compile_for_each(*kind, binding, iterable, body, *position)?,
            Statement::Break { position } => {
                let depth = self.innermost_loop_try_depth(*position)?;
                self.unwind_regions(depth)?;
                let jump = self.emit(Opcode::Jump(0), *position);
                if let Some(context) = self.current.loops.last_mut() {
                    context.break_jumps.push(jump);
                }
            }
            Statement::Continue { position } => {
                let depth = self.innermost_loop_try_depth(*position)?;
                self.unwind_regions(depth)?;
                let target = self.current.loops.last().and_then(|c| c.continue_target);
                match target {
                    Some(target) => {
                        self.emit(Opcode::Jump(target), *position);
                    }
                    None => {
                        let jump = self.emit(Opcode::Jump(0), *position);
                        if let Some(context) = self.current.loops.last_mut() {
                            context.continue_jumps.push(jump);
                        }
                    }
                }
            }
            Statement::FunctionDeclaration { .. } => {}
            Statement::Return { argument, position } => {
                match argument {
                    Some(argument) => self.compile_expression(argument)?,
                    None => {
                        self.emit(Opcode::LoadNull, *position);
                    }
                }
                self.unwind_regions(0)?;
                self.emit(Opcode::Return, *position);
            }
            Statement::Throw { argument, position } => {
                self.compile_expression(argument)?;
                self.emit(Opcode::Throw, *position);
            }
            Statement::Try {
                block,
                handler,
                finalizer,
                position,
            } => self.compile_try(block, handler.as_ref(), finalizer.as_ref(), *position)?,
            Statement::Delete { target, position } => self.compile_delete(target, *position)?,
            Statement::Empty => {}
        }
        Ok(())
    }

    fn push_loop(&mut self, continue_target: Option<u32>) {
        let try_depth = self.current.try_stack.len();
        self.current.loops.push(LoopContext {
            continue_target,
            try_depth,
            ..LoopContext::default()
        });
    }

    /// Point pending `continue` jumps of the innermost loop here
    fn patch_continues(&mut self) {
        let target = self.offset();
        let pending = match self.current.loops.last_mut() {
            Some(context) => std::mem::take(&mut context.continue_jumps),
            None => Vec::new(),
        };
        for jump in pending {
            self.patch_to(jump, target);
        }
    }

    /// Close the innermost loop, pointing its `break` jumps here
    fn pop_loop(&mut self) {
        if let Some(context) = self.current.loops.pop() {
            for jump in context.break_jumps {
                self.patch(jump);
            }
        }
    }

    fn innermost_loop_try_depth(&self, position: SourcePosition) -> Result<usize, ScriptError> {
        self.current
            .loops
            .last()
            .map(|context| context.try_depth)
            .ok_or_else(|| syntax_error("Jump target outside of loop", Some(position)))
    }

    /// Leave try regions above `depth`, innermost first, running their finally blocks
    fn unwind_regions(&mut self, depth: usize) -> Result<(), ScriptError> {
        let saved = self.current.try_stack.clone();
        for index in (depth..saved.len()).rev() {
            let region = &saved[index];
            if region.handler_active {
                let position = self.end_position();
                self.emit(Opcode::PopHandler, position);
            }
            if let Some(finally) = &region.finally {
                self.current.try_stack.truncate(index);
                self.compile_block(finally)?;
            }
        }
        self.current.try_stack = saved;
        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&Statement>,
        test: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
        position: SourcePosition,
    ) -> Result<(), ScriptError> {
        let saved = match init {
            Some(init) => {
                let saved = self.enter_block(std::slice::from_ref(init))?;
                self.compile_statement(init)?;
                saved
            }
            None => (self.current.next_local, self.current.next_cell),
        };

        let start = self.offset();
        let exit = match test {
            Some(test) => {
                self.compile_expression(test)?;
                Some(self.emit(Opcode::JumpIfFalse(0), position))
            }
            None => None,
        };

        self.push_loop(None);
        self.compile_substatement(body)?;
        self.patch_continues();
        if let Some(update) = update {
            self.compile_expression(update)?;
            self.emit(Opcode::Pop, position);
        }
        self.emit(Opcode::Jump(start), position);
        if let Some(exit) = exit {
            self.patch(exit);
        }
        self.pop_loop();
        self.exit_block(saved);
        Ok(())
    }

    fn compile_for_each(
        &mut self,
        kind: ForKind,
        binding: &Binding,
        iterable: &Expression,
        body: &Statement,
        position: SourcePosition,
    ) -> Result<(), ScriptError> {
        self.compile_expression(iterable)?;
        let iter_kind = match kind {
            ForKind::In => IterKind::Keys,
            ForKind::Of => IterKind::Values,
        };
        self.emit(Opcode::IterInit(iter_kind), position);

        let top = self.offset();
        let next = self.emit(Opcode::IterNext(0), position);
        self.push_loop(Some(top));

        let saved = (self.current.next_local, self.current.next_cell);
        self.declare_binding(binding);
        self.store_binding(binding)?;
        self.compile_substatement(body)?;
        self.exit_block(saved);

        self.emit(Opcode::Jump(top), position);
        self.patch(next);
        self.pop_loop();
        self.emit(Opcode::Pop, position);
        self.emit(Opcode::Pop, position);
        Ok(())
    }

    fn compile_try(
        &mut self,
        block: &[Statement],
        handler: Option<&CatchClause>,
        finalizer: Option<&Vec<Statement>>,
        position: SourcePosition,
    ) -> Result<(), ScriptError> {
        let finally = finalizer.cloned();
        let mut to_after = Vec::new();

        let push = self.emit(Opcode::PushHandler(0), position);
        self.current.try_stack.push(TryRegion {
            handler_active: true,
            finally: finally.clone(),
        });
        self.compile_block(block)?;
        self.current.try_stack.pop();
        self.emit(Opcode::PopHandler, position);
        to_after.push(self.emit(Opcode::Jump(0), position));
        self.patch(push);

        let mut rethrow_handler = None;
        if let Some(handler) = handler {
            let saved = (self.current.next_local, self.current.next_cell);
            self.declare_binding(&handler.param);
            self.store_binding(&handler.param)?;
            if finally.is_some() {
                rethrow_handler = Some(self.emit(Opcode::PushHandler(0), position));
                self.current.try_stack.push(TryRegion {
                    handler_active: true,
                    finally: finally.clone(),
                });
            }
            self.compile_block(&handler.body)?;
            if finally.is_some() {
                self.current.try_stack.pop();
                self.emit(Opcode::PopHandler, position);
            }
            self.exit_block(saved);
            to_after.push(self.emit(Opcode::Jump(0), position));
        } else {
            // The first handler catches straight into the rethrow path
            rethrow_handler = Some(push);
        }

        if let (Some(finally), Some(rethrow_handler)) = (&finally, rethrow_handler) {
            self.patch(rethrow_handler);
            let saved = (self.current.next_local, self.current.next_cell);
            let pending = self.current.alloc_local();
            self.emit(Opcode::StoreLocal(pending), position);
            self.compile_block(finally)?;
            self.emit(Opcode::LoadLocal(pending), position);
            self.emit(Opcode::Throw, position);
            self.exit_block(saved);
        }

        for jump in to_after {
            self.patch(jump);
        }
        if let Some(finally) = &finally {
            self.compile_block(finally)?;
        }
        Ok(())
    }

    fn compile_delete(&mut self, target: &Expression, position: SourcePosition) -> Result<(), ScriptError> {
        match target {
            Expression::Identifier(identifier) => match self.identifier_location(identifier)? {
                Location::Global(name) => {
                    self.emit(Opcode::DeleteGlobal(name), position);
                    Ok(())
                }
                _ => Err(syntax_error(
                    format!("Cannot delete local variable '{}'", identifier.name),
                    Some(position),
                )),
            },
            Expression::Member {
                object, property, ..
            } => {
                self.compile_expression(object)?;
                self.compile_expression(property)?;
                self.emit(Opcode::DeleteMember, position);
                Ok(())
            }
            _ => Err(syntax_error("Invalid delete target", Some(position))),
        }
    }

    // Functions

    fn compile_function(&mut self, function: &FunctionNode) -> Result<(), ScriptError> {
        let mut proto = FunctionProto::new(function.name.clone());
        proto.source_name = self.source_name.clone();
        proto.params = function
            .params
            .iter()
            .map(|param| Param {
                name: param.binding.name.clone(),
                has_default: param.default.is_some(),
                rest: param.rest,
            })
            .collect();

        let parent = std::mem::replace(&mut self.current, FunctionState::new(proto));
        self.enclosing.push(parent);
        let body = self.compile_function_body(function);
        let state = match self.enclosing.pop() {
            Some(parent) => std::mem::replace(&mut self.current, parent),
            None => {
                return Err(ScriptError::new(
                    ErrorKind::InternalError,
                    "function compilation lost its enclosing state",
                ))
            }
        };
        body?;

        let proto = state.finish();
        trace!(
            function = proto.display_name(),
            params = proto.params.len(),
            captures = proto.captures.len(),
            instructions = proto.instructions.len(),
            "compiled function"
        );
        let index = self.current.proto.add_nested(proto);
        self.emit(Opcode::MakeClosure(index), function.position);
        Ok(())
    }

    fn compile_function_body(&mut self, function: &FunctionNode) -> Result<(), ScriptError> {
        for param in &function.params {
            self.declare_binding(&param.binding);
        }
        for (index, param) in function.params.iter().enumerate() {
            let position = param.binding.position;
            let index = index as u32;
            if param.rest {
                self.emit(Opcode::LoadRestArguments(index), position);
            } else {
                self.emit(Opcode::LoadArgument(index), position);
            }
            if let Some(default) = &param.default {
                let skip = self.emit(Opcode::JumpIfNotNull(0), position);
                self.emit(Opcode::Pop, position);
                self.compile_expression(default)?;
                self.patch(skip);
            }
            self.store_binding(&param.binding)?;
        }
        self.compile_block(&function.body)?;
        let end = self.end_position();
        self.emit(Opcode::LoadNull, end);
        self.emit(Opcode::Return, end);
        Ok(())
    }

    // Expressions

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), ScriptError> {
        match expression {
            Expression::Literal { value, position } => self.compile_literal(value, *position),
            Expression::Identifier(identifier) => {
                let location = self.identifier_location(identifier)?;
                self.emit_load(location, identifier.position);
            }
            Expression::Array { elements, position } => {
                self.emit(Opcode::NewArray, *position);
                self.compile_list_into_array(elements)?;
            }
            Expression::Object {
                properties,
                position,
            } => {
                self.emit(Opcode::NewObject, *position);
                for (key, value) in properties {
                    self.compile_expression(value)?;
                    let key = self.string_constant(key);
                    self.emit(Opcode::ObjectInsert(key), *position);
                }
            }
            Expression::Function(function) => self.compile_function(function)?,
            Expression::Unary {
                operator,
                argument,
                position,
            } => {
                self.compile_expression(argument)?;
                let opcode = match operator {
                    UnaryOperator::Minus => Opcode::Neg,
                    UnaryOperator::Plus => Opcode::Plus,
                    UnaryOperator::Not => Opcode::Not,
                    UnaryOperator::Typeof => Opcode::TypeOf,
                };
                self.emit(opcode, *position);
            }
            Expression::Update {
                operator,
                prefix,
                target,
                position,
            } => self.compile_update(*operator, *prefix, target, *position)?,
            Expression::Binary {
                operator,
                left,
                right,
                position,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit(binary_opcode(*operator), *position);
            }
            Expression::Logical {
                operator,
                left,
                right,
                position,
            } => {
                self.compile_expression(left)?;
                let jump = match operator {
                    LogicalOperator::And => Opcode::JumpIfFalseOrPop(0),
                    LogicalOperator::Or => Opcode::JumpIfTrueOrPop(0),
                };
                let short = self.emit(jump, *position);
                self.compile_expression(right)?;
                self.emit(Opcode::CheckBoolean, *position);
                self.patch(short);
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
                position,
            } => {
                self.compile_expression(test)?;
                let to_else = self.emit(Opcode::JumpIfFalse(0), *position);
                self.compile_expression(consequent)?;
                let to_end = self.emit(Opcode::Jump(0), *position);
                self.patch(to_else);
                self.compile_expression(alternate)?;
                self.patch(to_end);
            }
            Expression::Assignment {
                operator,
                target,
                value,
                position,
            } => self.compile_assignment(*operator, target, value, *position)?,
            Expression::Member { .. } | Expression::Call { .. } => {
                let mut exits = Vec::new();
                self.compile_chain(expression, &mut exits)?;
                for exit in exits {
                    self.patch(exit);
                }
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, literal: &Literal, position: SourcePosition) {
        let opcode = match literal {
            Literal::Null => Opcode::LoadNull,
            Literal::Boolean(true) => Opcode::LoadTrue,
            Literal::Boolean(false) => Opcode::LoadFalse,
            Literal::Number(n) => Opcode::LoadConst(self.current.proto.add_constant(Constant::Number(*n))),
            Literal::String(s) => Opcode::LoadConst(self.string_constant(s)),
        };
        self.emit(opcode, position);
    }

    /// Append elements to the array on top of the stack
    fn compile_list_into_array(&mut self, elements: &[ListElement]) -> Result<(), ScriptError> {
        for element in elements {
            match element {
                ListElement::Single(expression) => {
                    self.compile_expression(expression)?;
                    self.emit(Opcode::ArrayPush, expression.position());
                }
                ListElement::Spread(expression) => {
                    self.compile_expression(expression)?;
                    self.emit(Opcode::ArraySpread, expression.position());
                }
            }
        }
        Ok(())
    }

    /// Compile an access chain; optional links add a short-circuit exit
    fn compile_chain(&mut self, expression: &Expression, exits: &mut Vec<usize>) -> Result<(), ScriptError> {
        match expression {
            Expression::Member {
                object,
                property,
                optional,
                position,
            } => {
                self.compile_chain_operand(object, exits)?;
                if *optional {
                    exits.push(self.emit(Opcode::JumpIfNull(0), *position));
                }
                self.compile_expression(property)?;
                self.emit(Opcode::GetMember, *position);
            }
            Expression::Call {
                callee,
                arguments,
                optional,
                position,
            } => {
                self.compile_chain_operand(callee, exits)?;
                if *optional {
                    exits.push(self.emit(Opcode::JumpIfNull(0), *position));
                }
                if arguments.iter().any(|a| matches!(a, ListElement::Spread(_))) {
                    self.emit(Opcode::NewArray, *position);
                    self.compile_list_into_array(arguments)?;
                    self.emit(Opcode::CallSpread, *position);
                } else {
                    for argument in arguments {
                        if let ListElement::Single(expression) = argument {
                            self.compile_expression(expression)?;
                        }
                    }
                    self.emit(Opcode::Call(arguments.len() as u32), *position);
                }
            }
            other => self.compile_expression(other)?,
        }
        Ok(())
    }

    fn compile_chain_operand(&mut self, operand: &Expression, exits: &mut Vec<usize>) -> Result<(), ScriptError> {
        if operand.is_chain_link() {
            self.compile_chain(operand, exits)
        } else {
            self.compile_expression(operand)
        }
    }

    fn compile_assignment(
        &mut self,
        operator: AssignmentOperator,
        target: &Expression,
        value: &Expression,
        position: SourcePosition,
    ) -> Result<(), ScriptError> {
        match target {
            Expression::Identifier(identifier) => {
                let location = self.identifier_location(identifier)?;
                if let AssignmentOperator::Compound(op) = operator {
                    self.emit_load(location.clone(), position);
                    self.compile_expression(value)?;
                    self.emit(binary_opcode(op), position);
                } else {
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Dup, position);
                self.emit_store(location, position);
            }
            Expression::Member {
                object, property, ..
            } => {
                self.compile_expression(object)?;
                self.compile_expression(property)?;
                if let AssignmentOperator::Compound(op) = operator {
                    self.emit(Opcode::Dup2, position);
                    self.emit(Opcode::GetMember, position);
                    self.compile_expression(value)?;
                    self.emit(binary_opcode(op), position);
                } else {
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::SetMember, position);
            }
            _ => return Err(syntax_error("Invalid assignment target", Some(position))),
        }
        Ok(())
    }

    fn compile_update(
        &mut self,
        operator: UpdateOperator,
        prefix: bool,
        target: &Expression,
        position: SourcePosition,
    ) -> Result<(), ScriptError> {
        let step = match operator {
            UpdateOperator::Increment => Opcode::Increment,
            UpdateOperator::Decrement => Opcode::Decrement,
        };
        match target {
            Expression::Identifier(identifier) => {
                let location = self.identifier_location(identifier)?;
                self.emit_load(location.clone(), position);
                if prefix {
                    self.emit(step, position);
                    self.emit(Opcode::Dup, position);
                } else {
                    self.emit(Opcode::Dup, position);
                    self.emit(step, position);
                }
                self.emit_store(location, position);
            }
            Expression::Member {
                object, property, ..
            } => {
                self.compile_expression(object)?;
                self.compile_expression(property)?;
                self.emit(Opcode::Dup2, position);
                self.emit(Opcode::GetMember, position);
                if prefix {
                    self.emit(step, position);
                    self.emit(Opcode::SetMember, position);
                } else {
                    let saved = self.current.next_local;
                    let old = self.current.alloc_local();
                    self.emit(Opcode::Dup, position);
                    self.emit(Opcode::StoreLocal(old), position);
                    self.emit(step, position);
                    self.emit(Opcode::SetMember, position);
                    self.emit(Opcode::Pop, position);
                    self.emit(Opcode::LoadLocal(old), position);
                    self.current.next_local = saved;
                }
            }
            _ => return Err(syntax_error("Invalid update target", Some(position))),
        }
        Ok(())
    }
}

fn binary_opcode(operator: BinaryOperator) -> Opcode {
    match operator {
        BinaryOperator::Add => Opcode::Add,
        BinaryOperator::Sub => Opcode::Sub,
        BinaryOperator::Mul => Opcode::Mul,
        BinaryOperator::Div => Opcode::Div,
        BinaryOperator::Mod => Opcode::Mod,
        BinaryOperator::Pow => Opcode::Pow,
        BinaryOperator::Eq => Opcode::Eq,
        BinaryOperator::NotEq => Opcode::Ne,
        BinaryOperator::Lt => Opcode::Lt,
        BinaryOperator::LtEq => Opcode::Le,
        BinaryOperator::Gt => Opcode::Gt,
        BinaryOperator::GtEq => Opcode::Ge,
    }
}
