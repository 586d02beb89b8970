//! Compile-time scope resolution.
//!
//! Walks the AST once and links every identifier reference to the binding it
//! denotes. A reference with no visible binding is a global looked up by name
//! at run time. Bindings referenced from a nested function are marked as
//! captured so the generator can give them cell storage.

use std::collections::{HashMap, HashSet};

use crate::ast::*;

/// Result of scope analysis
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Reference id to the binding it resolves to; absent means unresolved global
    pub references: HashMap<RefId, BindingId>,
    /// Bindings referenced from a nested function
    pub captured: HashSet<BindingId>,
    /// Bindings declared at script top level, stored in the global table
    pub globals: HashSet<BindingId>,
}

impl Resolution {
    /// The binding a reference resolves to, if any
    pub fn binding_of(&self, reference: RefId) -> Option<BindingId> {
        self.references.get(&reference).copied()
    }

    /// Whether the binding needs a heap cell
    pub fn is_captured(&self, binding: BindingId) -> bool {
        self.captured.contains(&binding)
    }

    /// Whether the binding lives in the global table
    pub fn is_global(&self, binding: BindingId) -> bool {
        self.globals.contains(&binding)
    }
}

/// Bindings declared directly in a statement list: `let` names and hoisted functions
pub fn direct_bindings(body: &[Statement]) -> Vec<&Binding> {
    let mut bindings = Vec::new();
    for statement in body {
        match statement {
            Statement::LetDeclaration { declarations, .. } => {
                bindings.extend(declarations.iter().map(|d| &d.binding));
            }
            Statement::FunctionDeclaration { binding, .. } => bindings.push(binding),
            _ => {}
        }
    }
    bindings
}

#[derive(Debug)]
struct Scope {
    names: HashMap<String, BindingId>,
}

/// Scope analyzer
pub struct ScopeAnalyzer {
    scopes: Vec<Scope>,
    function_level: usize,
    binding_levels: HashMap<BindingId, usize>,
    resolution: Resolution,
}

impl Default for ScopeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeAnalyzer {
    /// Create a new scope analyzer
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            function_level: 0,
            binding_levels: HashMap::new(),
            resolution: Resolution::default(),
        }
    }

    /// Analyze a program and return its resolution table
    pub fn analyze(mut self, program: &Program) -> Resolution {
        self.enter_scope();
        self.hoist_functions(&program.body);
        for statement in &program.body {
            self.visit_statement(statement);
        }
        self.exit_scope();
        self.resolution
    }

    fn enter_scope(&mut self) {
        self.scopes.push(Scope {
            names: HashMap::new(),
        });
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, binding: &Binding) {
        if self.function_level == 0 && self.scopes.len() == 1 {
            self.resolution.globals.insert(binding.id);
        }
        self.binding_levels.insert(binding.id, self.function_level);
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(binding.name.clone(), binding.id);
        }
    }

    fn hoist_functions(&mut self, body: &[Statement]) {
        for statement in body {
            if let Statement::FunctionDeclaration { binding, .. } = statement {
                self.declare(binding);
            }
        }
    }

    fn resolve(&mut self, identifier: &Identifier) {
        let found = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(&identifier.name).copied());
        let Some(binding) = found else {
            return;
        };
        self.resolution.references.insert(identifier.ref_id, binding);
        if self.resolution.globals.contains(&binding) {
            return;
        }
        if self.binding_levels.get(&binding).copied().unwrap_or(0) < self.function_level {
            self.resolution.captured.insert(binding);
        }
    }

    fn visit_block(&mut self, body: &[Statement]) {
        self.enter_scope();
        self.hoist_functions(body);
        for statement in body {
            self.visit_statement(statement);
        }
        self.exit_scope();
    }

    /// Loop and branch bodies get their own scope even without braces
    fn visit_substatement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block { body, .. } => self.visit_block(body),
            other => self.visit_block(std::slice::from_ref(other)),
        }
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::LetDeclaration { declarations, .. } => {
                for declarator in declarations {
                    self.declare(&declarator.binding);
                    if let Some(init) = &declarator.init {
                        self.visit_expression(init);
                    }
                }
            }
            Statement::ExpressionStatement { expression, .. } => self.visit_expression(expression),
            Statement::Block { body, .. } => self.visit_block(body),
            Statement::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.visit_expression(test);
                self.visit_substatement(consequent);
                if let Some(alternate) = alternate {
                    self.visit_substatement(alternate);
                }
            }
            Statement::While { test, body, .. } | Statement::DoWhile { test, body, .. } => {
                self.visit_expression(test);
                self.visit_substatement(body);
            }
            Statement::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                self.enter_scope();
                if let Some(init) = init {
                    self.visit_statement(init);
                }
                if let Some(test) = test {
                    self.visit_expression(test);
                }
                if let Some(update) = update {
                    self.visit_expression(update);
                }
                self.visit_substatement(body);
                self.exit_scope();
            }
            Statement::ForEach {
                binding,
                iterable,
                body,
                ..
            } => {
                self.visit_expression(iterable);
                self.enter_scope();
                self.declare(binding);
                self.visit_substatement(body);
                self.exit_scope();
            }
            Statement::FunctionDeclaration { function, .. } => self.visit_function(function),
            Statement::Return { argument, .. } => {
                if let Some(argument) = argument {
                    self.visit_expression(argument);
                }
            }
            Statement::Throw { argument, .. } => self.visit_expression(argument),
            Statement::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.visit_block(block);
                if let Some(handler) = handler {
                    self.enter_scope();
                    self.declare(&handler.param);
                    self.hoist_functions(&handler.body);
                    for statement in &handler.body {
                        self.visit_statement(statement);
                    }
                    self.exit_scope();
                }
                if let Some(finalizer) = finalizer {
                    self.visit_block(finalizer);
                }
            }
            Statement::Delete { target, .. } => self.visit_expression(target),
            Statement::Break { .. } | Statement::Continue { .. } | Statement::Empty => {}
        }
    }

    fn visit_function(&mut self, function: &FunctionNode) {
        self.function_level += 1;
        self.enter_scope();
        for param in &function.params {
            if let Some(default) = &param.default {
                self.visit_expression(default);
            }
            self.declare(&param.binding);
        }
        self.hoist_functions(&function.body);
        for statement in &function.body {
            self.visit_statement(statement);
        }
        self.exit_scope();
        self.function_level -= 1;
    }

    fn visit_list(&mut self, elements: &[ListElement]) {
        for element in elements {
            match element {
                ListElement::Single(expression) | ListElement::Spread(expression) => {
                    self.visit_expression(expression)
                }
            }
        }
    }

    fn visit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Literal { .. } => {}
            Expression::Identifier(identifier) => self.resolve(identifier),
            Expression::Array { elements, .. } => self.visit_list(elements),
            Expression::Object { properties, .. } => {
                for (_, value) in properties {
                    self.visit_expression(value);
                }
            }
            Expression::Function(function) => self.visit_function(function),
            Expression::Unary { argument, .. } => self.visit_expression(argument),
            Expression::Update { target, .. } => self.visit_expression(target),
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                self.visit_expression(left);
                self.visit_expression(right);
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.visit_expression(test);
                self.visit_expression(consequent);
                self.visit_expression(alternate);
            }
            Expression::Assignment { target, value, .. } => {
                self.visit_expression(target);
                self.visit_expression(value);
            }
            Expression::Member {
                object, property, ..
            } => {
                self.visit_expression(object);
                self.visit_expression(property);
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                self.visit_expression(callee);
                self.visit_list(arguments);
            }
        }
    }
}
