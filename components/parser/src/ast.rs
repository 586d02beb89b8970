//! Abstract syntax tree produced by the parser.
//!
//! Every declaration site carries a [`BindingId`] and every identifier use a
//! [`RefId`], both unique within one parse. The scope resolver links the two,
//! and the bytecode generator uses that table instead of name lookups.

use core_types::SourcePosition;

/// Unique id of a declaration site
pub type BindingId = u32;

/// Unique id of an identifier reference
pub type RefId = u32;

/// A whole script
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Statement>,
}

/// A declared name
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Declared name
    pub name: String,
    /// Unique declaration id
    pub id: BindingId,
    /// Where the name appears
    pub position: SourcePosition,
}

/// A use of a name
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// Referenced name
    pub name: String,
    /// Unique reference id
    pub ref_id: RefId,
    /// Where the name appears
    pub position: SourcePosition,
}

/// One `name = init` entry of a `let` statement
#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    /// Declared binding
    pub binding: Binding,
    /// Initializer, if present
    pub init: Option<Expression>,
}

/// A function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamNode {
    /// Parameter binding
    pub binding: Binding,
    /// Default expression for a missing or null argument
    pub default: Option<Expression>,
    /// Whether this is the trailing rest parameter
    pub rest: bool,
}

/// A function literal or declaration body
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    /// Name, used for stack traces only
    pub name: Option<String>,
    /// Parameters in order
    pub params: Vec<ParamNode>,
    /// Body statements
    pub body: Vec<Statement>,
    /// Position of the `function` keyword
    pub position: SourcePosition,
}

/// `catch (param) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Binding for the thrown value
    pub param: Binding,
    /// Handler body
    pub body: Vec<Statement>,
}

/// Which values a `for` loop visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForKind {
    /// `for (let k in e)`
    In,
    /// `for (let v of e)`
    Of,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let a = 1, b;`
    LetDeclaration {
        /// Declared names
        declarations: Vec<Declarator>,
        /// Statement position
        position: SourcePosition,
    },
    /// Expression evaluated for its effect
    ExpressionStatement {
        /// The expression
        expression: Expression,
        /// Statement position
        position: SourcePosition,
    },
    /// `{ ... }`
    Block {
        /// Statements in the block
        body: Vec<Statement>,
        /// Position of `{`
        position: SourcePosition,
    },
    /// `if (test) consequent else alternate`
    If {
        /// Condition
        test: Expression,
        /// Then branch
        consequent: Box<Statement>,
        /// Else branch
        alternate: Option<Box<Statement>>,
        /// Statement position
        position: SourcePosition,
    },
    /// `while (test) body`
    While {
        /// Condition
        test: Expression,
        /// Loop body
        body: Box<Statement>,
        /// Statement position
        position: SourcePosition,
    },
    /// `do body while (test);`
    DoWhile {
        /// Loop body
        body: Box<Statement>,
        /// Condition
        test: Expression,
        /// Statement position
        position: SourcePosition,
    },
    /// `for (init; test; update) body`
    For {
        /// Initializer statement
        init: Option<Box<Statement>>,
        /// Condition, absent means always true
        test: Option<Expression>,
        /// Step expression
        update: Option<Expression>,
        /// Loop body
        body: Box<Statement>,
        /// Statement position
        position: SourcePosition,
    },
    /// `for (let x in e)` / `for (let x of e)`
    ForEach {
        /// Keys or values
        kind: ForKind,
        /// Per-iteration binding
        binding: Binding,
        /// Iterated expression
        iterable: Expression,
        /// Loop body
        body: Box<Statement>,
        /// Statement position
        position: SourcePosition,
    },
    /// `break;`
    Break {
        /// Statement position
        position: SourcePosition,
    },
    /// `continue;`
    Continue {
        /// Statement position
        position: SourcePosition,
    },
    /// `function name(...) { ... }`, hoisted to the top of its block
    FunctionDeclaration {
        /// Declared name
        binding: Binding,
        /// Function literal
        function: FunctionNode,
    },
    /// `return expr;`
    Return {
        /// Returned value, null when absent
        argument: Option<Expression>,
        /// Statement position
        position: SourcePosition,
    },
    /// `throw expr;`
    Throw {
        /// Thrown value
        argument: Expression,
        /// Statement position
        position: SourcePosition,
    },
    /// `try { } catch (e) { } finally { }`
    Try {
        /// Protected statements
        block: Vec<Statement>,
        /// Catch clause
        handler: Option<CatchClause>,
        /// Finally statements
        finalizer: Option<Vec<Statement>>,
        /// Statement position
        position: SourcePosition,
    },
    /// `delete name;` or `delete obj.key;`
    Delete {
        /// Identifier or member expression
        target: Expression,
        /// Statement position
        position: SourcePosition,
    },
    /// `;`
    Empty,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// null
    Null,
    /// true / false
    Boolean(bool),
    /// Number literal
    Number(f64),
    /// String literal
    String(String),
}

/// An element of an array literal or argument list
#[derive(Debug, Clone, PartialEq)]
pub enum ListElement {
    /// A single value
    Single(Expression),
    /// `...expr`, expanded in place
    Spread(Expression),
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-x`
    Minus,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `typeof x`
    Typeof,
}

/// `++` / `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

/// Short-circuit operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Assignment operators; compound forms carry the arithmetic they apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// `=`
    Assign,
    /// `op=`
    Compound(BinaryOperator),
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal {
        /// The value
        value: Literal,
        /// Position
        position: SourcePosition,
    },
    /// Variable reference
    Identifier(Identifier),
    /// `[a, ...b]`
    Array {
        /// Elements in order
        elements: Vec<ListElement>,
        /// Position of `[`
        position: SourcePosition,
    },
    /// `{ key: value }`
    Object {
        /// Keys and values in source order
        properties: Vec<(String, Expression)>,
        /// Position of `{`
        position: SourcePosition,
    },
    /// `function (...) { ... }`
    Function(Box<FunctionNode>),
    /// Prefix operator
    Unary {
        /// Operator
        operator: UnaryOperator,
        /// Operand
        argument: Box<Expression>,
        /// Position
        position: SourcePosition,
    },
    /// `++x`, `x--`, ...
    Update {
        /// Operator
        operator: UpdateOperator,
        /// Prefix or postfix form
        prefix: bool,
        /// Assignable operand
        target: Box<Expression>,
        /// Position
        position: SourcePosition,
    },
    /// Arithmetic, comparison and equality
    Binary {
        /// Operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
        /// Position
        position: SourcePosition,
    },
    /// `&&` / `||`
    Logical {
        /// Operator
        operator: LogicalOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand, skipped when the left decides
        right: Box<Expression>,
        /// Position
        position: SourcePosition,
    },
    /// `test ? consequent : alternate`
    Conditional {
        /// Condition
        test: Box<Expression>,
        /// Value when true
        consequent: Box<Expression>,
        /// Value when false
        alternate: Box<Expression>,
        /// Position
        position: SourcePosition,
    },
    /// `target = value`, `target += value`, ...
    Assignment {
        /// Operator
        operator: AssignmentOperator,
        /// Identifier or member expression
        target: Box<Expression>,
        /// Assigned value
        value: Box<Expression>,
        /// Position
        position: SourcePosition,
    },
    /// `object.name`, `object[expr]`, `object?.name`
    Member {
        /// Container
        object: Box<Expression>,
        /// Key; `.name` is parsed as a string literal
        property: Box<Expression>,
        /// Whether this link short-circuits on a null container
        optional: bool,
        /// Position
        position: SourcePosition,
    },
    /// `callee(args)`, `callee?.(args)`; the bind operator also produces calls
    Call {
        /// Called value
        callee: Box<Expression>,
        /// Arguments, possibly spread
        arguments: Vec<ListElement>,
        /// Whether this link short-circuits on a null callee
        optional: bool,
        /// Position
        position: SourcePosition,
    },
}

impl Expression {
    /// Source position of the expression
    pub fn position(&self) -> SourcePosition {
        match self {
            Expression::Literal { position, .. }
            | Expression::Array { position, .. }
            | Expression::Object { position, .. }
            | Expression::Unary { position, .. }
            | Expression::Update { position, .. }
            | Expression::Binary { position, .. }
            | Expression::Logical { position, .. }
            | Expression::Conditional { position, .. }
            | Expression::Assignment { position, .. }
            | Expression::Member { position, .. }
            | Expression::Call { position, .. } => *position,
            Expression::Identifier(ident) => ident.position,
            Expression::Function(function) => function.position,
        }
    }

    /// Whether this is a member or call link of an access chain
    pub fn is_chain_link(&self) -> bool {
        matches!(self, Expression::Member { .. } | Expression::Call { .. })
    }

    /// Whether any link of this access chain is optional
    pub fn has_optional_link(&self) -> bool {
        match self {
            Expression::Member {
                object, optional, ..
            } => *optional || object.has_optional_link(),
            Expression::Call {
                callee, optional, ..
            } => *optional || callee.has_optional_link(),
            _ => false,
        }
    }
}

impl Statement {
    /// Source position of the statement, if it has one
    pub fn position(&self) -> Option<SourcePosition> {
        match self {
            Statement::LetDeclaration { position, .. }
            | Statement::ExpressionStatement { position, .. }
            | Statement::Block { position, .. }
            | Statement::If { position, .. }
            | Statement::While { position, .. }
            | Statement::DoWhile { position, .. }
            | Statement::For { position, .. }
            | Statement::ForEach { position, .. }
            | Statement::Break { position }
            | Statement::Continue { position }
            | Statement::Return { position, .. }
            | Statement::Throw { position, .. }
            | Statement::Try { position, .. }
            | Statement::Delete { position, .. } => Some(*position),
            Statement::FunctionDeclaration { function, .. } => Some(function.position),
            Statement::Empty => None,
        }
    }
}
