//! Parser component for the banana scripting language
//!
//! Provides lexer, parser, AST construction, scope resolution, and bytecode
//! generation.
//!
//! # Overview
//!
//! - [`Lexer`] - Tokenizes source code
//! - [`Parser`] - Recursive descent parser producing the AST
//! - [`ScopeAnalyzer`] - Links identifier uses to declarations
//! - [`BytecodeGenerator`] - Turns the resolved AST into function prototypes
//!
//! # Example
//!
//! ```
//! use parser::{compile, CompileOptions};
//!
//! let proto = compile("let x = 42;", CompileOptions::default()).unwrap();
//! assert_eq!(proto.display_name(), "<script>");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ast;
pub mod bytecode_gen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;

use std::rc::Rc;

use bytecode_system::FunctionProto;
use core_types::ScriptError;

pub use ast::{Expression, Program, Statement};
pub use bytecode_gen::{BytecodeGenerator, CompileOptions};
pub use lexer::{Keyword, Lexer, Punctuator, Token};
pub use parser::Parser;
pub use scope::{Resolution, ScopeAnalyzer};

/// Parse source text into a program
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    Parser::new(source).parse()
}

/// Parse, resolve, and compile source text into a script prototype
pub fn compile(source: &str, options: CompileOptions) -> Result<Rc<FunctionProto>, ScriptError> {
    let program = parse(source)?;
    let resolution = ScopeAnalyzer::new().analyze(&program);
    let proto = BytecodeGenerator::new(&resolution, options).generate(&program)?;
    Ok(Rc::new(proto))
}
