//! Parser error helpers

use core_types::{ErrorKind, ScriptError, SourcePosition};

/// Create a syntax error at a given position
pub fn syntax_error(message: impl Into<String>, position: Option<SourcePosition>) -> ScriptError {
    let error = ScriptError::new(ErrorKind::SyntaxError, message);
    match position {
        Some(position) => error.with_position(position),
        None => error,
    }
}

/// Create an unexpected token error
pub fn unexpected_token(expected: &str, got: &str, position: Option<SourcePosition>) -> ScriptError {
    syntax_error(format!("Expected {}, got {}", expected, got), position)
}
