//! Error types reported to the host.
//!
//! Inside a running script, errors are ordinary values unwound through the
//! VM's handler stack. A [`ScriptError`] is what the host sees when a
//! compilation fails or a throw escapes the outermost call.

use std::fmt;

use thiserror::Error;

use crate::{SourcePosition, StackFrame};

/// The category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed source text or an invalid construct rejected by the compiler
    SyntaxError,
    /// Operator or native applied to values of the wrong kind
    TypeError,
    /// Use of an identifier with no binding
    ReferenceError,
    /// Resource exhaustion, such as exceeding the call depth limit
    RangeError,
    /// Host failure surfaced to the script (I/O and similar)
    Error,
    /// A thrown value that reached the top level with no handler
    Uncaught,
    /// The script requested termination with a status code
    Exit(i32),
    /// Broken VM invariant
    InternalError,
}

impl ErrorKind {
    /// Name used for the `name` field of error objects raised to scripts
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::Error => "Error",
            ErrorKind::Uncaught => "Uncaught",
            ErrorKind::Exit(_) => "Exit",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error with message, stack trace, and source position.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, ScriptError, SourcePosition};
///
/// let error = ScriptError::new(ErrorKind::SyntaxError, "Unexpected token ')'")
///     .with_position(SourcePosition::new(2, 7, 19));
///
/// assert_eq!(error.to_string(), "SyntaxError: Unexpected token ')' at 2:7");
/// ```
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}{}", location_suffix(.source_position))]
pub struct ScriptError {
    /// The category of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Call stack at the time of the error, innermost first
    pub stack: Vec<StackFrame>,
    /// Source position where the error occurred
    pub source_position: Option<SourcePosition>,
}

fn location_suffix(position: &Option<SourcePosition>) -> String {
    match position {
        Some(pos) => format!(" at {}", pos),
        None => String::new(),
    }
}

impl ScriptError {
    /// Create an error without position or stack
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: Vec::new(),
            source_position: None,
        }
    }

    /// Attach a source position
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.source_position = Some(position);
        self
    }

    /// Attach a stack trace
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }

    /// Process exit status this error maps to
    pub fn exit_status(&self) -> i32 {
        match self.kind {
            ErrorKind::Exit(code) => code,
            _ => 1,
        }
    }

    /// Render the stack trace, one `at ...` line per frame
    pub fn stack_trace(&self) -> String {
        self.stack
            .iter()
            .map(|frame| format!("    {}", frame))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
