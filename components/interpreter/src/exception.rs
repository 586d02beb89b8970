//! Non-local exits from running code

use core_types::{ErrorKind, ScriptError, Value};

/// Why execution stopped abnormally.
///
/// Natives return this from fallible operations and usually propagate it
/// with `?`; only [`Exception::Throw`] can be caught by script handlers.
#[derive(Debug, Clone)]
pub enum Exception {
    /// A thrown value
    Throw(Value),
    /// `exit(status)`: unwinds every frame and handler
    Exit(i32),
    /// Broken VM invariant; unwinds everything
    Fatal(ScriptError),
}

impl Exception {
    /// Create a fatal internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Exception::Fatal(ScriptError::new(ErrorKind::InternalError, message))
    }

    /// The thrown value, if this is a catchable throw
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            Exception::Throw(value) => Some(value),
            _ => None,
        }
    }
}

impl From<ScriptError> for Exception {
    fn from(error: ScriptError) -> Self {
        match error.kind {
            ErrorKind::Exit(status) => Exception::Exit(status),
            _ => Exception::Fatal(error),
        }
    }
}
