//! Source position and stack frame types for error tracking.

use std::fmt;

/// A position in source code (1-based line and column).
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition::new(10, 5, 150);
/// assert_eq!(pos.line, 10);
/// assert_eq!(pos.to_string(), "10:5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
    /// Byte offset from the start of the source
    pub offset: usize,
}

impl SourcePosition {
    /// Create a new source position
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single frame in a script call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for anonymous functions
    pub function_name: Option<String>,
    /// File path of the source, if known
    pub source_url: Option<String>,
    /// Line of the instruction executing in this frame
    pub line: u32,
    /// Column of the instruction executing in this frame
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        match &self.source_url {
            Some(url) => write!(f, "at {} ({}:{}:{})", name, url, self.line, self.column),
            None => write!(f, "at {} ({}:{})", name, self.line, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_position_creation() {
        let pos = SourcePosition::new(10, 5, 150);
        assert_eq!(pos.line, 10);
        assert_eq!(pos.column, 5);
        assert_eq!(pos.offset, 150);
    }

    #[test]
    fn test_stack_frame_display() {
        let frame = StackFrame {
            function_name: Some("fib".to_string()),
            source_url: None,
            line: 3,
            column: 9,
        };
        assert_eq!(frame.to_string(), "at fib (3:9)");

        let anonymous = StackFrame {
            function_name: None,
            source_url: Some("main.bn".to_string()),
            line: 1,
            column: 1,
        };
        assert_eq!(anonymous.to_string(), "at <anonymous> (main.bn:1:1)");
    }
}
