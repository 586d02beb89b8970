//! Error types for the CLI

use core_types::ScriptError;
use rustyline::error::ReadlineError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Compilation failure, uncaught throw, or `exit()`
    #[error("{0}")]
    Runtime(#[from] ScriptError),

    /// Script file could not be read
    #[error("could not read '{path}': {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Line editor failure
    #[error("readline error: {0}")]
    Readline(#[from] ReadlineError),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_status(&self) -> i32 {
        match self {
            CliError::Runtime(e) => e.exit_status(),
            _ => 1,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
