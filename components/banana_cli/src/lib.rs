//! Command-line host for the banana runtime
//!
//! Provides the [`Runtime`] that wires the compiler, VM and standard library
//! together, plus argument parsing, logging setup and the interactive REPL.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod repl;
pub mod runtime;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
