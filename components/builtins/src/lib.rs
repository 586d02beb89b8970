//! Standard library for the banana runtime
//!
//! Every function here is an ordinary [`interpreter::NativeFn`] registered
//! through the native bridge, so scripts see them as global functions:
//! - [`lang`]: strings, arrays, numbers, JSON, regular expressions, and
//!   runtime introspection (`gc`, `dump`)
//! - [`os`]: console and file I/O, the filesystem, processes, and time,
//!   plus the `os`, `pathsep`, `stdin`/`stdout`/`stderr`, `argc` and `argv`
//!   globals
//!
//! # Example
//!
//! ```
//! use core_types::Value;
//! use interpreter::Vm;
//! use parser::CompileOptions;
//!
//! let mut vm = Vm::new();
//! builtins::install(&mut vm, &["demo.bn".to_string()]);
//!
//! let source = "return sort([3, 1, 2], function(a, b) { return a - b; })[0] + length(argv);";
//! let proto = parser::compile(source, CompileOptions::default()).unwrap();
//! assert_eq!(vm.run(proto).unwrap(), Value::Number(2.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lang;
pub mod os;

use interpreter::Vm;

pub use os::FileHandle;

/// Install both native groups and the host globals into `vm`
pub fn install(vm: &mut Vm, argv: &[String]) {
    lang::install(vm);
    os::install(vm, argv);
    tracing::debug!(
        natives = lang::FUNCTIONS.len() + os::FUNCTIONS.len(),
        "standard library installed"
    );
}
