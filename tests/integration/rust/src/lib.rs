//! Integration test suite for the banana runtime
//!
//! Helpers that drive source text through the whole stack (parser,
//! compiler, VM, standard library) and capture what the script prints.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use interpreter::{Vm, VmConfig};
use parser::CompileOptions;

/// Re-export components for test convenience
pub mod components {
    pub use banana_cli;
    pub use builtins;
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
    pub use parser;
}

/// In-memory sink shared between the VM and the test
#[derive(Clone, Default)]
pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    /// Everything written so far
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A VM with the standard library installed and output captured
pub fn vm_with_output(config: VmConfig) -> (Vm, Captured) {
    let mut vm = Vm::with_config(config);
    builtins::install(&mut vm, &["test.bn".to_string()]);
    let output = Captured::default();
    vm.set_output(Box::new(output.clone()));
    (vm, output)
}

/// Run `source` and return what it printed, or the uncaught error text
pub fn run(source: &str) -> Result<String, String> {
    run_with(VmConfig::default(), source)
}

/// [`run`] with an explicit VM configuration
pub fn run_with(config: VmConfig, source: &str) -> Result<String, String> {
    let (mut vm, output) = vm_with_output(config);
    let proto = parser::compile(source, CompileOptions::default().with_source_name("test.bn"))
        .map_err(|e| e.to_string())?;
    vm.run(proto).map_err(|e| e.message)?;
    Ok(output.text())
}
