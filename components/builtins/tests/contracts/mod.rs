//! Contract tests for the standard library
//!
//! Scripts run against a VM with [`builtins::install`] applied and printed
//! output captured in memory.

mod lang_tests;
mod os_tests;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use core_types::{ScriptError, Value};
use interpreter::Vm;
use parser::CompileOptions;

#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct Session {
    pub vm: Vm,
    pub output: SharedBuffer,
}

impl Session {
    pub fn new() -> Self {
        Self::with_argv(&["test.bn"])
    }

    pub fn with_argv(argv: &[&str]) -> Self {
        let mut vm = Vm::new();
        let argv: Vec<String> = argv.iter().map(|a| a.to_string()).collect();
        builtins::install(&mut vm, &argv);
        let output = SharedBuffer::default();
        vm.set_output(Box::new(output.clone()));
        Self { vm, output }
    }

    pub fn try_run(&mut self, source: &str) -> Result<Value, ScriptError> {
        let proto = parser::compile(source, CompileOptions::default())?;
        self.vm.run(proto)
    }

    pub fn run(&mut self, source: &str) -> Value {
        match self.try_run(source) {
            Ok(value) => value,
            Err(e) => panic!("script failed: {}", e),
        }
    }

    /// Run and return the display form of the result
    pub fn show(&mut self, source: &str) -> String {
        let value = self.run(source);
        self.vm.display(&value)
    }

    /// Run, expecting an uncaught error, and return its message
    pub fn error(&mut self, source: &str) -> String {
        match self.try_run(source) {
            Ok(value) => panic!("expected an error, got {}", self.vm.display(&value)),
            Err(e) => e.message,
        }
    }
}
