//! Runtime orchestration for script execution
//!
//! The Runtime owns one VM with the standard library installed and feeds it
//! compiled scripts:
//! - `parser` for lexing, scope resolution and code generation
//! - `interpreter` for execution
//! - `builtins` for the natives and host globals

use core_types::Value;
use interpreter::{Vm, VmConfig};
use parser::CompileOptions;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Main runtime that compiles and runs scripts against a persistent VM
pub struct Runtime {
    /// Whether to print bytecode before execution
    print_bytecode: bool,
    /// Whether to print the syntax tree before execution
    print_ast: bool,
    /// Persistent VM instance; globals survive between executions
    vm: Vm,
}

impl Runtime {
    /// Create a runtime with the standard library installed
    ///
    /// # Example
    /// ```
    /// use banana_cli::Runtime;
    /// use interpreter::VmConfig;
    ///
    /// let runtime = Runtime::new(VmConfig::default(), &["script.bn".to_string()]);
    /// assert!(!runtime.is_print_ast_enabled());
    /// ```
    pub fn new(config: VmConfig, argv: &[String]) -> Self {
        let mut vm = Vm::with_config(config);
        builtins::install(&mut vm, argv);
        Self {
            print_bytecode: false,
            print_ast: false,
            vm,
        }
    }

    /// Enable bytecode printing
    pub fn with_print_bytecode(mut self, enabled: bool) -> Self {
        self.print_bytecode = enabled;
        self
    }

    /// Enable syntax tree printing
    pub fn with_print_ast(mut self, enabled: bool) -> Self {
        self.print_ast = enabled;
        self
    }

    /// Check if bytecode printing is enabled
    pub fn is_print_bytecode_enabled(&self) -> bool {
        self.print_bytecode
    }

    /// Check if syntax tree printing is enabled
    pub fn is_print_ast_enabled(&self) -> bool {
        self.print_ast
    }

    /// Execute a script file
    ///
    /// # Errors
    /// Returns `CliError::Io` if the file cannot be read, and
    /// `CliError::Runtime` if compilation or execution fails
    ///
    /// # Example
    /// ```no_run
    /// use banana_cli::Runtime;
    /// use interpreter::VmConfig;
    ///
    /// let mut runtime = Runtime::new(VmConfig::default(), &[]);
    /// let result = runtime.execute_file("example.bn").unwrap();
    /// ```
    pub fn execute_file(&mut self, path: &str) -> CliResult<Value> {
        let source = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_string(),
            source,
        })?;
        self.execute(&source, CompileOptions::default().with_source_name(path))
    }

    /// Execute a source string
    ///
    /// # Example
    /// ```
    /// use banana_cli::Runtime;
    /// use core_types::Value;
    /// use interpreter::VmConfig;
    ///
    /// let mut runtime = Runtime::new(VmConfig::default(), &[]);
    /// let result = runtime.execute_string("return length([1, 2, 3]);").unwrap();
    /// assert_eq!(result, Value::Number(3.0));
    /// ```
    pub fn execute_string(&mut self, source: &str) -> CliResult<Value> {
        self.execute(source, CompileOptions::default().with_source_name("<eval>"))
    }

    /// Execute one REPL entry; a trailing expression statement is the result
    pub fn execute_repl_input(&mut self, source: &str) -> CliResult<Value> {
        self.execute(source, CompileOptions::repl())
    }

    fn execute(&mut self, source: &str, options: CompileOptions) -> CliResult<Value> {
        if self.print_ast {
            let program = parser::parse(source)?;
            let listing = format!("{:#?}", program);
            self.emit(&listing)?;
        }

        let proto = parser::compile(source, options)?;
        debug!(source = proto.source_name.as_deref().unwrap_or("<anonymous>"), "compiled script");

        if self.print_bytecode {
            let listing = proto.to_string();
            self.emit(&listing)?;
        }

        Ok(self.vm.run(proto)?)
    }

    fn emit(&mut self, text: &str) -> CliResult<()> {
        writeln!(self.vm.output(), "{}", text).map_err(|source| CliError::Io {
            path: "<output>".to_string(),
            source,
        })
    }

    /// Render a value the way the REPL echoes it
    pub fn echo(&self, value: &Value) -> String {
        self.vm.repr(value)
    }

    /// Flush buffered script output
    pub fn flush(&mut self) -> CliResult<()> {
        self.vm.output().flush().map_err(|source| CliError::Io {
            path: "<output>".to_string(),
            source,
        })
    }

    /// Get access to the VM for direct manipulation
    pub fn vm(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Start the REPL (Read-Eval-Print Loop)
    ///
    /// # Errors
    /// Returns `CliError` if the line editor fails or a script calls `exit()`
    pub fn repl(&mut self) -> CliResult<()> {
        crate::repl::run_repl(self)
    }
}
