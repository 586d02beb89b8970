//! Command-line arguments

use clap::Parser;
use interpreter::VmConfig;
use memory_manager::GcConfig;

/// Run banana scripts, evaluate snippets, or start a REPL
#[derive(Parser, Debug, Clone)]
#[command(name = "banana", version, about)]
pub struct Cli {
    /// Script to execute
    pub file: Option<String>,

    /// Arguments passed to the script as `argv`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Evaluate SOURCE instead of reading a file
    #[arg(short, long, value_name = "SOURCE", conflicts_with = "file")]
    pub eval: Option<String>,

    /// Start the interactive REPL (default when no file or eval is given)
    #[arg(short, long)]
    pub interactive: bool,

    /// Print the disassembled bytecode before running
    #[arg(long)]
    pub print_bytecode: bool,

    /// Print the syntax tree before running
    #[arg(long)]
    pub print_ast: bool,

    /// Maximum nesting of script calls
    #[arg(long, value_name = "N")]
    pub max_call_depth: Option<usize>,

    /// Allocation volume that triggers the first collection
    #[arg(long, value_name = "BYTES")]
    pub gc_threshold: Option<usize>,

    /// Collect at every safepoint
    #[arg(long)]
    pub gc_stress: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// VM configuration derived from the flags
    pub fn vm_config(&self) -> VmConfig {
        let mut gc = GcConfig::default().with_stress(self.gc_stress);
        if let Some(bytes) = self.gc_threshold {
            gc = gc.with_initial_threshold(bytes);
        }
        let mut config = VmConfig::default().with_gc(gc);
        if let Some(depth) = self.max_call_depth {
            config = config.with_max_call_depth(depth);
        }
        config
    }

    /// Whether the REPL should run
    pub fn wants_repl(&self) -> bool {
        self.interactive || (self.file.is_none() && self.eval.is_none())
    }

    /// The script-visible `argv`: the script path followed by its arguments
    pub fn script_argv(&self) -> Vec<String> {
        let program = self.file.clone().unwrap_or_else(|| "banana".to_string());
        std::iter::once(program).chain(self.args.iter().cloned()).collect()
    }
}
