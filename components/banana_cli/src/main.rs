//! banana command-line entry point
//!
//! Parses arguments, sets up logging, and hands execution to the Runtime.

use std::process::ExitCode;

use banana_cli::{logging, Cli, CliError, Runtime};
use clap::Parser as ClapParser;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut runtime = Runtime::new(cli.vm_config(), &cli.script_argv())
        .with_print_bytecode(cli.print_bytecode)
        .with_print_ast(cli.print_ast);

    let mut result = match (&cli.eval, &cli.file) {
        (Some(source), _) => runtime.execute_string(source).map(|_| ()),
        (None, Some(file)) => runtime.execute_file(file).map(|_| ()),
        (None, None) => Ok(()),
    };
    if result.is_ok() && cli.wants_repl() {
        result = runtime.repl();
    }
    if let Err(e) = runtime.flush() {
        error!(error = %e, "failed to flush script output");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from((e.exit_status() & 0xff) as u8)
        }
    }
}

fn report(err: &CliError) {
    match err {
        CliError::Runtime(e) if matches!(e.kind, core_types::ErrorKind::Exit(_)) => {}
        CliError::Runtime(e) => {
            error!(kind = %e.kind, "script failed");
            eprintln!("{}", e);
            if !e.stack.is_empty() {
                eprintln!("{}", e.stack_trace());
            }
        }
        other => eprintln!("Error: {}", other),
    }
}
