//! REPL (Read-Eval-Print Loop) implementation

use core_types::ErrorKind;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use crate::error::{CliError, CliResult};
use crate::runtime::Runtime;

/// Run the interactive REPL
///
/// Returns when the user ends input, or with the `exit()` error when a
/// script requests termination.
pub fn run_repl(runtime: &mut Runtime) -> CliResult<()> {
    let mut editor = DefaultEditor::new()?;

    println!("banana {}", env!("CARGO_PKG_VERSION"));
    println!("Type .help for commands, Ctrl-D to quit.");

    let mut line_buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = if in_multiline { "... " } else { "> " };

        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if !in_multiline && trimmed.starts_with('.') {
                    if !handle_repl_command(trimmed, runtime) {
                        break;
                    }
                    continue;
                }

                if in_multiline {
                    line_buffer.push('\n');
                }
                line_buffer.push_str(&line);

                if !is_input_complete(&line_buffer) {
                    in_multiline = true;
                    continue;
                }

                match runtime.execute_repl_input(&line_buffer) {
                    Ok(value) => {
                        if !value.is_null() {
                            println!("{}", runtime.echo(&value));
                        }
                    }
                    Err(CliError::Runtime(e)) if is_incomplete(&e) => {
                        in_multiline = true;
                        continue;
                    }
                    Err(CliError::Runtime(e)) if matches!(e.kind, ErrorKind::Exit(_)) => {
                        return Err(CliError::Runtime(e));
                    }
                    Err(CliError::Runtime(e)) => {
                        eprintln!("{}", e);
                        if !e.stack.is_empty() {
                            eprintln!("{}", e.stack_trace());
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }

                if let Err(e) = editor.add_history_entry(line_buffer.as_str()) {
                    debug!(error = %e, "history entry rejected");
                }
                line_buffer.clear();
                in_multiline = false;
                runtime.flush()?;
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    println!("^C");
                    line_buffer.clear();
                    in_multiline = false;
                } else {
                    println!("Press Ctrl-D or type .exit to quit");
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn is_incomplete(error: &core_types::ScriptError) -> bool {
    error.kind == ErrorKind::SyntaxError && error.message.contains("Unexpected end of input")
}

/// Handle a dot command; returns `false` when the REPL should stop
fn handle_repl_command(command: &str, runtime: &mut Runtime) -> bool {
    match command {
        ".help" => {
            println!("REPL Commands:");
            println!("  .help     - Show this help message");
            println!("  .clear    - Clear the screen");
            println!("  .dump     - Show frames, stack and globals");
            println!("  .gc       - Run a collection and show heap statistics");
            println!("  .exit     - Exit the REPL");
        }
        ".clear" => {
            print!("\x1B[2J\x1B[1;1H");
        }
        ".dump" => {
            print!("{}", runtime.vm().dump_state());
        }
        ".gc" => {
            let report = runtime.vm().collect_garbage();
            let stats = runtime.vm().gc_stats().clone();
            println!(
                "freed {} objects, {} live ({} bytes), {} collections so far",
                report.freed, report.live, report.live_bytes, stats.collections
            );
        }
        ".exit" => return false,
        _ => {
            println!("Unknown command: {}", command);
            println!("Type .help for available commands");
        }
    }
    true
}

/// Check if the input appears to be complete
///
/// This is a simple heuristic that checks for balanced braces/brackets/parens
/// outside of string literals and comments.
fn is_input_complete(input: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string: Option<char> = None;
    let mut escape_next = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => in_string = Some(c),
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            _ => {}
        }
    }

    depth <= 0 && in_string.is_none()
}
