use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use slisp::ast::{Function, Value};
use slisp::evaluator::{self, Environment};
use std::panic;
use std::process;
use tracing::Level;

fn main() {
    init_logging();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// `SLISP_LOG=debug` (or trace, info...) turns on interpreter logging on stderr
fn init_logging() {
    let Ok(level) = std::env::var("SLISP_LOG") else {
        return;
    };
    match level.parse::<Level>() {
        Ok(level) => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
        Err(_) => eprintln!("Ignoring SLISP_LOG={level}: not a log level"),
    }
}

fn run_repl() {
    println!("slisp: a small S-expression interpreter");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };
    let env = evaluator::create_global_env();

    loop {
        match rl.readline("slisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // Definitions persist in `env` across lines
                match slisp::rep(line, &env) {
                    Ok(output) => println!("{output}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Language:");
    println!("  Literals: 42, -5, \"text\", :keyword, true, false, nil");
    println!("  Arithmetic: +, -, *, /, mod, max, min");
    println!("  Comparison: =, <, >, <=, >=");
    println!("  Lists: list, cons, first, rest, count, empty?, list?");
    println!("  Other: not, str");
    println!("  Special forms: fn, set, let, if, quote ('x)");
    println!();
    println!("Examples:");
    println!("  (set square (fn [x] (* x x)))");
    println!("  (square 12)");
    println!("  (let {{a 2 b (+ a 1)}} (* a b))");
    println!("  (if (empty? (list)) \"empty\" \"not empty\")");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Function(Function::Builtin { .. }) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
