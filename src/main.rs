use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use clap::Parser;
use funlang::evaluator::{Config, DEFAULT_MAX_DEPTH, Interpreter};
use funlang::repl::{self, ReplOptions};
use log::info;

const SOURCE_EXTENSION: &str = "fl";

// Parsing and evaluation recurse once per nesting level.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// funlang runs small functional programs from a `.fl` file, or
/// interactively when no file is given.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file to execute. Starts the interactive prompt when omitted.
    path: Option<PathBuf>,

    /// Nested evaluations allowed before a program is stopped.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Where the interactive prompt keeps its history.
    #[arg(long, default_value = ".funlang_history")]
    history: PathBuf,

    /// Use vi key bindings at the interactive prompt.
    #[arg(long)]
    vi: bool,
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == SOURCE_EXTENSION)
}

fn run_file(interpreter: &mut Interpreter, path: &Path) -> i32 {
    if !has_source_extension(path) {
        eprintln!(
            "expected a .{} source file, got '{}'",
            SOURCE_EXTENSION,
            path.display()
        );
        return 2;
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Failed to read '{}': {}", path.display(), err);
            return 1;
        }
    };

    info!("running {}", path.display());
    match interpreter.run(&source) {
        Ok(value) => {
            if !value.is_void() {
                println!("{}", value);
            }
            0
        }
        Err(err) => {
            err.pretty_print(&path.display().to_string(), &source);
            1
        }
    }
}

fn run(args: Args) -> i32 {
    let mut interpreter = Interpreter::with_config(Config {
        max_depth: args.max_depth,
    });

    match args.path {
        Some(path) => run_file(&mut interpreter, &path),
        None => {
            let options = ReplOptions {
                history: args.history,
                vi: args.vi,
            };
            match repl::run(interpreter, options) {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("Readline Error: {:?}", err);
                    1
                }
            }
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let worker = thread::Builder::new()
        .name("funlang".to_string())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || run(args));
    let code = match worker {
        Ok(handle) => handle.join().unwrap_or(1),
        Err(err) => {
            eprintln!("Failed to start the interpreter: {}", err);
            1
        }
    };
    process::exit(code);
}
