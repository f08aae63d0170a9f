use std::fs;
use std::path::Path;
use std::process;

use nlisp::{Engine, LispError};
use nlisp_cli::{Options, history_path, init_logging, input_is_complete, parse_args, usage};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

fn build_engine(options: &Options) -> Result<Engine, LispError> {
    let engine = Engine::with_config(options.engine_config())?;
    engine.on_print(|text| println!("{text}"));
    Ok(engine)
}

fn repl(engine: &Engine) -> Result<(), ReadlineError> {
    println!("NLisp REPL");
    println!("Type expressions to evaluate, or (exit) to quit");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && matches!(line.trim(), "(exit)" | "exit") {
                    break;
                }
                buffer.push_str(&line);
                buffer.push('\n');

                if !input_is_complete(&buffer) {
                    continue;
                }
                let _ = rl.add_history_entry(buffer.trim());
                if !buffer.trim().is_empty() {
                    match engine.evaluate(&buffer) {
                        Ok(result) => println!("{result}"),
                        Err(e) => eprintln!("Error: {e}"),
                    }
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C abandons a partial form
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    Ok(())
}

fn run_file(engine: &Engine, filename: &Path) -> Result<(), String> {
    debug!(file = %filename.display(), "running file");
    let contents = fs::read_to_string(filename)
        .map_err(|e| format!("Failed to read file '{}': {e}", filename.display()))?;

    let result = engine
        .evaluate(&contents)
        .map_err(|e| format!("Evaluation error: {e}"))?;
    println!("{result}");
    Ok(())
}

fn main() {
    init_logging();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{}", usage());
            process::exit(1);
        }
    };
    if options.help {
        eprintln!("{}", usage());
        return;
    }

    let engine = match build_engine(&options) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match &options.file {
        Some(file) => {
            if let Err(e) = run_file(&engine, file) {
                eprintln!("{e}");
                process::exit(1);
            }
        }
        None => {
            if let Err(e) = repl(&engine) {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
