//! NLisp runtime support
//!
//! Argument handling, input completeness checks and logging setup shared by
//! the `nlisp` binary and its tests.

use std::path::PathBuf;

use nlisp::lexer::{Lexer, Token};
use nlisp::{EngineConfig, SymbolCase};
use tracing_subscriber::EnvFilter;

pub const HISTORY_FILE: &str = ".nlisp_history";

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub no_init: bool,
    pub upper: bool,
    pub help: bool,
    pub file: Option<PathBuf>,
}

impl Options {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new();
        if self.no_init {
            config = config.without_init_file();
        }
        if self.upper {
            config = config.symbol_case(SymbolCase::Upper);
        }
        config
    }
}

/// Parse `nlisp [--no-init] [--upper] [FILE]`; the program name is not included
pub fn parse_args<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    for arg in args {
        match arg.as_str() {
            "--no-init" => options.no_init = true,
            "--upper" => options.upper = true,
            "--help" | "-h" => options.help = true,
            flag if flag.starts_with("--") => return Err(format!("Unknown option: {flag}")),
            _ if options.file.is_some() => return Err("Too many arguments".to_string()),
            file => options.file = Some(PathBuf::from(file)),
        }
    }
    Ok(options)
}

pub fn usage() -> &'static str {
    "Usage:
  nlisp [--no-init] [--upper]          Start interactive REPL
  nlisp [--no-init] [--upper] <file>   Run a Lisp file
  nlisp --help                         Show this help message

Options:
  --no-init   Skip loading Init.lsp from the working directory
  --upper     Fold symbol names to upper case"
}

/// True when `text` holds only complete forms (balanced parens, closed strings)
pub fn input_is_complete(text: &str) -> bool {
    let mut lexer = Lexer::new(text);
    let mut depth = 0usize;
    loop {
        match lexer.next_token() {
            Ok(Token::Eof) => return depth == 0,
            Ok(Token::LParen) => depth += 1,
            Ok(Token::RParen) => depth = depth.saturating_sub(1),
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// `~/.nlisp_history`, when a home directory is known
pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

/// Route library events to stderr, filtered by `RUST_LOG` (default `warn`)
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
