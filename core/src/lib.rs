//! NLisp: an embeddable Lisp interpreter
//!
//! This crate contains the object model, the macro-expanding reader, the
//! lexical environment, the evaluator and the `Engine` façade that hosts
//! drive. Interactive use lives in the `nlisp-cli` crate.

pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod expand;
pub mod interner;
pub mod interpreter;
pub mod language;
pub mod lexer;
pub mod native;
pub mod ops;
pub mod reader;
pub mod stdlib;

// Re-export commonly used items for convenience
pub use config::EngineConfig;
pub use engine::Engine;
pub use environment::Environment;
pub use error::{ErrorKind, LispError, Result};
pub use interner::{Keyword, Symbol, SymbolCase, SymbolTable};
pub use interpreter::{apply, eval};
pub use language::{Closure, ConsCell, Function, Value, cons};
pub use native::{Arity, NativeFunction};
pub use reader::Reader;
pub use stdlib::PrintChannel;
