//! Engine façade
//!
//! An `Engine` owns a global environment, the reader bound to it, and the
//! print channel. Hosts drive it with `evaluate` and observe output through
//! `on_print`.

use std::any::Any;
use std::fs;
use std::rc::Rc;

use tracing::debug;

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::{LispError, Result};
use crate::interner::{Keyword, Symbol, SymbolTable};
use crate::interpreter;
use crate::language::{Function, Value};
use crate::lexer::Lexer;
use crate::native::{self, Arity};
use crate::reader::Reader;
use crate::stdlib::{self, PrintChannel};

pub struct Engine {
    global: Environment,
    reader: Reader,
    printer: PrintChannel,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Build an engine, install the primitives and run the bootstrap file.
    ///
    /// A bootstrap file that exists but fails to read or evaluate is an error.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let global = Environment::new_global(SymbolTable::new(config.symbol_case));
        global.set_max_depth(config.max_eval_depth);

        let printer = PrintChannel::default();
        for (keyword, value) in [(Keyword::Nil, Value::Nil), (Keyword::T, Value::True)] {
            let symbol = global.intern(keyword.text());
            global.define(&symbol, value)?;
            global.make_constant(&symbol);
        }
        stdlib::register_stdlib(&global, &printer)?;

        let engine = Engine {
            reader: Reader::new(&global),
            global,
            printer,
            config,
        };
        debug!(
            symbol_case = ?engine.config.symbol_case,
            max_eval_depth = engine.config.max_eval_depth,
            "engine constructed"
        );

        engine.load_init_file()?;
        Ok(engine)
    }

    fn load_init_file(&self) -> Result<()> {
        let Some(path) = &self.config.init_file else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        debug!(path = %path.display(), "loading init file");
        let wrap = |source: LispError| LispError::Init {
            path: path.clone(),
            source: Box::new(source),
        };
        let source = fs::read_to_string(path).map_err(|e| wrap(LispError::io("read", e)))?;
        self.evaluate(&source).map_err(wrap)?;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn global(&self) -> &Environment {
        &self.global
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Read and evaluate every form in `text`, returning the last result.
    ///
    /// Evaluation stops at the first error; effects of earlier forms stand.
    pub fn evaluate(&self, text: &str) -> Result<Value> {
        debug!(bytes = text.len(), "evaluate");
        let mut lexer = Lexer::new(text);
        let mut result = Value::Nil;
        while lexer.skip_atmosphere() {
            let form = self.reader.read(&mut lexer)?;
            result = interpreter::eval(&form, &self.global)?;
        }
        Ok(result)
    }

    /// Evaluate the lines as the body of one `progn`
    pub fn evaluate_lines<I, S>(&self, lines: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::from("(progn\n");
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        text.push(')');
        self.evaluate(&text)
    }

    /// Read the first form of `text` without evaluating it
    pub fn read(&self, text: &str) -> Result<Value> {
        self.reader.read_str(text)
    }

    // ========================================================================
    // Host interface
    // ========================================================================

    pub fn intern(&self, name: &str) -> Symbol {
        self.global.intern(name)
    }

    /// Bind `name` globally
    pub fn set_variable(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.register_value(name, value)
    }

    pub fn register_value(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        native::register_value(&self.global, name, value)
    }

    /// Bind `name` to a converted host value; unsupported types are `NotConvertible`
    pub fn set_host_variable<T: Any>(&self, name: &str, value: &T) -> Result<()> {
        self.set_variable(name, Value::from_host(value)?)
    }

    pub fn get_variable(&self, name: &str) -> Result<Value> {
        self.global.get(&self.intern(name))
    }

    pub fn register_unary<F>(&self, name: &str, op: F) -> Result<()>
    where
        F: Fn(&Value) -> Result<Value> + 'static,
    {
        native::register_unary(&self.global, name, op)
    }

    pub fn register_binary<F>(&self, name: &str, op: F) -> Result<()>
    where
        F: Fn(&Value, &Value) -> Result<Value> + 'static,
    {
        native::register_binary(&self.global, name, op)
    }

    pub fn register_function<F>(&self, name: &str, arity: Arity, op: F) -> Result<()>
    where
        F: Fn(&[Value], &Environment) -> Result<Value> + 'static,
    {
        native::register_native(&self.global, name, arity, op)
    }

    /// Subscribe to text produced by `print`
    pub fn on_print(&self, subscriber: impl FnMut(&str) + 'static) {
        self.printer.subscribe(subscriber);
    }

    /// Forbid any further `define` or `setq` of `name`
    pub fn make_constant(&self, name: &str) {
        self.global.make_constant(&self.intern(name));
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.global.is_constant(&self.intern(name))
    }

    /// Register a closure as the expander for macro `name`
    pub fn define_macro(&self, name: &str, expander: Value) -> Result<()> {
        let Value::Function(Function::Closure(closure)) = &expander else {
            return Err(LispError::invalid_operation("defmacro", &[&expander]));
        };
        debug!(macro_name = name, "registered macro");
        self.global.define_macro(&self.intern(name), Rc::clone(closure));
        Ok(())
    }

    /// Names bound in the global frame
    pub fn symbols(&self) -> Vec<String> {
        self.global
            .symbols()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Names of registered macros
    pub fn macros(&self) -> Vec<String> {
        self.global
            .macros()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }
}

// Global closures capture the global frame; clearing it releases them
impl Drop for Engine {
    fn drop(&mut self) {
        self.global.clear();
    }
}
