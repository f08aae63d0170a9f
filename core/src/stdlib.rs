//! Standard primitives
//!
//! Everything here is installed through the registration helpers in
//! `native`, so the evaluator sees these exactly like host-registered
//! functions.

use std::cell::{Cell, RefCell};
use std::fs;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::environment::Environment;
use crate::error::{LispError, Result};
use crate::expand;
use crate::interpreter;
use crate::language::{Function, Value, cons};
use crate::lexer::Lexer;
use crate::native::{
    Arity, expect_index, expect_number, expect_text, register_binary, register_native,
    register_unary, register_variadic,
};
use crate::ops::{self, Operator};
use crate::reader::Reader;

/// Name of the symbol `sys:read` returns once a port is drained
pub const EOF_SYMBOL: &str = "sys:eof";

// ============================================================================
// Print channel
// ============================================================================

type Subscriber = Rc<RefCell<dyn FnMut(&str)>>;

/// Fan-out for text produced by `print`.
///
/// Clones share the same subscriber list. Subscribers may evaluate code or
/// subscribe again from inside their callback.
#[derive(Clone, Default)]
pub struct PrintChannel {
    subscribers: Rc<RefCell<Vec<Subscriber>>>,
}

impl PrintChannel {
    pub fn subscribe(&self, subscriber: impl FnMut(&str) + 'static) {
        let subscriber: Subscriber = Rc::new(RefCell::new(subscriber));
        self.subscribers.borrow_mut().push(subscriber);
    }

    /// Deliver `text` to every subscriber, in subscription order.
    ///
    /// A subscriber whose callback is still running (it caused this print)
    /// does not see the nested text. Subscribers added during delivery
    /// receive the next print.
    pub fn emit(&self, text: &str) {
        let subscribers: Vec<Subscriber> = self.subscribers.borrow().clone();
        for subscriber in &subscribers {
            if let Ok(mut callback) = subscriber.try_borrow_mut() {
                (&mut *callback)(text);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

/// Install every primitive into the global frame of `env`
pub fn register_stdlib(env: &Environment, printer: &PrintChannel) -> Result<()> {
    register_list_primitives(env)?;
    register_predicates(env)?;
    register_arithmetic(env)?;
    register_sequences(env)?;
    register_identity(env)?;
    register_print(env, printer)?;
    register_meta(env)?;
    register_system(env)?;
    Ok(())
}

// ============================================================================
// Lists
// ============================================================================

pub fn register_list_primitives(env: &Environment) -> Result<()> {
    register_variadic(env, "list", |args| Ok(Value::list(args.iter().cloned())))?;
    register_binary(env, "cons", |car, cdr| Ok(cons(car.clone(), cdr.clone())))?;
    register_unary(env, "car", |v| v.car())?;
    register_unary(env, "cdr", |v| v.cdr())?;
    Ok(())
}

pub fn register_predicates(env: &Environment) -> Result<()> {
    register_unary(env, "nullp", |v| Ok(Value::boolean(v.is_nil())))?;
    register_unary(env, "consp", |v| Ok(Value::boolean(matches!(v, Value::Cons(_)))))?;
    register_unary(env, "symbolp", |v| {
        Ok(Value::boolean(matches!(v, Value::Symbol(_))))
    })?;
    register_unary(env, "numberp", |v| {
        Ok(Value::boolean(matches!(v, Value::Number(_))))
    })?;
    register_unary(env, "stringp", |v| Ok(Value::boolean(matches!(v, Value::Text(_)))))?;
    register_unary(env, "functionp", |v| {
        Ok(Value::boolean(matches!(v, Value::Function(_))))
    })?;
    Ok(())
}

// ============================================================================
// Arithmetic and comparison
// ============================================================================

pub fn register_arithmetic(env: &Environment) -> Result<()> {
    for op in Operator::ALL {
        let arity = match op {
            Operator::Add | Operator::Sub | Operator::Mul => Arity::AtLeast(1),
            Operator::Mod => Arity::Exact(2),
            _ => Arity::AtLeast(2),
        };
        register_native(env, op.symbol(), arity, move |args, _| ops::fold(op, args))?;
    }
    Ok(())
}

// ============================================================================
// Sequences
// ============================================================================

pub fn register_sequences(env: &Environment) -> Result<()> {
    register_unary(env, "length", |v| match v {
        Value::Text(s) => Ok(Value::from(s.graphemes(true).count())),
        Value::Nil | Value::Cons(_) => Ok(Value::from(v.iter().count())),
        _ => Err(LispError::invalid_operation("length", &[v])),
    })?;

    register_unary(env, "reverse", |v| match v {
        Value::Text(s) => Ok(Value::text(s.graphemes(true).rev().collect::<String>())),
        _ => {
            let mut items = v.to_vec()?;
            items.reverse();
            Ok(Value::list(items))
        }
    })?;

    register_native(env, "map", Arity::Exact(2), |args, env| {
        let f = expect_function("map", &args[0])?;
        let mut out = Vec::new();
        for item in args[1].elements()? {
            out.push(interpreter::apply(f, &[item], env)?);
        }
        Ok(Value::list(out))
    })?;

    register_native(env, "filter", Arity::Exact(2), |args, env| {
        let f = expect_function("filter", &args[0])?;
        let mut out = Vec::new();
        for item in args[1].elements()? {
            if interpreter::apply(f, std::slice::from_ref(&item), env)?.is_true() {
                out.push(item);
            }
        }
        Ok(Value::list(out))
    })?;

    register_native(env, "reduce", Arity::Exact(2), |args, env| {
        let f = expect_function("reduce", &args[0])?;
        let mut items = args[1].elements()?.into_iter();
        let Some(first) = items.next() else {
            return Ok(Value::Nil);
        };
        items.try_fold(first, |acc, item| interpreter::apply(f, &[acc, item], env))
    })?;

    register_native(env, "range", Arity::Between(1, 3), |args, _| range(args))?;
    register_native(env, "substring", Arity::Between(2, 3), |args, _| substring(args))?;
    Ok(())
}

fn expect_function<'a>(operator: &str, value: &'a Value) -> Result<&'a Function> {
    match value {
        Value::Function(f) => Ok(f),
        _ => Err(LispError::invalid_operation(operator, &[value])),
    }
}

/// Longest list `range` will build
pub const MAX_RANGE_LENGTH: usize = 1 << 24;

// (range end), (range start end) or (range start end step); end is exclusive
fn range(args: &[Value]) -> Result<Value> {
    let numbers = args
        .iter()
        .map(|arg| expect_number("range", arg))
        .collect::<Result<Vec<f64>>>()?;
    let (start, end, step) = match numbers.as_slice() {
        [end] => (0.0, *end, 1.0),
        [start, end] => (*start, *end, 1.0),
        [start, end, step] => (*start, *end, *step),
        _ => return Err(LispError::arity("range", 3, numbers.len())),
    };
    if step == 0.0 || !step.is_finite() {
        return Err(LispError::invalid_operation("range", args));
    }

    let count = ((end - start) / step).ceil();
    if !count.is_finite() || count > MAX_RANGE_LENGTH as f64 {
        return Err(LispError::invalid_operation("range", args));
    }
    if count <= 0.0 {
        return Ok(Value::Nil);
    }
    Ok(Value::list(
        (0..count as usize).map(|i| Value::Number(start + i as f64 * step)),
    ))
}

// (substring text from) or (substring text from to), indexed by character
fn substring(args: &[Value]) -> Result<Value> {
    let text = expect_text("substring", &args[0])?;
    let chars: Vec<&str> = text.graphemes(true).collect();
    let from = expect_index("substring", &args[1])?;
    let to = match args.get(2) {
        Some(to) => expect_index("substring", to)?,
        None => chars.len(),
    };
    if from > to || to > chars.len() {
        return Err(LispError::invalid_operation("substring", args));
    }
    Ok(Value::text(chars[from..to].concat()))
}

// ============================================================================
// Identity
// ============================================================================

pub fn register_identity(env: &Environment) -> Result<()> {
    register_binary(env, "eq", |a, b| Ok(Value::boolean(a.eq_identity(b))))?;
    register_binary(env, "equal", |a, b| Ok(Value::boolean(a == b)))?;
    register_native(env, "gensym", Arity::Exact(0), |_, env| {
        Ok(Value::Symbol(env.symbol_table().gensym()))
    })?;
    Ok(())
}

pub fn register_print(env: &Environment, printer: &PrintChannel) -> Result<()> {
    let printer = printer.clone();
    register_unary(env, "print", move |v| {
        printer.emit(&v.to_string());
        Ok(v.clone())
    })
}

// ============================================================================
// Evaluation entry points
// ============================================================================

pub fn register_meta(env: &Environment) -> Result<()> {
    register_native(env, "apply", Arity::Exact(2), |args, env| {
        let f = match &args[0] {
            Value::Function(f) => f,
            other => return Err(LispError::UndefinedFunction(other.to_string())),
        };
        interpreter::apply(f, &args[1].to_vec()?, env)
    })?;

    register_native(env, "eval", Arity::Exact(1), |args, env| {
        let global = env.global();
        let form = expand::expand_all(&args[0], &global)?;
        interpreter::eval(&form, &global)
    })?;

    register_native(env, "macroexpand-1", Arity::Exact(1), |args, env| {
        Ok(expand::macroexpand_1(&args[0], env)?.0)
    })?;

    register_native(env, "macroexpand", Arity::Exact(1), |args, env| {
        expand::macroexpand(&args[0], env)
    })?;
    Ok(())
}

// ============================================================================
// System calls
// ============================================================================

#[derive(Default)]
struct PortTable {
    ports: RefCell<FxHashMap<usize, Lexer>>,
    next_id: Cell<usize>,
}

impl PortTable {
    fn open(&self, lexer: Lexer) -> usize {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.ports.borrow_mut().insert(id, lexer);
        id
    }

    fn take(&self, operation: &str, port: &Value) -> Result<(usize, Lexer)> {
        let id = expect_index(operation, port)?;
        let lexer = self
            .ports
            .borrow_mut()
            .remove(&id)
            .ok_or_else(|| LispError::io(operation, format!("port {id} is not open")))?;
        Ok((id, lexer))
    }
}

pub fn register_system(env: &Environment) -> Result<()> {
    let ports = Rc::new(PortTable::default());
    let eof = Value::Symbol(env.intern(EOF_SYMBOL));

    let table = ports.clone();
    register_unary(env, "sys:open-file-for-input", move |path| {
        let path = expect_text("sys:open-file-for-input", path)?;
        let source = fs::read_to_string(path)
            .map_err(|e| LispError::io("sys:open-file-for-input", format!("{path}: {e}")))?;
        Ok(Value::from(table.open(Lexer::new(&source))))
    })?;

    let table = ports.clone();
    let marker = eof.clone();
    register_native(env, "sys:read", Arity::Exact(1), move |args, env| {
        // The port is out of the table while reading, so a macro expander may use other ports
        let (id, mut lexer) = table.take("sys:read", &args[0])?;
        let result = if lexer.skip_atmosphere() {
            Reader::new(env).read(&mut lexer)
        } else {
            Ok(marker.clone())
        };
        table.ports.borrow_mut().insert(id, lexer);
        result
    })?;

    let marker = eof;
    register_unary(env, "sys:eof-p", move |v| Ok(Value::boolean(v.eq_identity(&marker))))?;

    let table = ports;
    register_unary(env, "sys:close", move |port| {
        table.take("sys:close", port)?;
        Ok(Value::True)
    })?;
    Ok(())
}
