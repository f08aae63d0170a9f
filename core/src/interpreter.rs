//! Evaluator
//!
//! `eval` reduces a value against an environment. Lists whose head is a
//! special-form keyword are dispatched structurally; every other list is an
//! ordinary call through `apply`.

use std::rc::Rc;

use tracing::trace;

use crate::environment::{Environment, with_stack};
use crate::error::{LispError, Result};
use crate::interner::{Keyword, Symbol};
use crate::language::{Closure, ConsCell, Function, Value};

pub fn eval(expr: &Value, env: &Environment) -> Result<Value> {
    match expr {
        Value::Symbol(symbol) => env.get(symbol),
        Value::Cons(cell) => {
            let _guard = env.enter()?;
            with_stack(|| eval_list(cell, env))
        }
        // Nil, True, Number, Text and Function are already reduced
        _ => Ok(expr.clone()),
    }
}

fn eval_list(cell: &ConsCell, env: &Environment) -> Result<Value> {
    if let Value::Symbol(head) = &cell.car
        && let Some(keyword) = head.keyword()
        && keyword.is_special_form()
    {
        let args = cell.cdr.to_vec()?;
        return eval_special(keyword, head, &args, env);
    }

    let func = eval(&cell.car, env)?;
    let Value::Function(func) = func else {
        return Err(LispError::UndefinedFunction(cell.car.to_string()));
    };

    let mut args = Vec::new();
    for form in cell.cdr.iter() {
        args.push(eval(&form, env)?);
    }
    apply(&func, &args, env)
}

/// Invoke a function on already-evaluated arguments
pub fn apply(func: &Function, args: &[Value], env: &Environment) -> Result<Value> {
    match func {
        Function::Native(native) => native.call(args, env),
        Function::Closure(closure) => call_closure(closure, args),
    }
}

/// Run a macro expander on unevaluated argument forms
pub fn call_expander(expander: &Rc<Closure>, forms: &[Value]) -> Result<Value> {
    call_closure(expander, forms)
}

fn call_closure(closure: &Rc<Closure>, args: &[Value]) -> Result<Value> {
    let name = closure.display_name();
    let required = closure.params.len();
    match &closure.rest {
        Some(_) if args.len() < required => {
            return Err(LispError::arity_at_least(name, required, args.len()));
        }
        None if args.len() != required => {
            return Err(LispError::arity(name, required, args.len()));
        }
        _ => {}
    }

    trace!(closure = %name, args = args.len(), "calling closure");

    let frame = closure.env.extend();
    for (param, arg) in closure.params.iter().zip(args) {
        frame.define(param, arg.clone())?;
    }
    if let Some(rest) = &closure.rest {
        frame.define(rest, Value::list(args[required..].iter().cloned()))?;
    }

    eval_body(&closure.body, &frame)
}

/// Evaluate forms in order, returning the last (Nil when empty)
pub fn eval_body(body: &[Value], env: &Environment) -> Result<Value> {
    let mut result = Value::Nil;
    for form in body {
        result = eval(form, env)?;
    }
    Ok(result)
}

// ============================================================================
// Special Forms
// ============================================================================

fn eval_special(
    keyword: Keyword,
    head: &Symbol,
    args: &[Value],
    env: &Environment,
) -> Result<Value> {
    match keyword {
        Keyword::Quote => {
            expect_args(head, args, 1)?;
            Ok(args[0].clone())
        }
        Keyword::If => {
            expect_args(head, args, 3)?;
            if eval(&args[0], env)?.is_true() {
                eval(&args[1], env)
            } else {
                eval(&args[2], env)
            }
        }
        Keyword::Progn => eval_body(args, env),
        Keyword::Define => {
            expect_args(head, args, 2)?;
            let target = expect_symbol(&args[0])?;
            let value = eval(&args[1], env)?;
            env.define(target, value.clone())?;
            Ok(value)
        }
        Keyword::Setq => {
            expect_args(head, args, 2)?;
            let target = expect_symbol(&args[0])?;
            let value = eval(&args[1], env)?;
            env.set(target, value.clone())?;
            Ok(value)
        }
        Keyword::Lambda => {
            expect_at_least(head, args, 1)?;
            let closure = make_closure(None, &args[0], &args[1..], env)?;
            Ok(Value::closure(closure))
        }
        Keyword::Defun => {
            expect_at_least(head, args, 3)?;
            let name = expect_symbol(&args[0])?;
            let closure = make_closure(Some(name.clone()), &args[1], &args[2..], env)?;
            let value = Value::closure(closure);
            env.define(name, value.clone())?;
            Ok(value)
        }
        Keyword::While => {
            expect_at_least(head, args, 2)?;
            while eval(&args[0], env)?.is_true() {
                eval_body(&args[1..], env)?;
            }
            Ok(Value::Nil)
        }
        _ => Err(LispError::UndefinedFunction(head.to_string())),
    }
}

fn expect_args(head: &Symbol, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(LispError::arity(head.name(), expected, args.len()));
    }
    Ok(())
}

fn expect_at_least(head: &Symbol, args: &[Value], expected: usize) -> Result<()> {
    if args.len() < expected {
        return Err(LispError::arity_at_least(head.name(), expected, args.len()));
    }
    Ok(())
}

fn expect_symbol(value: &Value) -> Result<&Symbol> {
    value
        .as_symbol()
        .ok_or_else(|| LispError::SymbolExpected(value.to_string()))
}

/// Build a closure capturing `env`; the body is not evaluated.
pub fn make_closure(
    name: Option<Symbol>,
    params: &Value,
    body: &[Value],
    env: &Environment,
) -> Result<Closure> {
    let (params, rest) = parse_params(params)?;
    Ok(Closure {
        name,
        params,
        rest,
        body: body.to_vec(),
        env: env.clone(),
    })
}

// Split a parameter list into positional names and an optional `&rest` name
fn parse_params(list: &Value) -> Result<(Vec<Symbol>, Option<Symbol>)> {
    if !matches!(list, Value::Cons(_) | Value::Nil) {
        return Err(LispError::ListExpected(list.to_string()));
    }

    let mut names = Vec::new();
    let mut current = list.clone();
    while let Value::Cons(cell) = &current {
        names.push(expect_symbol(&cell.car)?.clone());
        let next = cell.cdr.clone();
        current = next;
    }
    if !current.is_nil() {
        return Err(LispError::InvalidParameterList(format!(
            "dotted parameter list {list}"
        )));
    }

    let Some(position) = names.iter().position(|s| s.is(Keyword::Rest)) else {
        return Ok((names, None));
    };
    if position + 2 != names.len() {
        return Err(LispError::InvalidParameterList(format!(
            "&rest must be followed by exactly one name in {list}"
        )));
    }
    let rest = names.pop();
    names.pop();
    Ok((names, rest))
}
