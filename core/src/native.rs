//! Builtin registration
//!
//! Host closures are wrapped as `NativeFunction`s that check their argument
//! count before running, then bound in the global environment. The evaluator
//! calls them through the same `apply` path as interpreted closures.

use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{LispError, Result};
use crate::language::Value;

/// Signature every native body implements.
pub type NativeOp = dyn Fn(&[Value], &Environment) -> Result<Value>;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn check(self, operator: &str, actual: usize) -> Result<()> {
        match self {
            Arity::Exact(n) if actual != n => Err(LispError::arity(operator, n, actual)),
            Arity::AtLeast(n) if actual < n => Err(LispError::arity_at_least(operator, n, actual)),
            Arity::Between(min, _) if actual < min => {
                Err(LispError::arity_at_least(operator, min, actual))
            }
            Arity::Between(_, max) if actual > max => Err(LispError::arity(operator, max, actual)),
            _ => Ok(()),
        }
    }
}

/// A host-provided function.
pub struct NativeFunction {
    name: String,
    arity: Arity,
    op: Rc<NativeOp>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, arity: Arity, op: F) -> Self
    where
        F: Fn(&[Value], &Environment) -> Result<Value> + 'static,
    {
        NativeFunction {
            name: name.into(),
            arity,
            op: Rc::new(op),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Check the argument count, then run the body.
    pub fn call(&self, args: &[Value], env: &Environment) -> Result<Value> {
        self.arity.check(&self.name, args.len())?;
        (self.op)(args, env)
    }

    /// Natives are equal when they wrap the same operation
    pub fn same_operation(&self, other: &NativeFunction) -> bool {
        Rc::ptr_eq(&self.op, &other.op)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Bind `value` under `name` in the global frame.
pub fn register_value(env: &Environment, name: &str, value: impl Into<Value>) -> Result<()> {
    let global = env.global();
    let symbol = global.intern(name);
    global.define(&symbol, value.into())
}

pub fn register_native<F>(env: &Environment, name: &str, arity: Arity, op: F) -> Result<()>
where
    F: Fn(&[Value], &Environment) -> Result<Value> + 'static,
{
    register_value(env, name, Value::native(NativeFunction::new(name, arity, op)))
}

pub fn register_nullary<F>(env: &Environment, name: &str, op: F) -> Result<()>
where
    F: Fn() -> Result<Value> + 'static,
{
    register_native(env, name, Arity::Exact(0), move |_, _| op())
}

pub fn register_unary<F>(env: &Environment, name: &str, op: F) -> Result<()>
where
    F: Fn(&Value) -> Result<Value> + 'static,
{
    register_native(env, name, Arity::Exact(1), move |args, _| op(&args[0]))
}

pub fn register_binary<F>(env: &Environment, name: &str, op: F) -> Result<()>
where
    F: Fn(&Value, &Value) -> Result<Value> + 'static,
{
    register_native(env, name, Arity::Exact(2), move |args, _| op(&args[0], &args[1]))
}

pub fn register_variadic<F>(env: &Environment, name: &str, op: F) -> Result<()>
where
    F: Fn(&[Value]) -> Result<Value> + 'static,
{
    register_native(env, name, Arity::AtLeast(0), move |args, _| op(args))
}

// ============================================================================
// Argument helpers
// ============================================================================

pub fn expect_number(operator: &str, value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| LispError::invalid_operation(operator, &[value]))
}

pub fn expect_text<'a>(operator: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_text()
        .ok_or_else(|| LispError::invalid_operation(operator, &[value]))
}

/// A non-negative whole number usable as an index or count
pub fn expect_index(operator: &str, value: &Value) -> Result<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        _ => Err(LispError::invalid_operation(operator, &[value])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_exact() {
        assert!(Arity::Exact(2).check("f", 2).is_ok());
        let err = Arity::Exact(2).check("f", 3).unwrap_err();
        assert_eq!(err, LispError::arity("f", 2, 3));
    }

    #[test]
    fn test_arity_at_least() {
        assert!(Arity::AtLeast(1).check("f", 5).is_ok());
        assert_eq!(
            Arity::AtLeast(1).check("f", 0).unwrap_err(),
            LispError::arity_at_least("f", 1, 0)
        );
    }

    #[test]
    fn test_arity_between() {
        let arity = Arity::Between(1, 3);
        assert!(arity.check("range", 1).is_ok());
        assert!(arity.check("range", 3).is_ok());
        assert!(arity.check("range", 0).is_err());
        assert_eq!(arity.check("range", 4).unwrap_err(), LispError::arity("range", 3, 4));
    }

    #[test]
    fn test_call_checks_arity_before_body() {
        use std::cell::Cell;
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let native = NativeFunction::new("probe", Arity::Exact(1), move |_, _| {
            flag.set(true);
            Ok(Value::Nil)
        });
        let env = Environment::new_global(Default::default());
        assert!(native.call(&[], &env).is_err());
        assert!(!ran.get());
        assert!(native.call(&[Value::Nil], &env).is_ok());
        assert!(ran.get());
    }

    #[test]
    fn test_register_binary() {
        let env = Environment::new_global(Default::default());
        register_binary(&env, "pair", |a, b| Ok(crate::language::cons(a.clone(), b.clone())))
            .unwrap();
        let value = env.get(&env.intern("pair")).unwrap();
        assert_eq!(value.to_string(), "<builtin pair>");
    }

    #[test]
    fn test_expect_index() {
        assert_eq!(expect_index("f", &Value::Number(3.0)).unwrap(), 3);
        assert!(expect_index("f", &Value::Number(-1.0)).is_err());
        assert!(expect_index("f", &Value::Number(1.5)).is_err());
    }
}
