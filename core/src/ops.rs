//! Binary operators
//!
//! Each operator is a capability a value variant may or may not support.
//! Unsupported combinations report `InvalidOperation` with the printed operands.

use std::cmp::Ordering;

use crate::error::{LispError, Result};
use crate::language::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Mod,
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::Le,
        Operator::Ge,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "mod",
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge
        )
    }

    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value> {
        if self.is_comparison() {
            return self.compare(lhs, rhs);
        }

        match (self, lhs, rhs) {
            (Operator::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Operator::Add, Value::Text(a), Value::Text(b)) => {
                Ok(Value::text(format!("{a}{b}")))
            }
            (Operator::Add, Value::Cons(_) | Value::Nil, Value::Cons(_) | Value::Nil) => {
                append(lhs, rhs)
            }
            (Operator::Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            (Operator::Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            (Operator::Div, Value::Number(_), Value::Number(b)) if *b == 0.0 => {
                Err(LispError::DivisionByZero)
            }
            (Operator::Div, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            (Operator::Mod, Value::Number(_), Value::Number(b)) if *b == 0.0 => {
                Err(LispError::DivisionByZero)
            }
            (Operator::Mod, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
            _ => Err(self.invalid(lhs, rhs)),
        }
    }

    fn compare(self, lhs: &Value, rhs: &Value) -> Result<Value> {
        let ordering = match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.as_ref().cmp(b.as_ref())),
            _ => return Err(self.invalid(lhs, rhs)),
        };
        // NaN compares false against everything
        let Some(ordering) = ordering else {
            return Ok(Value::Nil);
        };
        let holds = match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            _ => return Err(self.invalid(lhs, rhs)),
        };
        Ok(Value::boolean(holds))
    }

    fn invalid(self, lhs: &Value, rhs: &Value) -> LispError {
        LispError::invalid_operation(self.symbol(), &[lhs, rhs])
    }
}

/// Fold the operator over the arguments left to right.
///
/// Comparisons are chained pairwise: `(< 1 2 3)` holds when every adjacent
/// pair does. A single argument to `-` negates it.
pub fn fold(op: Operator, args: &[Value]) -> Result<Value> {
    if op.is_comparison() {
        for pair in args.windows(2) {
            if !op.apply(&pair[0], &pair[1])?.is_true() {
                return Ok(Value::Nil);
            }
        }
        return Ok(Value::True);
    }

    match (op, args) {
        (Operator::Sub, [Value::Number(n)]) => Ok(Value::Number(-n)),
        (_, [first, rest @ ..]) => rest
            .iter()
            .try_fold(first.clone(), |acc, arg| op.apply(&acc, arg)),
        (_, []) => Err(LispError::arity_at_least(op.symbol(), 1, 0)),
    }
}

fn append(lhs: &Value, rhs: &Value) -> Result<Value> {
    let items = lhs.to_vec()?;
    Ok(Value::list_with_tail(items, rhs.clone()))
}
