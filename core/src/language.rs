use std::any::Any;
use std::fmt;
use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use crate::environment::{Environment, with_stack};
use crate::error::{LispError, Result};
use crate::interner::Symbol;
use crate::native::NativeFunction;

// ============================================================================
// Core Type System
// ============================================================================

/// A pair cell. Immutable once built; lists are chains of these.
pub struct ConsCell {
    pub car: Value,
    pub cdr: Value,
}

// Unlink nested cells through a worklist so dropping deep structure can't overflow the stack
impl Drop for ConsCell {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(value) = pending.pop() {
            if let Value::Cons(cell) = value
                && let Ok(mut inner) = Rc::try_unwrap(cell)
            {
                inner.detach_children(&mut pending);
            }
        }
    }
}

impl ConsCell {
    fn detach_children(&mut self, pending: &mut Vec<Value>) {
        for slot in [&mut self.car, &mut self.cdr] {
            if matches!(slot, Value::Cons(_)) {
                pending.push(std::mem::replace(slot, Value::Nil));
            }
        }
    }
}

/// An interpreted lambda.
pub struct Closure {
    /// Set when the closure was created by `defun`
    pub name: Option<Symbol>,
    pub params: Vec<Symbol>,
    /// Parameter collecting surplus arguments (`&rest name`)
    pub rest: Option<Symbol>,
    pub body: Vec<Value>,
    /// Defining scope, shared with everything else that captured it
    pub env: Environment,
}

impl Closure {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => "lambda".to_string(),
        }
    }
}

// Environment is a shared scope chain; printing it would walk every binding
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("body", &self.body)
            .field("env", &"<environment>")
            .finish()
    }
}

#[derive(Clone)]
pub enum Function {
    Native(Rc<NativeFunction>),
    Closure(Rc<Closure>),
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => a.same_operation(b),
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub enum Value {
    /// Empty list and false
    Nil,
    True,
    Number(f64),
    Text(Rc<str>),
    Symbol(Symbol),
    Cons(Rc<ConsCell>),
    Function(Function),
}

// ============================================================================
// Construction
// ============================================================================

pub fn cons(car: Value, cdr: Value) -> Value {
    Value::Cons(Rc::new(ConsCell { car, cdr }))
}

impl Value {
    pub fn text(s: impl Into<Rc<str>>) -> Value {
        Value::Text(s.into())
    }

    pub fn boolean(b: bool) -> Value {
        if b { Value::True } else { Value::Nil }
    }

    /// Build a proper list from the items, in order
    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        let items: Vec<Value> = items.into_iter().collect();
        Value::list_with_tail(items, Value::Nil)
    }

    /// Build a list whose final cdr is `tail` (dotted when `tail` is not a list)
    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Value {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| cons(item, acc))
    }

    pub fn native(function: NativeFunction) -> Value {
        Value::Function(Function::Native(Rc::new(function)))
    }

    pub fn closure(closure: Closure) -> Value {
        Value::Function(Function::Closure(Rc::new(closure)))
    }

    /// Convert a host value into the matching variant.
    ///
    /// Supports booleans, integers, floats, chars, strings, `()` (as Nil),
    /// `Value` itself, and vectors of those.
    pub fn from_host<T: Any>(value: &T) -> Result<Value> {
        let any = value as &dyn Any;
        convert_any(any).ok_or_else(|| LispError::NotConvertible(std::any::type_name::<T>().into()))
    }
}

fn convert_any(any: &dyn Any) -> Option<Value> {
    macro_rules! numeric {
        ($($t:ty),*) => {
            $(if let Some(n) = any.downcast_ref::<$t>() {
                return Some(Value::Number(*n as f64));
            })*
        };
    }
    macro_rules! sequence {
        ($($t:ty),*) => {
            $(if let Some(items) = any.downcast_ref::<Vec<$t>>() {
                return items.iter().map(|item| convert_any(item)).collect::<Option<Vec<_>>>().map(Value::list);
            })*
        };
    }

    if let Some(v) = any.downcast_ref::<Value>() {
        return Some(v.clone());
    }
    if any.downcast_ref::<()>().is_some() {
        return Some(Value::Nil);
    }
    if let Some(b) = any.downcast_ref::<bool>() {
        return Some(Value::boolean(*b));
    }
    numeric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
    if let Some(c) = any.downcast_ref::<char>() {
        return Some(Value::text(c.to_string()));
    }
    if let Some(s) = any.downcast_ref::<String>() {
        return Some(Value::text(s.as_str()));
    }
    if let Some(s) = any.downcast_ref::<&'static str>() {
        return Some(Value::text(*s));
    }
    sequence!(Value, bool, i32, i64, u32, u64, usize, f32, f64, String, &'static str);
    None
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into))
    }
}

// ============================================================================
// Inspection
// ============================================================================

impl Value {
    /// Only Nil is false
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Nil)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::True => "t",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Cons(_) => "cons",
            Value::Function(Function::Native(_)) => "builtin",
            Value::Function(Function::Closure(_)) => "closure",
        }
    }

    /// Nil's car is Nil
    pub fn car(&self) -> Result<Value> {
        match self {
            Value::Cons(cell) => Ok(cell.car.clone()),
            Value::Nil => Ok(Value::Nil),
            _ => Err(LispError::ListExpected(self.to_string())),
        }
    }

    /// Nil's cdr is Nil
    pub fn cdr(&self) -> Result<Value> {
        match self {
            Value::Cons(cell) => Ok(cell.cdr.clone()),
            Value::Nil => Ok(Value::Nil),
            _ => Err(LispError::ListExpected(self.to_string())),
        }
    }

    /// Walk a list; an improper tail is yielded as the final element.
    /// Nil and non-list values yield nothing.
    pub fn iter(&self) -> ListIter {
        match self {
            Value::Cons(_) => ListIter {
                next: Some(self.clone()),
            },
            _ => ListIter { next: None },
        }
    }

    /// Elements of a list (or Nil); anything else is `ListExpected`
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        match self {
            Value::Nil | Value::Cons(_) => Ok(self.iter().collect()),
            _ => Err(LispError::ListExpected(self.to_string())),
        }
    }

    /// The elements of a sequence: list items, or one Text per character of a Text
    pub fn elements(&self) -> Result<Vec<Value>> {
        match self {
            Value::Text(s) => Ok(s.graphemes(true).map(Value::text).collect()),
            _ => self.to_vec(),
        }
    }

    /// Identity comparison used by `eq`; equal numbers count as identical
    pub fn eq_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Cons(a), Value::Cons(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

/// Forward iteration over a (possibly dotted) list.
pub struct ListIter {
    next: Option<Value>,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self.next.take()? {
            Value::Cons(cell) => {
                if !cell.cdr.is_nil() {
                    self.next = Some(cell.cdr.clone());
                }
                Some(cell.car.clone())
            }
            tail => Some(tail),
        }
    }
}

// ============================================================================
// Equality
// ============================================================================

// Structural for Number/Text/Cons, identity for the rest
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let (mut a, mut b) = (self, other);
        loop {
            return match (a, b) {
                (Value::Cons(x), Value::Cons(y)) => {
                    if Rc::ptr_eq(x, y) {
                        true
                    } else if !with_stack(|| x.car == y.car) {
                        false
                    } else {
                        a = &x.cdr;
                        b = &y.cdr;
                        continue;
                    }
                }
                (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
                (Value::Number(x), Value::Number(y)) => x == y,
                (Value::Text(x), Value::Text(y)) => x == y,
                (Value::Symbol(x), Value::Symbol(y)) => x == y,
                (Value::Function(x), Value::Function(y)) => x == y,
                _ => false,
            };
        }
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Function::Native(native) => write!(f, "<builtin {}>", native.name()),
            Function::Closure(closure) => match &closure.name {
                Some(name) => write!(f, "<closure {name}>"),
                None => write!(f, "<closure>"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::True => write!(f, "t"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Cons(_) => {
                write!(f, "(")?;
                let mut current = self;
                while let Value::Cons(cell) = current {
                    with_stack(|| write!(f, "{}", cell.car))?;
                    match &cell.cdr {
                        Value::Nil => break,
                        Value::Cons(_) => {
                            write!(f, " ")?;
                            current = &cell.cdr;
                        }
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Function(func) => write!(f, "{func}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}
