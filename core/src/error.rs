//! Interpreter error types.

use std::fmt;
use std::path::PathBuf;

/// Families of interpreter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed source text
    Parse,
    /// A symbol or function could not be resolved
    Lookup,
    /// Wrong number of arguments
    Arity,
    /// A value of the wrong variant
    Type,
    /// Arithmetic failure such as division by zero
    Arithmetic,
    /// Attempted mutation of a protected symbol
    Constant,
    /// Host I/O failure inside a system call
    Io,
    /// Unrecoverable condition (recursion too deep, failed bootstrap)
    Fatal,
}

/// An error raised while reading or evaluating.
///
/// Operands are stored as their printed forms so the error stays meaningful
/// after the values that caused it are gone.
#[derive(Debug, Clone, PartialEq)]
pub enum LispError {
    UnexpectedEndOfStream,
    ExtraneousClosingParen,
    UndefinedSymbol(String),
    UndefinedFunction(String),
    Arity {
        operator: String,
        expected: usize,
        actual: usize,
        at_least: bool,
    },
    SymbolExpected(String),
    ListExpected(String),
    InvalidParameterList(String),
    InvalidOperation {
        operator: String,
        operands: Vec<String>,
    },
    NotConvertible(String),
    DivisionByZero,
    ConstantViolation(String),
    Io {
        operation: String,
        message: String,
    },
    StackExhausted {
        depth: usize,
    },
    Init {
        path: PathBuf,
        source: Box<LispError>,
    },
}

pub type Result<T> = std::result::Result<T, LispError>;

impl LispError {
    /// Exactly `expected` arguments were required.
    pub fn arity(operator: impl Into<String>, expected: usize, actual: usize) -> Self {
        LispError::Arity {
            operator: operator.into(),
            expected,
            actual,
            at_least: false,
        }
    }

    /// At least `expected` arguments were required.
    pub fn arity_at_least(operator: impl Into<String>, expected: usize, actual: usize) -> Self {
        LispError::Arity {
            operator: operator.into(),
            expected,
            actual,
            at_least: true,
        }
    }

    pub fn invalid_operation<T: fmt::Display>(operator: impl Into<String>, operands: &[T]) -> Self {
        LispError::InvalidOperation {
            operator: operator.into(),
            operands: operands.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn io(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        LispError::Io {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LispError::UnexpectedEndOfStream | LispError::ExtraneousClosingParen => {
                ErrorKind::Parse
            }
            LispError::UndefinedSymbol(_) | LispError::UndefinedFunction(_) => ErrorKind::Lookup,
            LispError::Arity { .. } => ErrorKind::Arity,
            LispError::SymbolExpected(_)
            | LispError::ListExpected(_)
            | LispError::InvalidParameterList(_)
            | LispError::InvalidOperation { .. }
            | LispError::NotConvertible(_) => ErrorKind::Type,
            LispError::DivisionByZero => ErrorKind::Arithmetic,
            LispError::ConstantViolation(_) => ErrorKind::Constant,
            LispError::Io { .. } => ErrorKind::Io,
            LispError::StackExhausted { .. } | LispError::Init { .. } => ErrorKind::Fatal,
        }
    }
}

impl fmt::Display for LispError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LispError::UnexpectedEndOfStream => write!(f, "Unexpected end of stream"),
            LispError::ExtraneousClosingParen => write!(f, "Extraneous )"),
            LispError::UndefinedSymbol(name) => write!(f, "Undefined symbol {name}"),
            LispError::UndefinedFunction(form) => write!(f, "Undefined function {form}"),
            LispError::Arity {
                operator,
                expected,
                actual,
                at_least,
            } => {
                let qualifier = if *at_least { "at least " } else { "" };
                write!(
                    f,
                    "{operator}: Expected {qualifier}{expected} parameter(s), got {actual}"
                )
            }
            LispError::SymbolExpected(got) => write!(f, "Expected symbol, got {got}"),
            LispError::ListExpected(got) => write!(f, "Expected list, got {got}"),
            LispError::InvalidParameterList(reason) => {
                write!(f, "Invalid parameter list: {reason}")
            }
            LispError::InvalidOperation { operator, operands } => {
                write!(f, "Invalid operation: ({operator}")?;
                for operand in operands {
                    write!(f, " {operand}")?;
                }
                write!(f, ")")
            }
            LispError::NotConvertible(type_name) => {
                write!(f, "Host value of type {type_name} could not be converted")
            }
            LispError::DivisionByZero => write!(f, "Division by zero"),
            LispError::ConstantViolation(name) => {
                write!(f, "{name} is a constant and can not be changed")
            }
            LispError::Io { operation, message } => write!(f, "{operation}: {message}"),
            LispError::StackExhausted { depth } => {
                write!(f, "Stack exhausted after {depth} nested evaluations")
            }
            LispError::Init { path, source } => {
                write!(f, "Failed to load {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for LispError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LispError::Init { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<LispError> for String {
    fn from(err: LispError) -> String {
        err.to_string()
    }
}
