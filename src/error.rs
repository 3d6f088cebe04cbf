use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Where in the line a static error was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Scanner errors have no token to point at
    None,
    /// The error was detected at the given lexeme
    At(String),
    /// The error was detected at the end of input
    End,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Location::None => Ok(()),
            Location::At(lexeme) => write!(f, " at '{}'", lexeme),
            Location::End => f.write_str(" at end"),
        }
    }
}

/// An error found before any code runs: while scanning, parsing or resolving
#[derive(Clone, Error, Debug, PartialEq, Eq)]
#[error("[line {line}] Error{location}: {message}")]
pub struct StaticError {
    pub line: usize,
    pub location: Location,
    pub message: String,
}

impl StaticError {
    pub fn new(line: usize, location: Location, message: impl Into<String>) -> StaticError {
        StaticError {
            line,
            location,
            message: message.into(),
        }
    }
}

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Operand must be a number.\n[line {line}]")]
    OperandNotNumber { line: usize },
    #[error("Operands must be numbers.\n[line {line}]")]
    OperandsNotNumbers { line: usize },
    #[error("Operands must be a numbers or strings.\n[line {line}]")]
    OperandsNotNumbersOrStrings { line: usize },
    #[error("Undefined variable '{name}'.\n[line {line}]")]
    UndefinedVariable { name: String, line: usize },
    #[error("Can only call functions.\n[line {line}]")]
    NotCallable { line: usize },
    #[error("Expected {expected} arguments but got {actual}.\n[line {line}]")]
    ArityMismatch {
        expected: usize,
        actual: usize,
        line: usize,
    },
}

impl RuntimeError {
    /// The source line of the token that triggered the error
    pub fn line(&self) -> usize {
        match self {
            RuntimeError::OperandNotNumber { line }
            | RuntimeError::OperandsNotNumbers { line }
            | RuntimeError::OperandsNotNumbersOrStrings { line }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::NotCallable { line }
            | RuntimeError::ArityMismatch { line, .. } => *line,
        }
    }
}

/// Everything the core reports back to the driver
#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    #[error(transparent)]
    Static(#[from] StaticError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
