pub mod ast;
pub mod config;
pub mod error;
pub mod lox;
pub mod parser;
pub mod prelude;
pub mod reporter;
pub mod resolver;
pub mod runtime;
pub mod scanner;
mod stack;

pub use error::{Diagnostic, RuntimeError, StaticError};
pub use lox::{Lox, OutputBuffer, RunOutcome};
