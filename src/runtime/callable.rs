use std::fmt::{self, Display};
use std::rc::Rc;

use crate::ast::FunDecl;
use crate::error::RuntimeError;

use super::environment::Environment;
use super::interpreter::{Interpreter, UnwindCause};
use super::value::Value;

/// Anything a call expression can invoke
/// The interpreter has already checked the argument count against arity before call runs
pub trait Callable: Display {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

#[derive(Debug, Clone)]
pub struct BuiltinFunc {
    pub name: &'static str,
    pub arity: usize,
    pub call: fn(&mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError>,
}

impl Display for BuiltinFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native fn>")
    }
}

impl Callable for BuiltinFunc {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, interperter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.call)(interperter, args)
    }
}

/// A function declared in the script together with the frame that was current when the declaration ran
#[derive(Clone)]
pub struct LoxFunc {
    pub declaration: Rc<FunDecl>,
    pub closure: Rc<Environment>,
}

impl Display for LoxFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.name)
    }
}

impl Callable for LoxFunc {
    fn name(&self) -> &str {
        &self.declaration.name.name
    }

    fn arity(&self) -> usize {
        self.declaration.parameters.len()
    }

    #[tracing::instrument(level = "trace", skip_all, fields(name = %self.declaration.name.name))]
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let frame = self.closure.open_scope();
        for (parameter, value) in self.declaration.parameters.iter().zip(args) {
            frame.define(&parameter.name, value);
        }
        match interpreter.execute_block(&self.declaration.body, frame) {
            Ok(()) => Ok(Value::Nil),
            Err(UnwindCause::Return(value)) => Ok(value),
            Err(UnwindCause::Error(error)) => Err(error),
        }
    }
}
