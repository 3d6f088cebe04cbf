mod builtin;
mod callable;
mod environment;
mod interpreter;
mod value;

use std::io::Write;

pub use builtin::populate_builtin;
pub use callable::{BuiltinFunc, Callable, LoxFunc};
pub use environment::Environment;
pub use interpreter::{Interpreter, UnwindCause};
pub use value::Value;

/// An interpreter whose globals hold the native functions, printing to `output`
pub fn stock_interpreter(output: Box<dyn Write>) -> Interpreter {
    let global_env = Environment::new_global();
    populate_builtin(&global_env);
    Interpreter::new_with_global(global_env, output)
}
