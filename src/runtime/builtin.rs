use std::rc::Rc;
use std::time::SystemTime;

use crate::error::RuntimeError;

use super::callable::BuiltinFunc;
use super::environment::Environment;
use super::interpreter::Interpreter;
use super::value::Value;

fn clock_impl(_interperter: &mut Interpreter, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    // A clock set before the epoch reads as zero
    let seconds = SystemTime::UNIX_EPOCH
        .elapsed()
        .map(|duration| duration.as_secs_f64())
        .unwrap_or_default();
    Ok(Value::Number(seconds))
}

pub fn populate_builtin(global_env: &Environment) {
    global_env.define(
        "clock",
        Value::Callable(Rc::new(BuiltinFunc {
            name: "clock",
            arity: 0,
            call: clock_impl,
        })),
    );
}
