use std::io::Write;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprId, ExprInner, LogicalOp, Program, Stmt, UnaryOp};
use crate::error::RuntimeError;
use crate::resolver::Locals;
use crate::stack::ensure_sufficient_stack;

use super::callable::LoxFunc;
use super::environment::Environment;
use super::value::Value;

/// Why statement execution stopped early
pub enum UnwindCause {
    /// A return statement, carrying its value to the enclosing call
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for UnwindCause {
    fn from(error: RuntimeError) -> UnwindCause {
        UnwindCause::Error(error)
    }
}

pub struct Interpreter {
    globals: Rc<Environment>,
    // The frame statements currently execute in, swapped on block entry and restored on every exit
    environment: Rc<Environment>,
    locals: Locals,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new_with_global(globals: Rc<Environment>, output: Box<dyn Write>) -> Interpreter {
        Interpreter {
            environment: globals.clone(),
            globals,
            locals: Locals::new(),
            output,
        }
    }

    /// Record resolved scope distances
    /// Must happen before the resolved code runs; earlier resolutions are kept so functions from earlier runs still work
    pub fn resolve(&mut self, locals: Locals) {
        self.locals.extend(locals);
    }

    pub fn globals(&self) -> &Rc<Environment> {
        &self.globals
    }

    /// True when no block or call is executing
    pub fn in_global_scope(&self) -> bool {
        Rc::ptr_eq(&self.environment, &self.globals)
    }

    /// Run every statement in order, stopping at the first runtime error
    pub fn interpret(&mut self, program: &Program) -> Result<(), RuntimeError> {
        for stmt in program.0.iter() {
            match self.execute(stmt) {
                Ok(()) => {}
                // The resolver rejects this, but without it a stray return just ends the program
                Err(UnwindCause::Return(_)) => return Ok(()),
                Err(UnwindCause::Error(error)) => {
                    tracing::debug!(%error, "runtime error");
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Run a single statement, handing back the value if it was an expression statement
    pub fn interpret_one(&mut self, stmt: &Stmt) -> Result<Option<Value>, RuntimeError> {
        match stmt {
            Stmt::Expr(expr) => self.eval(expr).map(Some),
            stmt => match self.execute(stmt) {
                Ok(()) | Err(UnwindCause::Return(_)) => Ok(None),
                Err(UnwindCause::Error(error)) => Err(error),
            },
        }
    }

    /// Write a value to the program output the way print does
    pub fn print(&mut self, value: &Value) {
        // If we can't write to our output: 🤷🏻‍♂️
        _ = writeln!(self.output, "{}", value);
    }

    /// Execute statements with `frame` as the current environment
    /// The previous environment is restored however the block exits
    pub fn execute_block(&mut self, stmts: &[Stmt], frame: Rc<Environment>) -> Result<(), UnwindCause> {
        let previous = std::mem::replace(&mut self.environment, frame);
        let result = stmts.iter().try_for_each(|stmt| self.execute(stmt));
        self.environment = previous;
        result
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), UnwindCause> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<(), UnwindCause> {
        match stmt {
            Stmt::VarDecl { name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.name, value);
            }
            Stmt::FunDecl(declaration) => {
                let function = LoxFunc {
                    declaration: declaration.clone(),
                    // The live frame, not a copy, so the function sees later changes to it
                    closure: self.environment.clone(),
                };
                self.environment
                    .define(&declaration.name.name, Value::Callable(Rc::new(function)));
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Print(expr) => {
                let value = self.eval(expr)?;
                self.print(&value);
            }
            Stmt::Block(stmts) => {
                let frame = self.environment.open_scope();
                self.execute_block(stmts, frame)?;
            }
            Stmt::If {
                expr: test,
                then: if_true,
                or_else: if_false,
            } => {
                if self.eval(test)?.to_bool() {
                    self.execute(if_true)?;
                } else if let Some(false_stmt) = if_false {
                    self.execute(false_stmt)?;
                }
            }
            Stmt::Loop { expr, body } => {
                while self.eval(expr)?.to_bool() {
                    self.execute(body)?;
                }
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };
                return Err(UnwindCause::Return(value));
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| self.eval_expr(expr))
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let line = expr.line;
        match &expr.inner {
            ExprInner::Binary { left, op, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                binary(*op, lhs, rhs, line)
            }
            ExprInner::Unary { op, expr } => {
                let val = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!val.to_bool())),
                    UnaryOp::Negative => match val {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::OperandNotNumber { line }),
                    },
                }
            }
            ExprInner::Group(expr) => self.eval(expr),
            ExprInner::Literal(literal) => Ok(Value::from(literal)),
            ExprInner::Variable { name } => self.lookup_variable(expr.id, name, line),
            ExprInner::Assignment { target, expr: value_expr } => {
                let value = self.eval(value_expr)?;
                self.assign_variable(expr.id, target, value.clone(), line)?;
                Ok(value)
            }
            // Logical operators hand back the deciding operand itself, i.e. nil or "a" is "a"
            ExprInner::Logical { left, op, right } => {
                let left_val = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left_val.to_bool(),
                    LogicalOp::Or => left_val.to_bool(),
                };
                if short_circuit {
                    Ok(left_val)
                } else {
                    self.eval(right)
                }
            }
            ExprInner::Call { callee, arguments } => {
                let callee = self.eval(callee)?;
                let args = arguments
                    .iter()
                    .map(|expr| self.eval(expr))
                    .collect::<Result<Vec<_>, _>>()?;
                let Some(callable) = callee.to_callable() else {
                    return Err(RuntimeError::NotCallable { line });
                };
                if args.len() != callable.arity() {
                    return Err(RuntimeError::ArityMismatch {
                        expected: callable.arity(),
                        actual: args.len(),
                        line,
                    });
                }
                callable.call(self, args)
            }
        }
    }

    // Resolved names go straight to their frame, everything else is a global
    fn lookup_variable(&self, id: ExprId, name: &str, line: usize) -> Result<Value, RuntimeError> {
        let value = match self.locals.get(&id) {
            Some(distance) => self.environment.get_at(*distance, name),
            None => self.globals.get(name),
        };
        value.ok_or_else(|| RuntimeError::UndefinedVariable {
            name: name.to_string(),
            line,
        })
    }

    fn assign_variable(
        &mut self,
        id: ExprId,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let assigned = match self.locals.get(&id) {
            Some(distance) => self.environment.assign_at(*distance, name, value),
            None => self.globals.assign(name, value),
        };
        if assigned {
            Ok(())
        } else {
            Err(RuntimeError::UndefinedVariable {
                name: name.to_string(),
                line,
            })
        }
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value, line: usize) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEqual => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), Value::String(r)) => {
                let mut new = l.as_ref().to_owned();
                new.push_str(r.as_str());
                Ok(Value::String(Rc::new(new)))
            }
            _ => Err(RuntimeError::OperandsNotNumbersOrStrings { line }),
        },
        BinaryOp::Subtract => numbers(lhs, rhs, line).map(|(l, r)| Value::Number(l - r)),
        BinaryOp::Multiply => numbers(lhs, rhs, line).map(|(l, r)| Value::Number(l * r)),
        // IEEE division, x / 0 is infinite rather than an error
        BinaryOp::Divide => numbers(lhs, rhs, line).map(|(l, r)| Value::Number(l / r)),
        BinaryOp::LessThan => numbers(lhs, rhs, line).map(|(l, r)| Value::Bool(l < r)),
        BinaryOp::LessThanEqual => numbers(lhs, rhs, line).map(|(l, r)| Value::Bool(l <= r)),
        BinaryOp::GreaterThan => numbers(lhs, rhs, line).map(|(l, r)| Value::Bool(l > r)),
        BinaryOp::GreaterThanEqual => numbers(lhs, rhs, line).map(|(l, r)| Value::Bool(l >= r)),
    }
}

fn numbers(lhs: Value, rhs: Value, line: usize) -> Result<(f64, f64), RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(l), Value::Number(r)) => Ok((l, r)),
        _ => Err(RuntimeError::OperandsNotNumbers { line }),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;
    use crate::reporter::NoopReporter;
    use crate::resolver::resolve;
    use crate::runtime::builtin::populate_builtin;
    use crate::scanner::Scanner;

    fn interpreter() -> Interpreter {
        let globals = Environment::new_global();
        populate_builtin(&globals);
        Interpreter::new_with_global(globals, Box::new(std::io::sink()))
    }

    fn run(interpreter: &mut Interpreter, code: &str) -> Result<(), RuntimeError> {
        let tokens = Scanner::new(code).scan_tokens(&mut NoopReporter {});
        let program = parse(&mut NoopReporter {}, &tokens).unwrap();
        let locals = resolve(&mut NoopReporter {}, &program).unwrap();
        interpreter.resolve(locals);
        interpreter.interpret(&program)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            Ok(Value::Number(7.0)),
            binary(BinaryOp::Add, Value::Number(1.0), Value::Number(6.0), 1)
        );
        assert_eq!(
            Ok(Value::Bool(true)),
            binary(BinaryOp::LessThanEqual, Value::Number(2.0), Value::Number(2.0), 1)
        );
        assert_eq!(
            Ok(Value::Number(f64::INFINITY)),
            binary(BinaryOp::Divide, Value::Number(1.0), Value::Number(0.0), 1)
        );
        assert_eq!(
            Err(RuntimeError::OperandsNotNumbers { line: 4 }),
            binary(BinaryOp::Multiply, Value::Number(1.0), Value::Nil, 4)
        );
    }

    #[test]
    fn frame_is_restored_after_error_in_block() {
        let mut interpreter = interpreter();
        let result = run(&mut interpreter, "var a = 1; { var b = 2; { print b + nil; } }");
        assert_eq!(Err(RuntimeError::OperandsNotNumbersOrStrings { line: 1 }), result);
        assert!(interpreter.in_global_scope());
        assert_eq!(Some(Value::Number(1.0)), interpreter.globals().get("a"));
        assert_eq!(None, interpreter.globals().get("b"));
    }

    #[test]
    fn frame_is_restored_after_return_from_nested_block() {
        let mut interpreter = interpreter();
        run(
            &mut interpreter,
            "fun f() { { { return 1; } } } var r = f();",
        )
        .unwrap();
        assert!(interpreter.in_global_scope());
        assert_eq!(Some(Value::Number(1.0)), interpreter.globals().get("r"));
    }

    #[test]
    fn interpret_one_returns_expression_values() {
        let mut interpreter = interpreter();
        let tokens = Scanner::new("1 + 2;").scan_tokens(&mut NoopReporter {});
        let program = parse(&mut NoopReporter {}, &tokens).unwrap();
        assert_eq!(
            Ok(Some(Value::Number(3.0))),
            interpreter.interpret_one(&program.0[0])
        );
    }
}
