use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::Stmt;
use crate::error::Diagnostic;
use crate::parser::parse;
use crate::reporter::CollectingReporter;
use crate::resolver::resolve;
use crate::runtime::{stock_interpreter, Interpreter, Value};
use crate::scanner::Scanner;

/// What a single run produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Every error in the order it was reported
    pub diagnostics: Vec<Diagnostic>,
    pub had_static_error: bool,
    pub had_runtime_error: bool,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        !self.had_static_error && !self.had_runtime_error
    }
}

/// A session: one interpreter whose globals persist across every run
pub struct Lox {
    interpreter: Interpreter,
}

impl Default for Lox {
    fn default() -> Self {
        Lox::new()
    }
}

impl Lox {
    /// A session printing to stdout
    pub fn new() -> Lox {
        Lox::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Lox {
        Lox {
            interpreter: stock_interpreter(output),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Scan, parse, resolve and run a whole source text
    /// Static errors from any stage stop the run before anything executes
    pub fn run(&mut self, source: &str) -> RunOutcome {
        self.run_with(source, false)
    }

    /// Like run, except that a lone expression statement has its value printed
    pub fn run_prompt_line(&mut self, source: &str) -> RunOutcome {
        self.run_with(source, true)
    }

    fn run_with(&mut self, source: &str, echo_expression: bool) -> RunOutcome {
        let mut reporter = CollectingReporter::default();
        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        let parsed = parse(&mut reporter, &tokens);
        let program = match parsed {
            Ok(program) if reporter.errors.is_empty() => program,
            _ => return static_failure(reporter),
        };
        let Ok(locals) = resolve(&mut reporter, &program) else {
            return static_failure(reporter);
        };
        self.interpreter.resolve(locals);

        let result = match program.0.as_slice() {
            [stmt @ Stmt::Expr(_)] if echo_expression => {
                match self.interpreter.interpret_one(stmt) {
                    Ok(Some(value)) if value != Value::Nil => {
                        self.interpreter.print(&value);
                        Ok(())
                    }
                    Ok(_) => Ok(()),
                    Err(error) => Err(error),
                }
            }
            _ => self.interpreter.interpret(&program),
        };
        match result {
            Ok(()) => RunOutcome::default(),
            Err(error) => RunOutcome {
                diagnostics: vec![error.into()],
                had_static_error: false,
                had_runtime_error: true,
            },
        }
    }
}

fn static_failure(reporter: CollectingReporter) -> RunOutcome {
    RunOutcome {
        diagnostics: reporter.errors.into_iter().map(Diagnostic::from).collect(),
        had_static_error: true,
        had_runtime_error: false,
    }
}

/// A cloneable in-memory output sink, handy for capturing what a program prints
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
