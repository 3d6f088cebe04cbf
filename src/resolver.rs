use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{Expr, ExprId, ExprInner, FunDecl, Ident, Program, Stmt};
use crate::error::{Location, StaticError};
use crate::reporter::{Reporter, StateTrackingReporter};
use crate::stack::ensure_sufficient_stack;

/// How many scopes upwards each resolved variable reference lives
/// Anything missing is a global and gets looked up by name
pub type Locals = HashMap<ExprId, usize>;

#[derive(Error, Debug)]
#[error("resolve error")]
pub struct Error {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
}

// false means declared but not yet defined
type Scope = HashMap<String, bool>;

struct Resolver<'r, R: ?Sized> {
    reporter: &'r mut R,
    scopes: Vec<Scope>,
    locals: Locals,
    current_function: FunctionKind,
}

/// Compute the scope distance of every local variable reference in the program
/// All errors are reported before returning, Err means at least one was
pub fn resolve<R>(reporter: &mut R, program: &Program) -> Result<Locals, Error>
where
    R: Reporter + ?Sized,
{
    let mut reporter = StateTrackingReporter::new(reporter);
    let mut resolver = Resolver {
        reporter: &mut reporter,
        scopes: Vec::new(),
        locals: Locals::new(),
        current_function: FunctionKind::None,
    };
    resolver.resolve_stmts(&program.0);
    let locals = resolver.locals;
    if reporter.errored() {
        Err(Error {})
    } else {
        tracing::debug!(locals = locals.len(), "resolved program");
        Ok(locals)
    }
}

impl<'r, R> Resolver<'r, R>
where
    R: Reporter + ?Sized,
{
    fn error(&mut self, line: usize, lexeme: &str, message: &str) {
        self.reporter.report(&StaticError::new(
            line,
            Location::At(lexeme.to_string()),
            message,
        ));
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        ensure_sufficient_stack(|| self.resolve_stmt_inner(stmt))
    }

    fn resolve_stmt_inner(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { name, init } => {
                self.declare(name);
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::FunDecl(decl) => {
                // Defined before the body is resolved so the function can call itself
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionKind::Function);
            }
            Stmt::Expr(expr) | Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Block(stmts) => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_scope();
            }
            Stmt::If {
                expr,
                then,
                or_else,
            } => {
                self.resolve_expr(expr);
                self.resolve_stmt(then);
                if let Some(or_else) = or_else {
                    self.resolve_stmt(or_else);
                }
            }
            Stmt::Loop { expr, body } => {
                self.resolve_expr(expr);
                self.resolve_stmt(body);
            }
            Stmt::Return {
                keyword_line,
                value,
            } => {
                if self.current_function == FunctionKind::None {
                    self.error(*keyword_line, "return", "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| self.resolve_expr_inner(expr))
    }

    fn resolve_expr_inner(&mut self, expr: &Expr) {
        match &expr.inner {
            ExprInner::Variable { name } => {
                let in_own_initializer = matches!(
                    self.scopes.last().and_then(|scope| scope.get(name)),
                    Some(false)
                );
                if in_own_initializer {
                    self.error(
                        expr.line,
                        name,
                        "Can't read local variable in its own initializer.",
                    );
                }
                self.resolve_local(expr.id, name);
            }
            ExprInner::Assignment { target, expr: value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, target);
            }
            ExprInner::Binary { left, right, .. } | ExprInner::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprInner::Unary { expr, .. } | ExprInner::Group(expr) => self.resolve_expr(expr),
            ExprInner::Call { callee, arguments } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            ExprInner::Literal(_) => {}
        }
    }

    fn resolve_function(&mut self, decl: &FunDecl, kind: FunctionKind) {
        let enclosing_function = self.current_function;
        self.current_function = kind;
        // Parameters and body share one scope, matching the single frame a call creates
        self.begin_scope();
        for parameter in decl.parameters.iter() {
            self.declare(parameter);
            self.define(parameter);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn resolve_local(&mut self, id: ExprId, name: &str) {
        // Innermost scope first, the first hit decides the distance
        if let Some(distance) = self
            .scopes
            .iter()
            .rev()
            .position(|scope| scope.contains_key(name))
        {
            self.locals.insert(id, distance);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Ident) {
        let Some(scope) = self.scopes.last_mut() else {
            // Globals may be redeclared freely
            return;
        };
        if scope.contains_key(&name.name) {
            self.error(
                name.line,
                &name.name,
                "Already a variable with this name in this scope.",
            );
            return;
        }
        scope.insert(name.name.clone(), false);
    }

    fn define(&mut self, name: &Ident) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.name.clone(), true);
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;
    use crate::reporter::CollectingReporter;
    use crate::scanner::Scanner;

    fn resolve_code(code: &str) -> (Program, Result<Locals, Error>, Vec<String>) {
        let mut reporter = CollectingReporter::default();
        let tokens = Scanner::new(code).scan_tokens(&mut reporter);
        let program = parse(&mut reporter, &tokens).unwrap();
        let locals = resolve(&mut reporter, &program);
        let messages = reporter.errors.iter().map(|e| e.to_string()).collect();
        (program, locals, messages)
    }

    fn var_id(expr: &Expr) -> ExprId {
        match &expr.inner {
            ExprInner::Variable { .. } => expr.id,
            other => panic!("expected a variable, got {:?}", other),
        }
    }

    #[test]
    fn globals_are_not_recorded() {
        let (_, locals, errors) = resolve_code("var a = 1; print a; a = 2;");
        assert!(errors.is_empty());
        assert!(locals.unwrap().is_empty());
    }

    #[test]
    fn distances_count_scopes_outwards() {
        let (program, locals, _) = resolve_code("{ var a = 1; { print a; } }");
        let locals = locals.unwrap();
        let Stmt::Block(outer) = &program.0[0] else {
            panic!("expected a block")
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected a block")
        };
        let Stmt::Print(expr) = &inner[0] else {
            panic!("expected print")
        };
        assert_eq!(Some(&1), locals.get(&var_id(expr)));
    }

    #[test]
    fn identical_references_resolve_independently() {
        let (program, locals, _) = resolve_code("var a = 0; { print a; var a = 1; print a; }");
        let locals = locals.unwrap();
        let Stmt::Block(stmts) = &program.0[1] else {
            panic!("expected a block")
        };
        let (Stmt::Print(first), Stmt::Print(second)) = (&stmts[0], &stmts[2]) else {
            panic!("expected prints")
        };
        assert_eq!(None, locals.get(&var_id(first)));
        assert_eq!(Some(&0), locals.get(&var_id(second)));
    }

    #[test]
    fn own_initializer_is_an_error() {
        let (_, locals, errors) = resolve_code("var a = 1; { var a = a; }");
        assert!(locals.is_err());
        assert_eq!(
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."],
            errors
        );
    }

    #[test]
    fn global_self_initializer_is_allowed() {
        let (_, locals, _) = resolve_code("var a = 1; var a = a;");
        assert!(locals.is_ok());
    }

    #[test]
    fn duplicate_local_is_an_error_but_shadowing_is_not() {
        let (_, locals, errors) = resolve_code("{ var a = 1; { var a = 2; } var a = 3; }");
        assert!(locals.is_err());
        assert_eq!(
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."],
            errors
        );
    }

    #[test]
    fn duplicate_parameter_is_an_error() {
        let (_, _, errors) = resolve_code("fun f(a, a) {}");
        assert_eq!(1, errors.len());
    }

    #[test]
    fn all_errors_are_collected() {
        let (_, _, errors) = resolve_code("return 1;\n{ var b = b; }\n{ var c; var c; }");
        assert_eq!(
            vec![
                "[line 1] Error at 'return': Can't return from top-level code.",
                "[line 2] Error at 'b': Can't read local variable in its own initializer.",
                "[line 3] Error at 'c': Already a variable with this name in this scope.",
            ],
            errors
        );
    }

    #[test]
    fn recursive_function_sees_itself() {
        let (_, locals, errors) =
            resolve_code("{ fun count(n) { if (n > 0) count(n - 1); } count(3); }");
        assert!(errors.is_empty());
        // n twice inside the body, count inside the body and count in the block
        assert_eq!(4, locals.unwrap().len());
    }
}
