use std::rc::Rc;

use thiserror::Error;

use crate::ast::*;
use crate::error::StaticError;
use crate::reporter::{NoopReporter, Reporter, StateTrackingReporter};
use crate::scanner::{Keyword, Symbol, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;

// Public error type that is returned from the API
// The details have already gone through the reporter
#[derive(Error, Debug)]
#[error("parse error")]
pub struct Error {}

// For unwinding, we don't actually care that much about the internal cause which is reported through the reporter
#[derive(Error, Debug)]
#[error("internal parse error")]
struct ParsePanic {}

const MAX_ARGUMENTS: usize = 255;

/// Cursor over the scanned tokens
/// The scanner always terminates the stream with Eof and the cursor never moves past it
struct TokenStream<'t, 'code> {
    tokens: &'t [Token<'code>],
    current: usize,
}

impl<'t, 'code> TokenStream<'t, 'code> {
    fn peek(&self) -> &'t Token<'code> {
        let tokens: &'t [Token<'code>] = self.tokens;
        &tokens[self.current.min(tokens.len() - 1)]
    }

    fn next(&mut self) -> &'t Token<'code> {
        let token = self.peek();
        if !self.is_at_eof() {
            self.current += 1;
        }
        token
    }

    fn next_if<F>(&mut self, predicate: F) -> Option<&'t Token<'code>>
    where
        F: FnOnce(&TokenKind) -> bool,
    {
        if predicate(&self.peek().kind) {
            Some(self.next())
        } else {
            None
        }
    }

    fn next_if_some<F, T>(&mut self, mapping: F) -> Option<(T, &'t Token<'code>)>
    where
        F: FnOnce(&TokenKind) -> Option<T>,
    {
        let mapped = mapping(&self.peek().kind)?;
        Some((mapped, self.next()))
    }

    fn is_at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
}

fn error_at<R>(reporter: &mut R, token: &Token, message: &str) -> ParsePanic
where
    R: Reporter + ?Sized,
{
    reporter.report(&StaticError::new(token.line(), token.location(), message));
    ParsePanic {}
}

/// Parse a whole token stream into a program
/// Every syntax error is reported, parsing resumes at the next statement boundary, and Err is returned if anything
/// was reported
pub fn parse<R>(reporter: &mut R, tokens: &[Token]) -> Result<Program, Error>
where
    R: Reporter + ?Sized,
{
    if tokens.is_empty() {
        return Ok(Program(Vec::new()));
    }
    let mut reporter = StateTrackingReporter::new(reporter);
    let mut stream = TokenStream { tokens, current: 0 };
    let program = program(&mut reporter, &mut stream);
    if reporter.errored() {
        Err(Error {})
    } else {
        tracing::debug!(statements = program.0.len(), "parsed program");
        Ok(program)
    }
}

fn program<R>(reporter: &mut R, tokens: &mut TokenStream) -> Program
where
    R: Reporter + ?Sized,
{
    let mut stmts = Vec::<Stmt>::new();
    while !tokens.is_at_eof() {
        if let Some(stmt) = recovering_declaration(reporter, tokens) {
            stmts.push(stmt);
        }
    }
    Program(stmts)
}

// A declaration that failed to parse is dropped and the stream is moved to the next statement boundary
fn recovering_declaration<R>(reporter: &mut R, tokens: &mut TokenStream) -> Option<Stmt>
where
    R: Reporter + ?Sized,
{
    let start = tokens.current;
    match declaration(reporter, tokens) {
        Ok(stmt) => Some(stmt),
        Err(_) => {
            // Always make progress, otherwise a keyword we can't parse would stop us in place forever
            if tokens.current == start {
                tokens.next();
            }
            synchronize(tokens);
            None
        }
    }
}

const STATEMENT_START_KEYWORDS: [Keyword; 8] = [
    Keyword::Class,
    Keyword::Fun,
    Keyword::Var,
    Keyword::For,
    Keyword::If,
    Keyword::While,
    Keyword::Print,
    Keyword::Return,
];

fn synchronize(tokens: &mut TokenStream) {
    // Consume tokens until we have consumed a ';' or the next token starts a statement
    // Avoid consuming EOF since we can abort there
    loop {
        match tokens.peek().kind {
            TokenKind::Eof => break,
            TokenKind::Symbol(Symbol::Semicolon) => {
                tokens.next();
                break;
            }
            TokenKind::Keyword(kw) if STATEMENT_START_KEYWORDS.contains(&kw) => break,
            _ => {
                tokens.next();
            }
        }
    }
}

fn declaration<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    if tokens.next_if(|kind| *kind == Keyword::Var).is_some() {
        finish_var_decl(reporter, tokens)
    } else if tokens.next_if(|kind| *kind == Keyword::Fun).is_some() {
        Ok(Stmt::FunDecl(Rc::new(finish_fun_decl(reporter, tokens)?)))
    } else {
        statement(reporter, tokens)
    }
}

fn finish_var_decl<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let name = expect_identifier(reporter, tokens, "Expect variable name.")?;
    let init = if tokens.next_if(|kind| *kind == Symbol::Equal).is_some() {
        Some(expr(reporter, tokens)?)
    } else {
        None
    };
    expect_symbol(
        reporter,
        tokens,
        Symbol::Semicolon,
        "Expect ';' after variable declaration.",
    )?;
    Ok(Stmt::VarDecl { name, init })
}

fn finish_fun_decl<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<FunDecl, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let name = expect_identifier(reporter, tokens, "Expect function name.")?;
    expect_symbol(
        reporter,
        tokens,
        Symbol::LeftParen,
        "Expect '(' after function name.",
    )?;

    let mut parameters = Vec::new();
    if tokens.next_if(|kind| *kind == Symbol::RightParen).is_none() {
        comma_separated_identifiers(&mut parameters, reporter, tokens)?;
        expect_symbol(
            reporter,
            tokens,
            Symbol::RightParen,
            "Expect ')' after parameters.",
        )?;
    }
    expect_symbol(
        reporter,
        tokens,
        Symbol::LeftBrace,
        "Expect '{' before function body.",
    )?;
    let body = finish_block(reporter, tokens)?;
    Ok(FunDecl {
        name,
        parameters,
        body,
    })
}

// Nested blocks and branches recurse through here
fn statement<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    ensure_sufficient_stack(|| single_statement(reporter, tokens))
}

fn single_statement<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    if tokens.next_if(|kind| *kind == Keyword::If).is_some() {
        if_stmt(reporter, tokens)
    } else if tokens.next_if(|kind| *kind == Keyword::While).is_some() {
        while_stmt(reporter, tokens)
    } else if tokens.next_if(|kind| *kind == Keyword::For).is_some() {
        for_stmt(reporter, tokens)
    } else if tokens.next_if(|kind| *kind == Keyword::Print).is_some() {
        print_stmt(reporter, tokens)
    } else if let Some(keyword) = tokens.next_if(|kind| *kind == Keyword::Return) {
        let value = if tokens.next_if(|kind| *kind == Symbol::Semicolon).is_some() {
            None
        } else {
            let value = expr(reporter, tokens)?;
            expect_symbol(
                reporter,
                tokens,
                Symbol::Semicolon,
                "Expect ';' after return value.",
            )?;
            Some(value)
        };
        Ok(Stmt::Return {
            keyword_line: keyword.line(),
            value,
        })
    } else if tokens.next_if(|kind| *kind == Symbol::LeftBrace).is_some() {
        Ok(Stmt::Block(finish_block(reporter, tokens)?))
    } else {
        expr_stmt(reporter, tokens)
    }
}

// Blocks recover inside themselves so one bad statement doesn't take the rest of the block with it
fn finish_block<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Vec<Stmt>, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let mut stmts: Vec<Stmt> = Vec::new();
    while !tokens.is_at_eof() && tokens.peek().kind != Symbol::RightBrace {
        if let Some(stmt) = recovering_declaration(reporter, tokens) {
            stmts.push(stmt);
        }
    }
    expect_symbol(reporter, tokens, Symbol::RightBrace, "Expect '}' after block.")?;
    Ok(stmts)
}

fn if_stmt<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    expect_symbol(reporter, tokens, Symbol::LeftParen, "Expect '(' after 'if'.")?;
    let test_expr = expr(reporter, tokens)?;
    expect_symbol(
        reporter,
        tokens,
        Symbol::RightParen,
        "Expect ')' after if condition.",
    )?;
    let then_branch = Box::new(statement(reporter, tokens)?);
    // Checking for else right after the then branch binds it to the nearest if
    let else_branch = if tokens.next_if(|kind| *kind == Keyword::Else).is_some() {
        Some(Box::new(statement(reporter, tokens)?))
    } else {
        None
    };
    Ok(Stmt::If {
        expr: test_expr,
        then: then_branch,
        or_else: else_branch,
    })
}

fn while_stmt<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    expect_symbol(
        reporter,
        tokens,
        Symbol::LeftParen,
        "Expect '(' after 'while'.",
    )?;
    let expr = expr(reporter, tokens)?;
    expect_symbol(
        reporter,
        tokens,
        Symbol::RightParen,
        "Expect ')' after condition.",
    )?;
    let body = Box::new(statement(reporter, tokens)?);
    Ok(Stmt::Loop { expr, body })
}

fn for_stmt<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let for_line = tokens.peek().line();
    expect_symbol(reporter, tokens, Symbol::LeftParen, "Expect '(' after 'for'.")?;
    let initializer = if tokens.next_if(|kind| *kind == Symbol::Semicolon).is_some() {
        None
    } else if tokens.next_if(|kind| *kind == Keyword::Var).is_some() {
        Some(finish_var_decl(reporter, tokens)?)
    } else {
        Some(expr_stmt(reporter, tokens)?)
    };

    let condition = if tokens.peek().kind == Symbol::Semicolon {
        Expr::new(for_line, ExprInner::Literal(Literal::Boolean(true)))
    } else {
        expr(reporter, tokens)?
    };
    expect_symbol(
        reporter,
        tokens,
        Symbol::Semicolon,
        "Expect ';' after loop condition.",
    )?;

    let incr = if tokens.peek().kind == Symbol::RightParen {
        None
    } else {
        Some(Stmt::Expr(expr(reporter, tokens)?))
    };
    expect_symbol(
        reporter,
        tokens,
        Symbol::RightParen,
        "Expect ')' after for clauses.",
    )?;

    let mut body = statement(reporter, tokens)?;
    if let Some(incr) = incr {
        body = Stmt::Block(vec![body, incr]);
    }

    let for_loop = Stmt::Loop {
        expr: condition,
        body: Box::new(body),
    };

    if let Some(init) = initializer {
        Ok(Stmt::Block(vec![init, for_loop]))
    } else {
        Ok(for_loop)
    }
}

fn print_stmt<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let expr = expr(reporter, tokens)?;
    expect_symbol(reporter, tokens, Symbol::Semicolon, "Expect ';' after value.")?;
    Ok(Stmt::Print(expr))
}

fn expr_stmt<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Stmt, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let expr = expr(reporter, tokens)?;
    expect_symbol(
        reporter,
        tokens,
        Symbol::Semicolon,
        "Expect ';' after expression.",
    )?;
    Ok(Stmt::Expr(expr))
}

fn expr<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    ensure_sufficient_stack(|| assignment(reporter, tokens))
}

fn assignment<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let expr = logical_or(reporter, tokens)?;
    if let Some(eq) = tokens.next_if(|kind| *kind == Symbol::Equal) {
        // Right associative: a = b = c is a = (b = c)
        let value = Box::new(assignment(reporter, tokens)?);
        match expr.inner {
            // A valid assignment target
            ExprInner::Variable { name } => Ok(Expr::new(
                expr.line,
                ExprInner::Assignment {
                    target: name,
                    expr: value,
                },
            )),
            // Not a valid assignment target
            // Report the error to trigger top level error, but don't error out here so we continue parsing
            _ => {
                error_at(reporter, eq, "Invalid assignment target.");
                Ok(*value)
            }
        }
    } else {
        Ok(expr)
    }
}

// This encapsualtes the logic of the recursive parsing of levels of binary expression operators
// We define a set of matching symbols along with the operator each one produces as well as a high precendence parser
const EQUALITY_SYMBOLS: [(Symbol, BinaryOp); 2] = [
    (Symbol::EqualEqual, BinaryOp::Equal),
    (Symbol::BangEqual, BinaryOp::NotEqual),
];

const COMPARISON_SYMBOLS: [(Symbol, BinaryOp); 4] = [
    (Symbol::Greater, BinaryOp::GreaterThan),
    (Symbol::GreaterEqual, BinaryOp::GreaterThanEqual),
    (Symbol::Less, BinaryOp::LessThan),
    (Symbol::LessEqual, BinaryOp::LessThanEqual),
];

const TERM_SYMBOLS: [(Symbol, BinaryOp); 2] = [
    (Symbol::Minus, BinaryOp::Subtract),
    (Symbol::Plus, BinaryOp::Add),
];

const FACTOR_SYMBOLS: [(Symbol, BinaryOp); 2] = [
    (Symbol::Star, BinaryOp::Multiply),
    (Symbol::Slash, BinaryOp::Divide),
];

const UNARY_SYMBOLS: [(Symbol, UnaryOp); 2] =
    [(Symbol::Minus, UnaryOp::Negative), (Symbol::Bang, UnaryOp::Not)];

// Binary symbols that can't start an expression, used to give a better error when the left operand is missing
// Minus is absent since it is also unary
const BINARY_ONLY_SYMBOLS: [Symbol; 9] = [
    Symbol::EqualEqual,
    Symbol::BangEqual,
    Symbol::Greater,
    Symbol::GreaterEqual,
    Symbol::Less,
    Symbol::LessEqual,
    Symbol::Plus,
    Symbol::Star,
    Symbol::Slash,
];

fn logical_or<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    left_recursive_logical_op(reporter, tokens, (Keyword::Or, LogicalOp::Or), logical_and)
}

fn logical_and<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    left_recursive_logical_op(reporter, tokens, (Keyword::And, LogicalOp::And), equality)
}

fn equality<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    left_recursive_binary_op(reporter, tokens, &EQUALITY_SYMBOLS, comparison)
}

fn comparison<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    left_recursive_binary_op(reporter, tokens, &COMPARISON_SYMBOLS, term)
}

fn term<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    left_recursive_binary_op(reporter, tokens, &TERM_SYMBOLS, factor)
}

fn factor<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    left_recursive_binary_op(reporter, tokens, &FACTOR_SYMBOLS, unary)
}

fn unary<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    if let Some((op, token)) = tokens.next_if_some(|kind| lookup_symbol(kind, &UNARY_SYMBOLS)) {
        let right = Box::new(ensure_sufficient_stack(|| unary(reporter, tokens))?);
        Ok(Expr::new(token.line(), ExprInner::Unary { op, expr: right }))
    } else {
        call(reporter, tokens)
    }
}

fn call<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let mut expr = primary(reporter, tokens)?;
    while tokens.next_if(|kind| *kind == Symbol::LeftParen).is_some() {
        expr = finish_call(reporter, tokens, expr)?;
    }
    Ok(expr)
}

fn finish_call<R>(reporter: &mut R, tokens: &mut TokenStream, callee: Expr) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    let mut args = Vec::new();
    if tokens.peek().kind != Symbol::RightParen {
        loop {
            if args.len() >= MAX_ARGUMENTS {
                // Reported but not fatal, the call is still well formed
                error_at(reporter, tokens.peek(), "Can't have more than 255 arguments.");
            }
            args.push(expr(reporter, tokens)?);
            if tokens.next_if(|kind| *kind == Symbol::Comma).is_none() {
                break;
            }
        }
    }
    let paren = expect_symbol(
        reporter,
        tokens,
        Symbol::RightParen,
        "Expect ')' after arguments.",
    )?;
    Ok(Expr::new(
        paren.line(),
        ExprInner::Call {
            callee: Box::new(callee),
            arguments: args,
        },
    ))
}

fn primary<R>(reporter: &mut R, tokens: &mut TokenStream) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
{
    // Only consume once we know the token is usable so that recovery starts from the offending token
    let token = tokens.peek();
    let inner = match &token.kind {
        TokenKind::Keyword(Keyword::True) => ExprInner::Literal(Literal::Boolean(true)),
        TokenKind::Keyword(Keyword::False) => ExprInner::Literal(Literal::Boolean(false)),
        TokenKind::Keyword(Keyword::Nil) => ExprInner::Literal(Literal::Nil),
        TokenKind::String | TokenKind::Number => match &token.literal {
            Some(literal) => ExprInner::Literal(literal.clone()),
            None => return Err(error_at(reporter, token, "Expect expression.")),
        },
        TokenKind::Identifier => ExprInner::Variable {
            name: token.lexeme.to_string(),
        },
        TokenKind::Symbol(Symbol::LeftParen) => {
            tokens.next();
            let inner = expr(reporter, tokens)?;
            expect_symbol(
                reporter,
                tokens,
                Symbol::RightParen,
                "Expect ')' after expression.",
            )?;
            return Ok(Expr::new(token.line(), ExprInner::Group(Box::new(inner))));
        }
        // An unexpected binary symbol so lets try and parse the rhs before raising the error
        TokenKind::Symbol(symbol) if BINARY_ONLY_SYMBOLS.contains(symbol) => {
            let panic = error_at(reporter, token, "Expect left-hand operand.");
            tokens.next();
            // Result is unimportant, we are bailing anyway; only the missing operand gets reported
            let _rhs = comparison(&mut NoopReporter {}, tokens);
            return Err(panic);
        }
        _ => return Err(error_at(reporter, token, "Expect expression.")),
    };
    tokens.next();
    Ok(Expr::new(token.line(), inner))
}

fn lookup_symbol<T: Copy>(kind: &TokenKind, table: &[(Symbol, T)]) -> Option<T> {
    match kind {
        TokenKind::Symbol(symbol) => table
            .iter()
            .find(|(candidate, _)| candidate == symbol)
            .map(|(_, op)| *op),
        _ => None,
    }
}

// It occurs to me it might be possible to do this a single recursive call that unfolds generically
// instead of encoding the recursion in separate helpers
fn left_recursive_binary_op<'t, 'code, R, F>(
    reporter: &mut R,
    tokens: &mut TokenStream<'t, 'code>,
    symbols: &[(Symbol, BinaryOp)],
    higher_precedence: F,
) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
    F: Fn(&mut R, &mut TokenStream<'t, 'code>) -> Result<Expr, ParsePanic>,
{
    let mut expr = higher_precedence(reporter, tokens)?;
    while let Some((op, token)) = tokens.next_if_some(|kind| lookup_symbol(kind, symbols)) {
        let right = Box::new(higher_precedence(reporter, tokens)?);
        expr = Expr::new(
            token.line(),
            ExprInner::Binary {
                left: Box::new(expr),
                op,
                right,
            },
        );
    }
    Ok(expr)
}

fn left_recursive_logical_op<'t, 'code, R, F>(
    reporter: &mut R,
    tokens: &mut TokenStream<'t, 'code>,
    (keyword, op): (Keyword, LogicalOp),
    higher_precedence: F,
) -> Result<Expr, ParsePanic>
where
    R: Reporter + ?Sized,
    F: Fn(&mut R, &mut TokenStream<'t, 'code>) -> Result<Expr, ParsePanic>,
{
    let mut expr = higher_precedence(reporter, tokens)?;
    while let Some(token) = tokens.next_if(|kind| *kind == keyword) {
        let right = Box::new(higher_precedence(reporter, tokens)?);
        expr = Expr::new(
            token.line(),
            ExprInner::Logical {
                left: Box::new(expr),
                op,
                right,
            },
        );
    }
    Ok(expr)
}

/// Expect that the next token is the given symbol, consuming it only if it matches
fn expect_symbol<'t, 'code, R>(
    reporter: &mut R,
    tokens: &mut TokenStream<'t, 'code>,
    symbol: Symbol,
    message: &str,
) -> Result<&'t Token<'code>, ParsePanic>
where
    R: Reporter + ?Sized,
{
    match tokens.next_if(|kind| *kind == symbol) {
        Some(token) => Ok(token),
        None => Err(error_at(reporter, tokens.peek(), message)),
    }
}

fn expect_identifier<R>(
    reporter: &mut R,
    tokens: &mut TokenStream,
    message: &str,
) -> Result<Ident, ParsePanic>
where
    R: Reporter + ?Sized,
{
    match tokens.next_if(|kind| *kind == TokenKind::Identifier) {
        Some(token) => Ok(Ident {
            name: token.lexeme.to_string(),
            line: token.line(),
        }),
        None => Err(error_at(reporter, tokens.peek(), message)),
    }
}

fn comma_separated_identifiers<R>(
    idents: &mut Vec<Ident>,
    reporter: &mut R,
    tokens: &mut TokenStream,
) -> Result<(), ParsePanic>
where
    R: Reporter + ?Sized,
{
    idents.push(expect_identifier(reporter, tokens, "Expect parameter name.")?);
    while tokens.next_if(|kind| *kind == Symbol::Comma).is_some() {
        if idents.len() >= MAX_ARGUMENTS {
            error_at(reporter, tokens.peek(), "Can't have more than 255 parameters.");
        }
        idents.push(expect_identifier(reporter, tokens, "Expect parameter name.")?);
    }

    Ok(())
}
