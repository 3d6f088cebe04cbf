use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::CharIndices;

use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::ast::Literal;
use crate::error::{Location, StaticError};
use crate::reporter::Reporter;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Pos {
    pub offset_in_line: usize,
    pub line: usize,
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.offset_in_line)
    }
}

#[derive(Clone, Error, Debug, PartialEq, Eq)]
#[error("scan error: {} {pos}", .error.message())]
pub struct ScanError {
    pub error: ScanErrorType,
    pub pos: Pos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanErrorType {
    UnterminatedString,
    UnexpectedCharacter,
}

impl ScanErrorType {
    pub fn message(&self) -> &'static str {
        match self {
            ScanErrorType::UnterminatedString => "Unterminated string.",
            ScanErrorType::UnexpectedCharacter => "Unexpected character.",
        }
    }
}

impl From<ScanError> for StaticError {
    fn from(err: ScanError) -> StaticError {
        StaticError::new(err.pos.line, Location::None, err.error.message())
    }
}

/// A token in the input stream
/// Note that pos is always defined, but in the case of EOF will describe a location
/// Potentially off the end of the input stream
#[derive(Debug, PartialEq, Clone)]
pub struct Token<'code> {
    pub kind: TokenKind,
    pub lexeme: &'code str,
    pub literal: Option<Literal>,
    pub pos: Pos,
}

impl<'code> Token<'code> {
    pub fn line(&self) -> usize {
        self.pos.line
    }

    /// Where a diagnostic raised at this token points
    pub fn location(&self) -> Location {
        match self.kind {
            TokenKind::Eof => Location::End,
            _ => Location::At(self.lexeme.to_string()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Symbol(Symbol),
    Keyword(Keyword),
    Identifier,
    String,
    Number,
    Eof,
}

impl PartialEq<Symbol> for TokenKind {
    fn eq(&self, other: &Symbol) -> bool {
        matches!(self, TokenKind::Symbol(symbol) if symbol == other)
    }
}

impl PartialEq<Keyword> for TokenKind {
    fn eq(&self, other: &Keyword) -> bool {
        matches!(self, TokenKind::Keyword(keyword) if keyword == other)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(sym) => sym.fmt(f),
            Self::Keyword(kw) => kw.fmt(f),
            Self::Identifier => f.write_str("identifier"),
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Symbol {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,
}

const KEYWORD_LITERAL_TO_SYMBOL: [(&str, Keyword); 16] = [
    ("and", Keyword::And),
    ("class", Keyword::Class),
    ("else", Keyword::Else),
    ("false", Keyword::False),
    ("fun", Keyword::Fun),
    ("for", Keyword::For),
    ("if", Keyword::If),
    ("nil", Keyword::Nil),
    ("or", Keyword::Or),
    ("print", Keyword::Print),
    ("return", Keyword::Return),
    ("super", Keyword::Super),
    ("this", Keyword::This),
    ("true", Keyword::True),
    ("var", Keyword::Var),
    ("while", Keyword::While),
];

impl Display for Keyword {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic()
}

fn is_identifier_continue(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

const WS_CHARS: &str = " \r\t";

#[derive(Clone)]
pub struct Scanner<'lex> {
    code: &'lex str,
    code_iter: Peekable<CharIndices<'lex>>,
    emitted_eof: bool, // Have we sent the EOF yet

    line: usize,
    offset_in_line: usize,
}

impl<'lex> Scanner<'lex> {
    pub fn new(code: &'lex str) -> Scanner<'lex> {
        Scanner {
            code,
            code_iter: code.char_indices().peekable(),
            emitted_eof: false,
            line: 1,
            offset_in_line: 0,
        }
    }

    /// Scan the whole input, reporting every scan error and keeping every good token
    /// The result always ends with an Eof token
    pub fn scan_tokens<R>(self, reporter: &mut R) -> Vec<Token<'lex>>
    where
        R: Reporter + ?Sized,
    {
        let mut tokens = Vec::new();
        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(err) => reporter.report(&err.into()),
            }
        }
        tracing::debug!(count = tokens.len(), "scanned tokens");
        tokens
    }

    fn current_pos(&self) -> Pos {
        Pos {
            line: self.line,
            offset_in_line: self.offset_in_line,
        }
    }

    // Byte offset of the next unconsumed char
    fn next_offset(&mut self) -> usize {
        match self.code_iter.peek() {
            Some((offset, _)) => *offset,
            None => self.code.len(),
        }
    }

    fn consume_next_char_if_eq(&mut self, next_ch: char) -> bool {
        self.code_iter.next_if(|(_, ch)| *ch == next_ch).is_some()
    }

    fn consume_next_char_if_neq(&mut self, not_next_ch: char) -> bool {
        self.code_iter
            .next_if(|(_, ch)| *ch != not_next_ch)
            .is_some()
    }

    fn consume_next_char_if_match<F>(&mut self, predicate: F) -> bool
    where
        F: FnOnce(char) -> bool,
    {
        self.code_iter.next_if(|(_, ch)| predicate(*ch)).is_some()
    }

    // One char of lookahead past the peeked char; needed to decide whether a '.' starts a fraction
    fn second_char_matches<F>(&self, predicate: F) -> bool
    where
        F: FnOnce(char) -> bool,
    {
        let mut lookahead = self.code_iter.clone();
        lookahead.next();
        lookahead.next().map(|(_, ch)| predicate(ch)).unwrap_or(false)
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize, pos: Pos) -> Token<'lex> {
        Token {
            kind,
            lexeme: &self.code[start..end],
            literal: None,
            pos,
        }
    }

    fn symbol(&mut self, symbol: Symbol, offset: usize, pos: Pos) -> Token<'lex> {
        let end = self.next_offset();
        self.offset_in_line += end - offset;
        self.token(TokenKind::Symbol(symbol), offset, end, pos)
    }

    // Pick the two char symbol if the next char is '=', otherwise the single char one
    fn symbol_with_equal(
        &mut self,
        single: Symbol,
        double: Symbol,
        offset: usize,
        pos: Pos,
    ) -> Token<'lex> {
        let symbol = if self.consume_next_char_if_eq('=') {
            double
        } else {
            single
        };
        self.symbol(symbol, offset, pos)
    }

    fn number(&mut self, offset: usize, pos: Pos) -> Token<'lex> {
        while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {}
        if self.code_iter.peek().map(|(_, ch)| *ch) == Some('.')
            && self.second_char_matches(|ch| ch.is_ascii_digit())
        {
            self.code_iter.next();
            while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {}
        }
        let end = self.next_offset();
        self.offset_in_line += end - offset;
        let mut token = self.token(TokenKind::Number, offset, end, pos);
        // Only ascii digits and at most one '.' were consumed so this always parses
        let number = token.lexeme.parse::<f64>().unwrap_or(f64::NAN);
        token.literal = Some(Literal::Number(OrderedFloat(number)));
        token
    }

    fn string(&mut self, offset: usize, pos: Pos) -> Result<Token<'lex>, ScanError> {
        self.offset_in_line += 1;
        // Strings are multiline, so we need to track things like whether or not we cross a newline
        loop {
            match self.code_iter.next() {
                Some((_, '\n')) => {
                    self.offset_in_line = 0;
                    self.line += 1;
                }
                Some((close, '"')) => {
                    self.offset_in_line += 1;
                    let mut token = self.token(TokenKind::String, offset, close + 1, pos);
                    // The quotes are one byte each
                    token.literal = Some(Literal::String(self.code[offset + 1..close].to_string()));
                    return Ok(token);
                }
                Some(_) => self.offset_in_line += 1,
                // Reported where the input ran out
                None => {
                    return Err(ScanError {
                        error: ScanErrorType::UnterminatedString,
                        pos: self.current_pos(),
                    })
                }
            }
        }
    }

    fn identifier(&mut self, offset: usize, pos: Pos) -> Token<'lex> {
        while self.consume_next_char_if_match(is_identifier_continue) {}
        let end = self.next_offset();
        self.offset_in_line += end - offset;
        let identifier = &self.code[offset..end];
        let kind = match KEYWORD_LITERAL_TO_SYMBOL
            .iter()
            .find(|(lit, _)| *lit == identifier)
        {
            Some((_, kw)) => TokenKind::Keyword(*kw),
            None => TokenKind::Identifier,
        };
        self.token(kind, offset, end, pos)
    }
}

impl<'lex> Iterator for Scanner<'lex> {
    type Item = Result<Token<'lex>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Whitespace and comments loop rather than recurse so long runs of blank lines stay flat
        loop {
            let pos = self.current_pos();
            let Some((offset, ch)) = self.code_iter.next() else {
                if self.emitted_eof {
                    return None;
                }
                self.emitted_eof = true;
                return Some(Ok(self.token(TokenKind::Eof, self.code.len(), self.code.len(), pos)));
            };
            let token = match ch {
                '(' => self.symbol(Symbol::LeftParen, offset, pos),
                ')' => self.symbol(Symbol::RightParen, offset, pos),
                '{' => self.symbol(Symbol::LeftBrace, offset, pos),
                '}' => self.symbol(Symbol::RightBrace, offset, pos),
                ',' => self.symbol(Symbol::Comma, offset, pos),
                '.' => self.symbol(Symbol::Dot, offset, pos),
                '-' => self.symbol(Symbol::Minus, offset, pos),
                '+' => self.symbol(Symbol::Plus, offset, pos),
                ';' => self.symbol(Symbol::Semicolon, offset, pos),
                '*' => self.symbol(Symbol::Star, offset, pos),
                '!' => self.symbol_with_equal(Symbol::Bang, Symbol::BangEqual, offset, pos),
                '=' => self.symbol_with_equal(Symbol::Equal, Symbol::EqualEqual, offset, pos),
                '<' => self.symbol_with_equal(Symbol::Less, Symbol::LessEqual, offset, pos),
                '>' => self.symbol_with_equal(Symbol::Greater, Symbol::GreaterEqual, offset, pos),
                '/' => {
                    if self.consume_next_char_if_eq('/') {
                        // The newline is left for the whitespace arm to count
                        let mut comment_len = 2;
                        while self.consume_next_char_if_neq('\n') {
                            comment_len += 1;
                        }
                        self.offset_in_line += comment_len;
                        continue;
                    }
                    self.symbol(Symbol::Slash, offset, pos)
                }
                c if WS_CHARS.contains(c) => {
                    self.offset_in_line += 1;
                    continue;
                }
                '\n' => {
                    self.offset_in_line = 0;
                    self.line += 1;
                    continue;
                }
                '"' => return Some(self.string(offset, pos)),
                c if c.is_ascii_digit() => self.number(offset, pos),
                c if is_identifier_start(c) => self.identifier(offset, pos),
                _ => {
                    self.offset_in_line += 1;
                    return Some(Err(ScanError {
                        error: ScanErrorType::UnexpectedCharacter,
                        pos,
                    }));
                }
            };
            return Some(Ok(token));
        }
    }
}
