use std::fmt::Display;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ordered_float::OrderedFloat;

/// Identity of an expression node
/// Handed out once per node at parse time so that two identical expressions at different places in the source
/// still resolve independently. Ids are unique across every parse in the process, which lets a long lived
/// interpreter keep resolutions from earlier prompt lines alive next to later ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    pub fn fresh() -> ExprId {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct Program(pub Vec<Stmt>);

/// A name as written in the source along with where it was written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub line: usize,
}

#[derive(Debug)]
pub struct FunDecl {
    pub name: Ident,
    pub parameters: Vec<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Stmt {
    VarDecl {
        name: Ident,
        init: Option<Expr>,
    },
    // Shared so that every function value created from this declaration can point at it
    FunDecl(Rc<FunDecl>),
    Expr(Expr),
    Print(Expr),
    Block(Vec<Stmt>),
    If {
        expr: Expr,
        then: Box<Stmt>,
        or_else: Option<Box<Stmt>>,
    },
    Loop {
        expr: Expr,
        body: Box<Stmt>,
    },
    Return {
        keyword_line: usize,
        value: Option<Expr>,
    },
}

#[derive(Debug)]
pub struct Expr {
    pub id: ExprId,
    // Line of the token that runtime errors for this node should point at
    pub line: usize,
    pub inner: ExprInner,
}

impl Expr {
    pub fn new(line: usize, inner: ExprInner) -> Expr {
        Expr {
            id: ExprId::fresh(),
            line,
            inner,
        }
    }
}

#[derive(Debug)]
pub enum ExprInner {
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Group(Box<Expr>),
    Literal(Literal),
    Variable {
        name: String,
    },
    Assignment {
        target: String,
        expr: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            ExprInner::Literal(lit) => write!(f, "{}", lit),
            ExprInner::Group(expr) => write!(f, "(group {})", expr),
            ExprInner::Unary { op, expr } => write!(f, "({} {})", op, expr),
            ExprInner::Binary { left, op, right } => write!(f, "({} {} {})", op, left, right),
            ExprInner::Variable { name } => write!(f, "(ident {})", name),
            ExprInner::Assignment { target, expr } => write!(f, "(= {} {})", target, expr),
            ExprInner::Logical { left, op, right } => write!(f, "({} {} {})", op, left, right),
            ExprInner::Call { callee, arguments } => {
                write!(f, "(call {}", callee)?;
                for arg in arguments {
                    write!(f, " {}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Equal => f.write_str("=="),
            BinaryOp::NotEqual => f.write_str("!="),
            BinaryOp::LessThan => f.write_str("<"),
            BinaryOp::LessThanEqual => f.write_str("<="),
            BinaryOp::GreaterThan => f.write_str(">"),
            BinaryOp::GreaterThanEqual => f.write_str(">="),
            BinaryOp::Add => f.write_str("+"),
            BinaryOp::Subtract => f.write_str("-"),
            BinaryOp::Multiply => f.write_str("*"),
            BinaryOp::Divide => f.write_str("/"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negative,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("!"),
            UnaryOp::Negative => f.write_str("-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOp::And => f.write_str("and"),
            LogicalOp::Or => f.write_str("or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Number(OrderedFloat<f64>),
    String(String),
    Boolean(bool),
    Nil,
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(OrderedFloat(dbl)) => write!(f, "{}", dbl),
            Literal::String(s) => f.write_str(s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Nil => f.write_str("nil"),
        }
    }
}
