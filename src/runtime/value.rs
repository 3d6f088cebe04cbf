use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::ast::Literal;

use super::callable::Callable;

#[derive(Clone)]
pub enum Value {
    String(Rc<String>),
    Number(f64),
    Bool(bool),
    Callable(Rc<dyn Callable>),
    Nil,
}

impl Value {
    /// Only nil and false are falsy, 0 and "" are both truthy
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Nil => false,
            _ => true,
        }
    }

    pub fn to_callable(&self) -> Option<&dyn Callable> {
        match self {
            Self::Callable(callable) => Some(callable.as_ref()),
            _ => None,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Value {
        match literal {
            Literal::Number(number) => Value::Number(number.into_inner()),
            Literal::String(s) => Value::String(Rc::new(s.clone())),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Nil => Value::Nil,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "Value::String('{}')", s),
            Value::Number(n) => write!(f, "Value::Number({})", n),
            Value::Bool(b) => write!(f, "Value::Bool({})", b),
            Value::Nil => f.write_str("Value::Nil"),
            Value::Callable(func) => write!(f, "Value::Callable({})", func.name()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => f.write_str("nil"),
            Value::Callable(func) => write!(f, "{}", func),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Nil, Self::Nil) => true,
            // Functions are only ever equal to themselves
            (Self::Callable(left), Self::Callable(right)) => {
                Rc::as_ptr(left) as *const () == Rc::as_ptr(right) as *const ()
            }
            // All type mismatches not equal
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.to_bool());
        assert!(!Value::Bool(false).to_bool());
        assert!(Value::Bool(true).to_bool());
        assert!(Value::Number(0.0).to_bool());
        assert!(Value::String(Rc::new(String::new())).to_bool());
    }

    #[test]
    fn no_coercion_in_equality() {
        assert!(Value::Number(1.0) != Value::String(Rc::new("1".to_string())));
        assert!(Value::Nil != Value::Bool(false));
        assert!(Value::String(Rc::new("a".to_string())) == Value::String(Rc::new("a".to_string())));
    }

    #[test]
    fn rendering() {
        assert_eq!("7", Value::Number(7.0).to_string());
        assert_eq!("2.5", Value::Number(2.5).to_string());
        assert_eq!("-3", Value::Number(-3.0).to_string());
        assert_eq!("nil", Value::Nil.to_string());
        assert_eq!("true", Value::Bool(true).to_string());
        assert_eq!("abc", Value::String(Rc::new("abc".to_string())).to_string());
    }
}
