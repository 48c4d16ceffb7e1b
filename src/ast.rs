//! This module defines the value model shared by the reader, the evaluator and the
//! printer. The main enum, [`Value`], covers every datum the interpreter handles:
//! integers, strings, keywords, symbols, booleans, nil, lists, vectors, binding
//! maps and functions. Ergonomic helper functions such as [`val`], [`sym`] and
//! [`list`] are provided for convenient tree construction in code and tests, and
//! conversion traits cover the common Rust literal types.
//!
//! Equality is structural and variant-sensitive: `nil`, the empty list and
//! `false` are three different values, as are a list and a vector with the
//! same elements.

use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::evaluator::Environment;
use crate::evaluator::intooperation::OperationFn;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Core value type in interpreter
///
/// To build a tree, use the ergonomic helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `kw("name")` for keywords
/// - `val([1, 2, 3])` for homogeneous lists
/// - `list(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Fixed-width integers
    Integer(NumberType),
    /// String literals, kept verbatim
    String(String),
    /// Keywords, stored without the leading colon
    Keyword(String),
    /// Symbols (identifiers resolved through the environment)
    Symbol(String),
    Bool(bool),
    Nil,
    /// Lists are evaluated as applications unless empty
    List(Vec<Value>),
    /// Vectors are literal sequences (parameter lists)
    Vector(Vec<Value>),
    /// Ordered key/value pairs read from a brace form, consumed by `let`
    Map(Vec<(Value, Value)>),
    Function(Function),
}

/// A callable value: either a native builtin or a user closure.
#[derive(Clone)]
pub enum Function {
    /// Native function, compared by its registered name
    Builtin { id: String, func: Arc<OperationFn> },
    /// User closure, compared by identity
    Closure(Rc<Closure>),
}

/// Parameter names, body and defining environment of a user function.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Value,
    pub env: Environment,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Keyword(k) => write!(f, "Keyword(:{k})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Nil => write!(f, "Nil"),
            Value::List(items) => {
                write!(f, "List(")?;
                write_debug_seq(f, items)?;
                write!(f, ")")
            }
            Value::Vector(items) => {
                write!(f, "Vector(")?;
                write_debug_seq(f, items)?;
                write!(f, ")")
            }
            Value::Map(pairs) => {
                write!(f, "Map(")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?} => {v:?}")?;
                }
                write!(f, ")")
            }
            Value::Function(func) => write!(f, "{func:?}"),
        }
    }
}

fn write_debug_seq(f: &mut std::fmt::Formatter<'_>, items: &[Value]) -> std::fmt::Result {
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v:?}")?;
    }
    Ok(())
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Function::Builtin { id, .. } => write!(f, "Builtin({id})"),
            Function::Closure(closure) => write!(
                f,
                "Closure(params={:?}, body={:?})",
                closure.params, closure.body
            ),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating keywords; the name excludes the colon
pub fn kw<S: AsRef<str>>(name: S) -> Value {
    Value::Keyword(name.as_ref().to_owned())
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating mixed lists
pub fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

/// Helper function for creating vectors
pub fn vector(items: Vec<Value>) -> Value {
    Value::Vector(items)
}

impl Value {
    /// Only `false` and `nil` are falsy; everything else, including `0`, `""`
    /// and the empty list, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    /// Variant name used in type mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::String(_) => "string",
            Value::Keyword(_) => "keyword",
            Value::Symbol(_) => "symbol",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
        }
    }

    /// Narrow to an integer or fail with a TypeMismatch
    pub fn as_integer(&self) -> Result<NumberType, Error> {
        match self {
            Value::Integer(n) => Ok(*n),
            other => Err(Error::type_mismatch("integer", other)),
        }
    }

    /// Narrow to a list's elements or fail with a TypeMismatch
    pub fn as_list(&self) -> Result<&[Value], Error> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(Error::type_mismatch("list", other)),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Builtin { id: id1, .. }, Function::Builtin { id: id2, .. }) => id1 == id2,
            (Function::Closure(c1), Function::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false, // Different variants are never equal
        }
    }
}
