//! slisp - a small S-expression interpreter with lexical closures
//!
//! This crate reads textual S-expressions, evaluates them against a lexically
//! scoped environment and renders the results back to text.
//!
//! ```text
//! (+ 1 2 3)                             ; arithmetic
//! (if nil "yes" "no")                   ; truthiness: only false and nil are falsy
//! (let {p (+ 2 3) q (+ 2 p)} (+ p q))   ; sequential local bindings
//! (set add (fn [a b] (+ a b)))          ; closures bound in the environment
//! ```
//!
//! ## Pipeline
//!
//! Every request goes through the same three stages, which are also available
//! as one call through [`rep`]:
//!
//! - [`reader::parse`] turns text into a [`ast::Value`] tree (purely structural)
//! - [`evaluator::eval`] reduces the tree against an [`evaluator::Environment`]
//! - [`printer::print`] renders the final value canonically
//!
//! ## Modules
//!
//! - `ast`: the value model shared by every stage
//! - `reader`: S-expression parsing from text
//! - `evaluator`: environments, special forms and function application
//! - `builtinops`: the primitive functions installed by [`evaluator::Environment::init`]
//! - `printer`: canonical rendering of values

use std::fmt;

/// Maximum reader nesting depth accepted by the default [`reader::ParseConfig`].
/// Deeper input is rejected as a syntax error instead of exhausting the stack.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// A token or construct that cannot be classified
    InvalidSyntax,
    /// A closing delimiter that does not match the open form, or has no open form
    Unbalanced,
    /// Input ended before the expression was complete (unclosed form, unterminated string)
    Incomplete,
    /// Expression nesting exceeded the configured maximum depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Implementation-imposed limit exceeded (integer literal out of range)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let char_offset = input
            .char_indices()
            .take_while(|(byte_idx, _)| *byte_idx < error_offset)
            .count();
        let context_start = char_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    SyntaxError(ParseError),
    #[error("UndefinedSymbolError: {0} is undefined")]
    UndefinedSymbol(String),
    #[error("NotCallableError: {0} is not a function")]
    NotCallable(String),
    #[error(
        "ArityError: {}expected {expected} arguments, got {got}",
        arity_context(.expression)
    )]
    ArityError {
        expected: String,
        got: usize,
        expression: Option<String>,
    },
    #[error("TypeMismatchError: {0}")]
    TypeMismatch(String),
    #[error("DivideByZeroError: division by zero")]
    DivideByZero,
    #[error("IntegerOverflowError: integer overflow in {0}")]
    IntegerOverflow(&'static str),
    #[error("MalformedFormError: {0}")]
    MalformedForm(String),
}

fn arity_context(expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("expression {expr}: "),
        None => String::new(),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: impl fmt::Display, got: usize) -> Self {
        Error::ArityError {
            expected: expected.to_string(),
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(
        expected: impl fmt::Display,
        got: usize,
        expression: String,
    ) -> Self {
        Error::ArityError {
            expected: expected.to_string(),
            got,
            expression: Some(expression),
        }
    }

    /// Create a TypeMismatch naming the expected kind and the value actually received
    pub fn type_mismatch(expected: &str, found: &ast::Value) -> Self {
        Error::TypeMismatch(format!("expected {expected}, got {}", found.type_name()))
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod printer;
pub mod reader;

/// Read, evaluate and print one request against `env`.
///
/// The input may hold any number of top-level forms; they are evaluated in
/// order and the printed value of the last one is returned (`nil` when the
/// input holds no forms). The first error aborts the request and is returned
/// unchanged; bindings made by earlier forms stay in `env`.
pub fn rep(input: &str, env: &evaluator::Environment) -> Result<String, Error> {
    let forms = reader::parse_program(input)?;
    let mut result = ast::Value::Nil;
    for form in &forms {
        result = evaluator::eval(form, env)?;
    }
    Ok(printer::print(&result))
}
