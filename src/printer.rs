//! Canonical text rendering of values.
//!
//! Strings, symbols and keywords render as their raw text (keywords keep their
//! colon), so printed output is meant for people rather than for the reader.

use std::fmt;

use crate::ast::Value;

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, elem) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{elem}")?;
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::String(s) | Value::Symbol(s) => write!(f, "{s}"),
            Value::Keyword(k) => write!(f, ":{k}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => write!(f, "nil"),
            Value::List(elements) => write_seq(f, "(", elements, ")"),
            Value::Vector(elements) => write_seq(f, "[", elements, "]"),
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (key, val)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{key} {val}")?;
                }
                write!(f, "}}")
            }
            // Closures and builtins are indistinguishable in output
            Value::Function(_) => write!(f, "function"),
        }
    }
}

/// Render a value to its canonical text. Never fails.
pub fn print(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{kw, list, sym, val, vector};
    use crate::builtinops::find_builtin_op;

    #[test]
    fn test_print_data_driven() {
        let builtin = Value::from(find_builtin_op("+").unwrap().to_function());

        let test_cases = vec![
            (val(42), "42"),
            (val(-7), "-7"),
            (val(true), "true"),
            (val(false), "false"),
            (Value::Nil, "nil"),
            (val("hello world"), "hello world"),
            (val(""), ""),
            (sym("gen-plus5"), "gen-plus5"),
            (kw("key"), ":key"),
            (list(vec![]), "()"),
            (val([1, 2, 3]), "(1 2 3)"),
            (
                list(vec![sym("+"), val(1), list(vec![sym("*"), val(2), val(3)])]),
                "(+ 1 (* 2 3))",
            ),
            (vector(vec![]), "[]"),
            (vector(vec![sym("a"), sym("b")]), "[a b]"),
            (Value::Map(vec![]), "{}"),
            (
                Value::Map(vec![(sym("p"), val(1)), (sym("q"), val("x"))]),
                "{p 1 q x}",
            ),
            (list(vec![Value::Nil, list(vec![])]), "(nil ())"),
            (builtin.clone(), "function"),
            (list(vec![builtin]), "(function)"),
        ];

        for (i, (value, expected)) in test_cases.iter().enumerate() {
            assert_eq!(print(value), *expected, "Print test #{} failed", i + 1);
        }
    }
}
