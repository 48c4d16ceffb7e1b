//! Built-in primitive functions.
//!
//! Every primitive is an ordinary function value: the evaluator evaluates all
//! arguments left to right before calling it, exactly as for user closures.
//! Special forms (`fn`, `set`, `let`, `if`, `quote`) are not in this registry;
//! they are dispatched by the evaluator before any environment lookup.
//!
//! ```text
//! (+ 1 2 3)          ; 6
//! (- 10 3 2)         ; 5
//! (= (list 1) (list 1))
//! (count nil)        ; 0
//! (not 0)            ; false, 0 is truthy
//! ```
//!
//! ## Error Handling
//!
//! - **Type safety**: arithmetic and ordering reject non-integers with `TypeMismatch`
//! - **Overflow detection**: checked arithmetic reports `IntegerOverflow`
//! - **Arity checking**: every primitive validates its argument count
//!
//! ## Adding New Operations
//!
//! 1. Implement the function with typed parameters (`NumberType`, `&str`,
//!    `Value`, or one of the iterator aliases for lists and rest arguments)
//! 2. Add it to `BUILTIN_OPS` with its identifier and arity
//! 3. Add test cases to the table below

use crate::Error;
use crate::ast::{Function, NumberType, Value};
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::evaluator::{IntIter, StringIter, ValueIter};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Accepted argument counts of a builtin or special form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check if the given number of arguments is accepted
    pub fn validate(&self, arg_count: usize) -> Result<(), Error> {
        let ok = match *self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
            Arity::Range(min, max) => (min..=max).contains(&arg_count),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, arg_count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Clone)]
pub struct BuiltinOp {
    /// The name bound in the root environment
    pub id: &'static str,
    /// Erased implementation; arity is validated before the typed adapter runs
    pub func: Arc<OperationFn>,
    /// Expected number of arguments
    pub arity: Arity,
}

impl fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// The callable value bound under this operation's name
    pub fn to_function(&self) -> Function {
        Function::Builtin {
            id: self.id.to_owned(),
            func: Arc::clone(&self.func),
        }
    }
}

//
// Builtin Function Implementations
//

fn overflow(op: &'static str) -> Error {
    Error::IntegerOverflow(op)
}

fn builtin_add(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut sum = first;
    for n in rest {
        sum = sum.checked_add(n).ok_or_else(|| overflow("addition"))?;
    }
    Ok(sum)
}

/// `(- a b c)` is `a - b - c`; a single argument is returned unchanged.
fn builtin_sub(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut result = first;
    for n in rest {
        result = result.checked_sub(n).ok_or_else(|| overflow("subtraction"))?;
    }
    Ok(result)
}

fn builtin_mul(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut product = first;
    for n in rest {
        product = product
            .checked_mul(n)
            .ok_or_else(|| overflow("multiplication"))?;
    }
    Ok(product)
}

/// Truncating integer division, left to right.
fn builtin_div(first: NumberType, rest: IntIter<'_>) -> Result<NumberType, Error> {
    let mut quotient = first;
    for n in rest {
        if n == 0 {
            return Err(Error::DivideByZero);
        }
        quotient = quotient.checked_div(n).ok_or_else(|| overflow("division"))?;
    }
    Ok(quotient)
}

fn builtin_mod(dividend: NumberType, divisor: NumberType) -> Result<NumberType, Error> {
    if divisor == 0 {
        return Err(Error::DivideByZero);
    }
    dividend
        .checked_rem(divisor)
        .ok_or_else(|| overflow("modulo"))
}

fn builtin_max(first: NumberType, rest: IntIter<'_>) -> NumberType {
    rest.fold(first, NumberType::max)
}

fn builtin_min(first: NumberType, rest: IntIter<'_>) -> NumberType {
    rest.fold(first, NumberType::min)
}

// Macro to generate integer ordering functions
macro_rules! integer_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> bool {
            a $op b
        }
    };
}

integer_comparison!(builtin_gt, >);
integer_comparison!(builtin_ge, >=);
integer_comparison!(builtin_lt, <);
integer_comparison!(builtin_le, <=);

/// Structural equality over any two values
fn builtin_equal(first: Value, second: Value) -> bool {
    first == second
}

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::List(args.cloned().collect())
}

fn builtin_is_list(value: Value) -> bool {
    matches!(value, Value::List(_))
}

fn builtin_is_empty(list: ValueIter<'_>) -> bool {
    list.len() == 0
}

/// Length of a list. `nil` counts as an empty list here, unlike `empty?`.
fn builtin_count(value: Value) -> Result<NumberType, Error> {
    let len = match &value {
        Value::List(items) => items.len(),
        Value::Nil => 0,
        other => return Err(Error::type_mismatch("list or nil", other)),
    };
    NumberType::try_from(len).map_err(|_| overflow("count"))
}

fn builtin_first(mut list: ValueIter<'_>) -> Value {
    list.next().cloned().unwrap_or(Value::Nil)
}

fn builtin_rest(list: ValueIter<'_>) -> Value {
    Value::List(list.skip(1).cloned().collect())
}

fn builtin_cons(head: Value, tail: ValueIter<'_>) -> Value {
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(head);
    items.extend(tail.cloned());
    Value::List(items)
}

fn builtin_str(args: StringIter<'_>) -> String {
    args.collect()
}

/// Global registry of all built-in operations, built once on first use.
///
/// Each implementation is wired through the same typed adapter layer that
/// [`crate::evaluator::Environment::register_builtin_operation`] uses, and
/// wrapped so the declared arity is checked before any argument conversion.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn op(id: &'static str, arity: Arity, inner: Arc<OperationFn>) -> BuiltinOp {
        BuiltinOp {
            id,
            func: with_arity_check(arity, inner),
            arity,
        }
    }

    vec![
        // Arithmetic
        op(
            "+",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, IntIter<'static>), _>(builtin_add),
        ),
        op(
            "-",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, IntIter<'static>), _>(builtin_sub),
        ),
        op(
            "*",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, IntIter<'static>), _>(builtin_mul),
        ),
        op(
            "/",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, IntIter<'static>), _>(builtin_div),
        ),
        op(
            "mod",
            Arity::Exact(2),
            builtin_fixed::<(NumberType, NumberType), _>(builtin_mod),
        ),
        op(
            "max",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, IntIter<'static>), _>(builtin_max),
        ),
        op(
            "min",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, IntIter<'static>), _>(builtin_min),
        ),
        // Comparison
        op(
            "=",
            Arity::Exact(2),
            builtin_fixed::<(Value, Value), _>(builtin_equal),
        ),
        op(
            ">",
            Arity::Exact(2),
            builtin_fixed::<(NumberType, NumberType), _>(builtin_gt),
        ),
        op(
            ">=",
            Arity::Exact(2),
            builtin_fixed::<(NumberType, NumberType), _>(builtin_ge),
        ),
        op(
            "<",
            Arity::Exact(2),
            builtin_fixed::<(NumberType, NumberType), _>(builtin_lt),
        ),
        op(
            "<=",
            Arity::Exact(2),
            builtin_fixed::<(NumberType, NumberType), _>(builtin_le),
        ),
        // Logic
        op(
            "not",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_not),
        ),
        // Lists
        op(
            "list",
            Arity::Any,
            builtin_variadic::<(ValueIter<'static>,), _>(builtin_list),
        ),
        op(
            "list?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_list),
        ),
        op(
            "empty?",
            Arity::Exact(1),
            builtin_fixed::<(ValueIter<'static>,), _>(builtin_is_empty),
        ),
        op(
            "count",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_count),
        ),
        op(
            "first",
            Arity::Exact(1),
            builtin_fixed::<(ValueIter<'static>,), _>(builtin_first),
        ),
        op(
            "rest",
            Arity::Exact(1),
            builtin_fixed::<(ValueIter<'static>,), _>(builtin_rest),
        ),
        op(
            "cons",
            Arity::Exact(2),
            builtin_fixed::<(Value, ValueIter<'static>), _>(builtin_cons),
        ),
        // Strings
        op(
            "str",
            Arity::Any,
            builtin_variadic::<(StringIter<'static>,), _>(builtin_str),
        ),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Wrap an erased operation so `arity` is validated before it runs
pub(crate) fn with_arity_check(arity: Arity, inner: Arc<OperationFn>) -> Arc<OperationFn> {
    Arc::new(move |args: Vec<Value>| {
        arity.validate(args.len())?;
        inner(args)
    })
}

/// All builtin operations, in registration order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by the name it is bound under
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
