//! Adapters from typed Rust functions to erased builtins.
//!
//! Builtins are stored as [`OperationFn`]. The traits here let a plain
//! `fn(i64, i64) -> i64`, or a function taking a rest iterator, be turned
//! into one: arguments are narrowed to the declared parameter types and the
//! return value is wrapped back into a `Value`. Hosts normally go through
//! the `Environment::register_*` methods instead of using this module
//! directly.

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::builtinops::Arity;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

/// Erased builtin signature. The argument vector is owned so an
/// implementation may move values out of it.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

// ---------------------------------------------------------------------
// Single parameters
// ---------------------------------------------------------------------

/// A parameter type a single evaluated argument can be narrowed to.
///
/// `Param<'a>` is what the builtin actually receives; it may borrow from the
/// argument slot it was narrowed from.
pub trait FromParam {
    type Param<'a>;

    fn from_arg<'a>(slot: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(slot: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        // The slot is dropped right after the call
        Ok(std::mem::replace(slot, Value::Nil))
    }
}

impl FromParam for NumberType {
    type Param<'a> = NumberType;

    fn from_arg<'a>(slot: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        slot.as_integer()
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(slot: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match slot {
            Value::String(s) => Ok(s.as_str()),
            other => Err(Error::type_mismatch("string", other)),
        }
    }
}

/// A single list argument, iterated element-wise. `nil` is not a list here.
impl<K: ElementKind> FromParam for ArgIter<'_, K> {
    type Param<'a> = ArgIter<'a, K>;

    fn from_arg<'a>(slot: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        ArgIter::new(slot.as_list()?)
    }
}

// ---------------------------------------------------------------------
// Element kinds and the argument iterator
// ---------------------------------------------------------------------

/// How one element of an argument run is narrowed.
#[doc(hidden)]
pub trait ElementKind {
    type Item<'a>;

    fn narrow(value: &Value) -> Result<Self::Item<'_>, Error>;
}

#[doc(hidden)]
pub struct AnyKind;

impl ElementKind for AnyKind {
    type Item<'a> = &'a Value;

    fn narrow(value: &Value) -> Result<Self::Item<'_>, Error> {
        Ok(value)
    }
}

#[doc(hidden)]
pub struct IntegerKind;

impl ElementKind for IntegerKind {
    type Item<'a> = NumberType;

    fn narrow(value: &Value) -> Result<Self::Item<'_>, Error> {
        value.as_integer()
    }
}

#[doc(hidden)]
pub struct StringKind;

impl ElementKind for StringKind {
    type Item<'a> = &'a str;

    fn narrow(value: &Value) -> Result<Self::Item<'_>, Error> {
        match value {
            Value::String(s) => Ok(s.as_str()),
            other => Err(Error::type_mismatch("string", other)),
        }
    }
}

/// Iterator over a run of arguments narrowed by `K`.
///
/// The whole run is narrowed once on construction, so a type mismatch is
/// reported before the builtin sees any element.
#[doc(hidden)]
pub struct ArgIter<'a, K: ElementKind> {
    values: std::slice::Iter<'a, Value>,
    kind: PhantomData<K>,
}

impl<'a, K: ElementKind> ArgIter<'a, K> {
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        for value in values {
            K::narrow(value)?;
        }
        Ok(ArgIter {
            values: values.iter(),
            kind: PhantomData,
        })
    }
}

impl<'a, K: ElementKind> Iterator for ArgIter<'a, K> {
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Every element already narrowed successfully in `new`
        self.values.next().and_then(|value| K::narrow(value).ok())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<K: ElementKind> ExactSizeIterator for ArgIter<'_, K> {}
impl<K: ElementKind> FusedIterator for ArgIter<'_, K> {}

/// Arguments of any type, by reference.
pub type ValueIter<'a> = ArgIter<'a, AnyKind>;

/// Integer arguments; any non-integer is a `TypeMismatch`.
pub type IntIter<'a> = ArgIter<'a, IntegerKind>;

/// String arguments; any non-string is a `TypeMismatch`.
pub type StringIter<'a> = ArgIter<'a, StringKind>;

// ---------------------------------------------------------------------
// Rest parameters
// ---------------------------------------------------------------------

/// A parameter type that takes every remaining argument.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(tail: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl<K: ElementKind> FromRest for ArgIter<'static, K> {
    type Param<'a> = ArgIter<'a, K>;

    fn from_rest<'a>(tail: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        ArgIter::new(tail)
    }
}

// ---------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------

/// Return types a builtin may have: anything convertible to `Value`, or a
/// `Result` of one.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T: Into<Value>> IntoValueResult for Result<T, Error> {
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T: Into<Value>> IntoValueResult for T {
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Functions with a fixed parameter list. `Args` is the tuple of parameter
/// types and picks the impl, e.g. `(NumberType, &str)`.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Functions whose last parameter is [`ValueIter`], [`IntIter`] or
/// [`StringIter`], after zero to two fixed parameters.
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

// ---------------------------------------------------------------------
// Fixed-arity impls
// ---------------------------------------------------------------------

impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| match args.len() {
            0 => (self)().into_value_result(),
            got => Err(Error::arity_error(Arity::Exact(0), got)),
        })
    }
}

/// The argument vector is split into one mutable slot per parameter so each
/// `FromParam` impl can borrow from, or move out of, its own slot.
macro_rules! fixed_arity_impl {
    ($n:literal: $( $slot:ident as $A:ident ),+) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            $( $A: FromParam, )+
            F: for<'a> Fn( $( $A::Param<'a> ),+ ) -> R + Send + Sync + 'static,
            R: IntoValueResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let got = args.len();
                    let [ $( $slot ),+ ] = args.as_mut_slice() else {
                        return Err(Error::arity_error(Arity::Exact($n), got));
                    };
                    $( let $slot = $A::from_arg($slot)?; )+
                    (self)( $( $slot ),+ ).into_value_result()
                })
            }
        }
    };
}

fixed_arity_impl!(1: a as A);
fixed_arity_impl!(2: a as A, b as B);
fixed_arity_impl!(3: a as A, b as B, c as C);

// ---------------------------------------------------------------------
// Variadic impls
// ---------------------------------------------------------------------

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(I::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| (self)(I::from_rest(&args)?).into_value_result())
    }
}

/// Fixed prefix slots first, then everything left over goes to the rest
/// parameter. Too few arguments for the prefix is an arity error.
macro_rules! prefixed_variadic_impl {
    ($n:literal: $( $slot:ident as $A:ident ),+) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn( $( $A::Param<'a>, )+ I::Param<'a> ) -> R + Send + Sync + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    let got = args.len();
                    let [ $( $slot, )+ tail @ .. ] = args.as_mut_slice() else {
                        return Err(Error::arity_error(Arity::AtLeast($n), got));
                    };
                    $( let $slot = $A::from_arg($slot)?; )+
                    let tail = I::from_rest(tail)?;
                    (self)( $( $slot, )+ tail ).into_value_result()
                })
            }
        }
    };
}

prefixed_variadic_impl!(1: a as A);
prefixed_variadic_impl!(2: a as A, b as B);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{list, val};

    fn fixed<Args, F: IntoOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_operation()
    }

    fn variadic<Args, F: IntoVariadicOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_variadic_operation()
    }

    #[test]
    fn test_fixed_adapters() {
        fn add(a: NumberType, b: NumberType) -> NumberType {
            a + b
        }
        fn shout(s: &str) -> String {
            s.to_uppercase()
        }
        fn length(items: ValueIter<'_>) -> Result<NumberType, Error> {
            NumberType::try_from(items.len()).map_err(|_| Error::IntegerOverflow("length"))
        }
        fn seven() -> NumberType {
            7
        }
        fn pick(flag: Value, a: NumberType, b: NumberType) -> NumberType {
            if flag.is_truthy() { a } else { b }
        }

        let add = fixed::<(NumberType, NumberType), _>(add);
        assert_eq!(add(vec![val(2), val(3)]).unwrap(), val(5));
        assert!(matches!(
            add(vec![val(2)]),
            Err(Error::ArityError { got: 1, .. })
        ));
        assert!(matches!(
            add(vec![val(2), val("3")]),
            Err(Error::TypeMismatch(_))
        ));

        let shout = fixed::<(&'static str,), _>(shout);
        assert_eq!(shout(vec![val("hi")]).unwrap(), val("HI"));
        assert!(shout(vec![val(1)]).is_err());

        let length = fixed::<(ValueIter<'static>,), _>(length);
        assert_eq!(length(vec![val([1, 2, 3])]).unwrap(), val(3));
        assert!(matches!(
            length(vec![Value::Nil]),
            Err(Error::TypeMismatch(_))
        ));

        let seven = fixed::<(), _>(seven);
        assert_eq!(seven(vec![]).unwrap(), val(7));
        assert!(seven(vec![val(1)]).is_err());

        let pick = fixed::<(Value, NumberType, NumberType), _>(pick);
        assert_eq!(pick(vec![Value::Nil, val(1), val(2)]).unwrap(), val(2));
        assert_eq!(pick(vec![val(0), val(1), val(2)]).unwrap(), val(1));
    }

    #[test]
    fn test_variadic_adapters() {
        fn sum(xs: IntIter<'_>) -> NumberType {
            xs.sum()
        }
        fn join(sep: &str, rest: StringIter<'_>) -> String {
            rest.collect::<Vec<_>>().join(sep)
        }
        fn needs_two(xs: ValueIter<'_>) -> Result<Value, Error> {
            if xs.len() > 1 {
                Ok(val(true))
            } else {
                Err(Error::DivideByZero)
            }
        }

        let sum = variadic::<(IntIter<'static>,), _>(sum);
        assert_eq!(sum(vec![]).unwrap(), val(0));
        assert_eq!(sum(vec![val(1), val(2), val(3)]).unwrap(), val(6));
        assert!(sum(vec![val(1), list(vec![])]).is_err());

        let join = variadic::<(&'static str, StringIter<'static>), _>(join);
        assert_eq!(join(vec![val("-"), val("a"), val("b")]).unwrap(), val("a-b"));
        assert!(matches!(
            join(vec![]),
            Err(Error::ArityError { got: 0, .. })
        ));
        assert!(matches!(
            join(vec![val("-"), val(1)]),
            Err(Error::TypeMismatch(_))
        ));

        let needs_two = variadic::<(ValueIter<'static>,), _>(needs_two);
        assert_eq!(needs_two(vec![val(1), val(2)]).unwrap(), val(true));
        assert_eq!(needs_two(vec![]), Err(Error::DivideByZero));
    }
}
