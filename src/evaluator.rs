use crate::Error;
use crate::ast::{Closure, Function, Value};
use crate::builtinops::{Arity, get_builtin_ops, with_arity_check};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

pub mod intooperation;

use intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
pub use intooperation::{IntIter, StringIter, ValueIter};

struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Lexical scope for variable bindings.
///
/// An `Environment` is a cheap handle: clones share the same frame, so a
/// closure that captured an environment sees later `set`s made in it. Child
/// frames keep their parent alive for as long as they are reachable.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    // Bindings can hold closures that capture this very frame, so only names are shown
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

impl Environment {
    /// A fresh root environment with no bindings. See [`create_global_env`]
    /// for one with the builtin primitives installed.
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: None,
        })))
    }

    /// A fresh frame whose parent is `self`. Definitions in the child shadow,
    /// and never modify, the parent's bindings.
    pub fn new_child(&self) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Insert or overwrite a binding in this frame and return the bound value.
    pub fn define(&self, name: impl Into<String>, value: Value) -> Value {
        self.0.borrow_mut().bindings.insert(name.into(), value.clone());
        value
    }

    /// Look `name` up in this frame, then along the parent chain.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        let mut current = self.clone();
        loop {
            let parent = {
                let frame = current.0.borrow();
                if let Some(value) = frame.bindings.get(name) {
                    return Ok(value.clone());
                }
                frame.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return Err(Error::UndefinedSymbol(name.to_owned())),
            }
        }
    }

    /// Install every builtin primitive into this frame. Re-running simply
    /// overwrites the existing primitive bindings.
    pub fn init(&self) {
        let ops = get_builtin_ops();
        for op in ops {
            self.define(op.id, Value::Function(op.to_function()));
        }
        debug!(count = ops.len(), "installed builtin primitives");
    }

    fn bind_builtin(&self, name: &str, func: Arc<OperationFn>) {
        self.define(
            name,
            Value::Function(Function::Builtin {
                id: name.to_owned(),
                func,
            }),
        );
    }

    /// Register a native function working directly on the evaluated argument
    /// slice.
    ///
    /// # Example
    /// ```
    /// use slisp::evaluator::create_global_env;
    /// use slisp::ast::Value;
    /// use slisp::Error;
    ///
    /// fn arg_count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::from(args.len() as i64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("arg-count", arg_count);
    /// assert_eq!(slisp::rep("(arg-count 1 2 3)", &env).unwrap(), "3");
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.bind_builtin(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a builtin, with automatic
    /// argument conversion and result wrapping.
    ///
    /// Supported parameter types are `i64`, `&str`, `Value` and the list
    /// iterators [`ValueIter`], [`IntIter`] and [`StringIter`]. The return
    /// type may be anything convertible into a `Value`, or a
    /// `Result<_, Error>` of one. Arity follows from the signature;
    /// conversion failures are reported as `TypeMismatch`.
    pub fn register_builtin_operation<Args, F>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        self.bind_builtin(name, func.into_operation());
    }

    /// Register a builtin whose last parameter is a rest iterator, e.g.
    /// `fn(i64, IntIter<'_>) -> i64`. `arity` is validated against the
    /// total argument count before any conversion happens.
    pub fn register_variadic_builtin_operation<Args, F>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        self.bind_builtin(name, with_arity_check(arity, func.into_variadic_operation()));
    }

    /// Get all bindings visible from this environment, inner frames
    /// overriding outer ones, sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings (so they can be overridden by local bindings)
        let frame = self.0.borrow();
        if let Some(parent) = &frame.parent {
            bindings.extend(parent.get_all_bindings());
        }
        for (name, value) in &frame.bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Create a root environment with every builtin primitive installed
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    env.init();
    env
}

/// Forms with their own evaluation rules. They are recognised by the head
/// symbol before any environment lookup, so user bindings cannot shadow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    /// `(fn [params...] body)`
    Fn,
    /// `(set name expr)`
    Set,
    /// `(let {name expr ...} body)`
    Let,
    /// `(if cond then [else])`
    If,
    /// `(quote form)`
    Quote,
}

impl SpecialForm {
    pub fn from_symbol(name: &str) -> Option<Self> {
        match name {
            "fn" => Some(SpecialForm::Fn),
            "set" => Some(SpecialForm::Set),
            "let" => Some(SpecialForm::Let),
            "if" => Some(SpecialForm::If),
            "quote" => Some(SpecialForm::Quote),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Fn => "fn",
            SpecialForm::Set => "set",
            SpecialForm::Let => "let",
            SpecialForm::If => "if",
            SpecialForm::Quote => "quote",
        }
    }

    /// Number of parts after the head symbol
    pub fn arity(self) -> Arity {
        match self {
            SpecialForm::Fn | SpecialForm::Set | SpecialForm::Let => Arity::Exact(2),
            SpecialForm::If => Arity::Range(2, 3),
            SpecialForm::Quote => Arity::Exact(1),
        }
    }
}

/// Evaluate an expression in `env`
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    match expr {
        Value::Symbol(name) => env.get(name),
        Value::List(elements) => eval_list(elements, env),
        // Everything else, including vectors, maps and functions, evaluates to itself
        _ => Ok(expr.clone()),
    }
}

/// Call a function value with already-evaluated arguments
pub fn apply(func: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::Function(Function::Builtin { id, func }) => {
            trace!(builtin = %id, argc = args.len(), "calling builtin");
            func(args)
        }
        Value::Function(Function::Closure(closure)) => call_closure(closure, args),
        other => Err(Error::NotCallable(other.to_string())),
    }
}

fn call_closure(closure: &Closure, args: Vec<Value>) -> Result<Value, Error> {
    if args.len() != closure.params.len() {
        return Err(Error::arity_error(closure.params.len(), args.len()));
    }
    trace!(params = ?closure.params, "calling closure");

    let call_env = closure.env.new_child();
    for (param, arg) in closure.params.iter().zip(args) {
        call_env.define(param.as_str(), arg);
    }
    eval(&closure.body, &call_env)
}

fn eval_list(elements: &[Value], env: &Environment) -> Result<Value, Error> {
    let Some((head, rest)) = elements.split_first() else {
        // The empty list is a value of its own, distinct from nil
        return Ok(Value::List(Vec::new()));
    };

    if let Value::Symbol(name) = head
        && let Some(form) = SpecialForm::from_symbol(name)
    {
        trace!(form = form.name(), "special form");
        return eval_special_form(form, elements, env);
    }

    let callee = eval(head, env)?;
    if !matches!(callee, Value::Function(_)) {
        return Err(Error::NotCallable(callee.to_string()));
    }

    let args = rest
        .iter()
        .map(|arg| eval(arg, env))
        .collect::<Result<Vec<_>, _>>()?;
    apply(&callee, args)
}

/// `elements` is the whole form, head symbol included
fn eval_special_form(
    form: SpecialForm,
    elements: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let args = &elements[1..];
    match (form, args) {
        (SpecialForm::Fn, [params, body]) => eval_fn(params, body, env),
        (SpecialForm::Set, [target, expr]) => eval_set(target, expr, env),
        (SpecialForm::Let, [bindings, body]) => eval_let(bindings, body, env),
        (SpecialForm::If, [condition, then]) => eval_if(condition, then, None, env),
        (SpecialForm::If, [condition, then, otherwise]) => {
            eval_if(condition, then, Some(otherwise), env)
        }
        (SpecialForm::Quote, [quoted]) => Ok(quoted.clone()),
        _ => Err(Error::arity_error_with_expr(
            form.arity(),
            args.len(),
            Value::List(elements.to_vec()).to_string(),
        )),
    }
}

fn eval_fn(params: &Value, body: &Value, env: &Environment) -> Result<Value, Error> {
    let Value::Vector(items) = params else {
        return Err(Error::MalformedForm(format!(
            "fn parameters must be a vector, got {}",
            params.type_name()
        )));
    };

    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Value::Symbol(name) = item else {
            return Err(Error::MalformedForm(format!(
                "fn parameter must be a symbol, got {item}"
            )));
        };
        if names.contains(name) {
            return Err(Error::MalformedForm(format!(
                "duplicate parameter name: {name}"
            )));
        }
        names.push(name.clone());
    }

    debug!(params = ?names, "closure created");
    Ok(Value::Function(Function::Closure(Rc::new(Closure {
        params: names,
        body: body.clone(),
        env: env.clone(),
    }))))
}

fn eval_set(target: &Value, expr: &Value, env: &Environment) -> Result<Value, Error> {
    let Value::Symbol(name) = target else {
        return Err(Error::MalformedForm(format!(
            "set target must be a symbol, got {target}"
        )));
    };
    let value = eval(expr, env)?;
    Ok(env.define(name.as_str(), value))
}

/// Bindings are made one at a time in a single child frame, so later ones
/// see earlier ones
fn eval_let(bindings: &Value, body: &Value, env: &Environment) -> Result<Value, Error> {
    let Value::Map(pairs) = bindings else {
        return Err(Error::MalformedForm(format!(
            "let bindings must be a {{name value ...}} form, got {}",
            bindings.type_name()
        )));
    };

    let scope = env.new_child();
    for (key, expr) in pairs {
        let Value::Symbol(name) = key else {
            return Err(Error::MalformedForm(format!(
                "let binding name must be a symbol, got {key}"
            )));
        };
        let value = eval(expr, &scope)?;
        scope.define(name.as_str(), value);
    }
    eval(body, &scope)
}

fn eval_if(
    condition: &Value,
    then: &Value,
    otherwise: Option<&Value>,
    env: &Environment,
) -> Result<Value, Error> {
    if eval(condition, env)?.is_truthy() {
        eval(then, env)
    } else {
        otherwise.map_or(Ok(Value::Nil), |expr| eval(expr, env))
    }
}
