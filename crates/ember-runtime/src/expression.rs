//! Builtin function registry
//!
//! An `Expression` holds the named builtins available to the scripts of one
//! module. Builtins come in two calling conventions:
//!
//! - **eager**: arguments are evaluated before the handler runs;
//! - **lazy**: the handler receives the raw argument thunks plus the caller's
//!   evaluation tag, and decides which thunks to force and under which tag.
//!
//! The delegated lazy form additionally hands the handler the expression
//! itself and the call-site span, which `task` needs to resolve functions by
//! name and to attribute errors raised on worker threads.

use crate::context::{Context, EvalKind};
use crate::span::Span;
use crate::value::{RuntimeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A deferred argument: a thunk bound to the evaluation site, forced
/// explicitly by lazy builtins.
#[derive(Clone)]
pub struct LazyValue(
    Arc<dyn Fn(&mut Context, EvalKind) -> Result<Value, RuntimeError> + Send + Sync>,
);

impl LazyValue {
    pub fn new(
        f: impl Fn(&mut Context, EvalKind) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        LazyValue(Arc::new(f))
    }

    /// A thunk that always yields `value`
    pub fn constant(value: Value) -> Self {
        LazyValue(Arc::new(move |_, _| Ok(value.clone())))
    }

    /// Force the thunk in `context` under the given evaluation tag
    pub fn eval(&self, context: &mut Context, kind: EvalKind) -> Result<Value, RuntimeError> {
        (self.0)(context, kind)
    }
}

type UnaryFn = Arc<dyn Fn(&mut Context, Value, Span) -> Result<Value, RuntimeError> + Send + Sync>;
type EagerFn =
    Arc<dyn Fn(&mut Context, Vec<Value>, Span) -> Result<Value, RuntimeError> + Send + Sync>;
type LazyFn = Arc<
    dyn Fn(&mut Context, EvalKind, &[LazyValue], Span) -> Result<Value, RuntimeError>
        + Send
        + Sync,
>;
type DelegatedFn = Arc<
    dyn Fn(&mut Context, EvalKind, &Expression, &[LazyValue], Span) -> Result<Value, RuntimeError>
        + Send
        + Sync,
>;

#[derive(Clone)]
enum Builtin {
    Unary(UnaryFn),
    Eager(EagerFn),
    Lazy { f: LazyFn, arity: Option<usize> },
    Delegated { f: DelegatedFn, arity: Option<usize> },
}

/// Named-builtin registry for one module
pub struct Expression {
    module: Arc<str>,
    builtins: HashMap<String, Builtin>,
}

impl Expression {
    pub fn new(module: impl Into<Arc<str>>) -> Self {
        Expression {
            module: module.into(),
            builtins: HashMap::new(),
        }
    }

    /// Name of the module this expression belongs to
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Register an eager builtin taking exactly one argument
    pub fn add_unary_function(
        &mut self,
        name: &str,
        f: impl Fn(&mut Context, Value, Span) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) {
        self.builtins
            .insert(name.to_string(), Builtin::Unary(Arc::new(f)));
    }

    /// Register a variadic eager builtin
    pub fn add_function(
        &mut self,
        name: &str,
        f: impl Fn(&mut Context, Vec<Value>, Span) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    ) {
        self.builtins
            .insert(name.to_string(), Builtin::Eager(Arc::new(f)));
    }

    /// Register a lazy builtin. `arity` of `None` means variadic.
    pub fn add_lazy_function(
        &mut self,
        name: &str,
        arity: Option<usize>,
        f: impl Fn(&mut Context, EvalKind, &[LazyValue], Span) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    ) {
        self.builtins.insert(
            name.to_string(),
            Builtin::Lazy {
                f: Arc::new(f),
                arity,
            },
        );
    }

    /// Register a lazy builtin that also receives the expression and the
    /// call-site span (the delegation token)
    pub fn add_lazy_function_with_delegation(
        &mut self,
        name: &str,
        arity: Option<usize>,
        f: impl Fn(&mut Context, EvalKind, &Expression, &[LazyValue], Span) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    ) {
        self.builtins.insert(
            name.to_string(),
            Builtin::Delegated {
                f: Arc::new(f),
                arity,
            },
        );
    }

    /// Whether `name` is a registered builtin
    pub fn has_function(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Registered builtin names, unordered
    pub fn function_names(&self) -> Vec<String> {
        self.builtins.keys().cloned().collect()
    }

    /// Invoke a builtin by name. This is the entry point the evaluator (and
    /// the tests) use: arguments arrive as thunks and are forced according to
    /// the builtin's calling convention.
    pub fn call(
        &self,
        name: &str,
        context: &mut Context,
        kind: EvalKind,
        args: &[LazyValue],
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let builtin = match self.builtins.get(name) {
            Some(builtin) => builtin.clone(),
            None => {
                return Err(RuntimeError::UnknownFunction {
                    name: name.to_string(),
                    span,
                })
            }
        };

        let check_arity = |arity: Option<usize>| -> Result<(), RuntimeError> {
            match arity {
                Some(expected) if expected != args.len() => Err(RuntimeError::InvalidArgument {
                    msg: format!(
                        "Function '{}' expects {} arguments, got {}",
                        name,
                        expected,
                        args.len()
                    ),
                    span,
                }),
                _ => Ok(()),
            }
        };

        match builtin {
            Builtin::Unary(f) => {
                check_arity(Some(1))?;
                let value = args[0].eval(context, EvalKind::Value)?;
                f(context, value, span)
            }
            Builtin::Eager(f) => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(context, EvalKind::Value))
                    .collect::<Result<Vec<_>, _>>()?;
                f(context, values, span)
            }
            Builtin::Lazy { f, arity } => {
                check_arity(arity)?;
                f(context, kind, args, span)
            }
            Builtin::Delegated { f, arity } => {
                check_arity(arity)?;
                f(context, kind, self, args, span)
            }
        }
    }
}
