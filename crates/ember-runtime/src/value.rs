//! Runtime value representation
//!
//! Shared value representation for the evaluator and the system library.
//! - Numbers, Null: Immediate values (stack-allocated)
//! - Strings: Heap-allocated, reference-counted (Arc<String>), immutable
//! - Lists: Copy-on-write (ValueList wrapping Arc<Vec<Value>>), value semantics
//! - Functions: script-defined or host-registered callables
//! - Tasks: handles to asynchronous evaluations (identity semantics)

use crate::context::Context;
use crate::span::Span;
use crate::tasks::TaskHandle;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Copy-on-write list. Cheap to clone (refcount bump).
/// Mutations on a shared list clone the inner Vec first (Arc::make_mut).
#[derive(Clone, Debug)]
pub struct ValueList(Arc<Vec<Value>>);

impl ValueList {
    pub fn new() -> Self {
        ValueList(Arc::new(Vec::new()))
    }

    pub fn from_vec(v: Vec<Value>) -> Self {
        ValueList(Arc::new(v))
    }

    /// Read access — no clone needed.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get element by index — returns reference into inner Vec.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Mutating access — triggers CoW if Arc is shared.
    pub fn push(&mut self, value: Value) {
        Arc::make_mut(&mut self.0).push(value);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Convert to owned Vec — clones only if shared.
    pub fn into_vec(self) -> Vec<Value> {
        Arc::try_unwrap(self.0).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl Default for ValueList {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ValueList {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl std::ops::Index<usize> for ValueList {
    type Output = Value;
    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl From<Vec<Value>> for ValueList {
    fn from(v: Vec<Value>) -> Self {
        ValueList::from_vec(v)
    }
}

impl FromIterator<Value> for ValueList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ValueList(Arc::new(iter.into_iter().collect()))
    }
}

/// Callable body of a function value - Rust closure invoked with the calling
/// context and fully evaluated arguments.
///
/// Arc provides thread safety and cheap cloning for sharing functions across
/// evaluation contexts and tasks.
pub type HostFn = Arc<dyn Fn(&mut Context, Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync>;

/// A script-defined or host-registered callable.
///
/// Compares and hashes by name: two functions with the same name are the same
/// function as far as value semantics are concerned.
#[derive(Clone)]
pub struct FunctionValue {
    name: Arc<str>,
    arity: Option<usize>,
    body: HostFn,
}

impl FunctionValue {
    /// Create a function value. `arity` of `None` means variadic.
    pub fn new(
        name: impl Into<Arc<str>>,
        arity: Option<usize>,
        body: impl Fn(&mut Context, Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        FunctionValue {
            name: name.into(),
            arity,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Invoke the function with evaluated arguments.
    pub fn call(
        &self,
        context: &mut Context,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(RuntimeError::InvalidArgument {
                    msg: format!(
                        "Function '{}' expects {} arguments, got {}",
                        self.name,
                        arity,
                        args.len()
                    ),
                    span,
                });
            }
        }
        (self.body)(context, args)
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Runtime value type
#[derive(Clone)]
pub enum Value {
    /// Null value
    Null,
    /// Numeric value (IEEE 754 double-precision; integers render without a fraction)
    Number(f64),
    /// String value (reference-counted, immutable)
    String(Arc<String>),
    /// List value (copy-on-write, value semantics)
    List(ValueList),
    /// Function value (script-defined callable)
    Function(FunctionValue),
    /// Task handle (scheduled concurrent evaluation, identity semantics)
    Task(TaskHandle),
}

impl Value {
    /// Canonical false (the language has no boolean type; 0 and 1 stand in)
    pub const FALSE: Value = Value::Number(0.0);
    /// Canonical true
    pub const TRUE: Value = Value::Number(1.0);

    /// Create a new string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(s.into()))
    }

    /// Create a new list value
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(ValueList::from_vec(values))
    }

    /// Create a list of numbers
    pub fn list_of_nums(nums: impl IntoIterator<Item = f64>) -> Self {
        Value::List(nums.into_iter().map(Value::Number).collect())
    }

    /// 0/1 from a Rust bool
    pub fn from_bool(b: bool) -> Self {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    /// Get the type tag of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Task(_) => "task",
        }
    }

    /// Boolean coercion: non-zero numbers, non-empty strings and lists,
    /// functions and task handles are truthy; null is falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Function(_) => true,
            Value::Task(_) => true,
        }
    }

    /// Extract the value as a double; non-numbers are a type error.
    pub fn as_double(&self, span: Span) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(RuntimeError::TypeError {
                msg: format!("Expected a numeric value, got {}", other.type_name()),
                span,
            }),
        }
    }

    /// Extract the value as an integer (truncating toward zero).
    pub fn as_int(&self, span: Span) -> Result<i64, RuntimeError> {
        Ok(self.as_double(span)? as i64)
    }

    /// Deep, structurally independent duplicate. Strings and lists get fresh
    /// allocations (recursively); functions and tasks keep their identity.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Number(n) => Value::Number(*n),
            Value::String(s) => Value::String(Arc::new(s.as_ref().clone())),
            Value::List(items) => {
                Value::List(items.iter().map(Value::deep_copy).collect())
            }
            Value::Function(f) => Value::Function(f.clone()),
            Value::Task(t) => Value::Task(t.clone()),
        }
    }

    /// Entity-specific length: string character count, list item count,
    /// number magnitude, null 0. Functions and tasks have no length.
    pub fn length(&self, span: Span) -> Result<i64, RuntimeError> {
        match self {
            Value::Null => Ok(0),
            Value::Number(n) => Ok(n.abs().round() as i64),
            Value::String(s) => Ok(s.chars().count() as i64),
            Value::List(items) => Ok(items.len() as i64),
            other => Err(RuntimeError::TypeError {
                msg: format!("'length' is not defined for {}", other.type_name()),
                span,
            }),
        }
    }

    /// In-process stable hash, consistent with equality.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Canonical bit pattern for number keys: all NaNs collapse to one
/// representation and -0.0 collapses to 0.0, so Eq and Hash agree.
fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl PartialEq for Value {
    /// Equality contract:
    ///
    /// **Value types** (content equality):
    /// - Number: numeric equality with -0.0 == 0.0 and all NaNs equal
    ///   (values are used as map keys; equality must be total)
    /// - String: content equality
    /// - List: element-wise equality
    /// - Function: compare by name
    ///
    /// **Reference types** (identity equality):
    /// - Task: live runtime objects — only the same handle is equal
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.name == b.name,
            (Value::Task(a), Value::Task(b)) => a.same_task(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Number(n) => {
                1u8.hash(state);
                canonical_bits(*n).hash(state);
            }
            Value::String(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Value::List(items) => {
                3u8.hash(state);
                items.len().hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Value::Function(f) => {
                4u8.hash(state);
                f.name.hash(state);
            }
            Value::Task(t) => {
                5u8.hash(state);
                t.id().hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => {
                // Format number nicely (no trailing .0 for whole numbers)
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s.as_ref()),
            Value::List(items) => {
                let elements: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", elements.join(", "))
            }
            Value::Function(func) => write!(f, "<fn {}>", func.name),
            Value::Task(handle) => write!(f, "<task #{}>", handle.id()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::List(items) => write!(f, "List({:?})", items.as_slice()),
            Value::Function(func) => write!(f, "Function({:?})", func.name),
            Value::Task(handle) => write!(f, "Task(#{})", handle.id()),
        }
    }
}

/// Runtime error type with source span information
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// Type error
    #[error("Type error: {msg}")]
    TypeError { msg: String, span: Span },
    /// Invalid argument shape or count for a builtin
    #[error("{msg}")]
    InvalidArgument { msg: String, span: Span },
    /// Unknown function
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String, span: Span },
}

impl RuntimeError {
    /// Get the source span for this error
    pub fn span(&self) -> Span {
        match self {
            RuntimeError::TypeError { span, .. } => *span,
            RuntimeError::InvalidArgument { span, .. } => *span,
            RuntimeError::UnknownFunction { span, .. } => *span,
        }
    }
}
