//! Evaluation context
//!
//! A `Context` is the mutable state an expression evaluates against: the
//! owning host, the module the expression belongs to, and the local variable
//! bindings. Tasks receive a fork of the launching context so their writes
//! never race with the parent.

use crate::host::ScriptHost;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluation context tag passed to lazy arguments.
///
/// `Boolean` marks call sites that will coerce the result to a boolean,
/// letting builtins like `rand` pick a cheaper or differently-shaped result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalKind {
    /// Plain value position
    Value,
    /// Boolean-coercion position
    Boolean,
}

/// Per-evaluation variable bindings plus a handle to the host
pub struct Context {
    host: Arc<ScriptHost>,
    module: Arc<str>,
    vars: HashMap<String, Value>,
}

impl Context {
    pub fn new(host: Arc<ScriptHost>, module: impl Into<Arc<str>>) -> Self {
        Context {
            host,
            module: module.into(),
            vars: HashMap::new(),
        }
    }

    pub fn host(&self) -> &Arc<ScriptHost> {
        &self.host
    }

    /// Name of the module this context evaluates in
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Read a local variable
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    /// Read a local variable, creating a Null binding if absent
    pub fn get_or_create_var(&mut self, name: &str) -> Value {
        self.vars.entry(name.to_string()).or_insert(Value::Null).clone()
    }

    /// Bind a local variable
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Remove a single local variable
    pub fn del_var(&mut self, name: &str) {
        self.vars.remove(name);
    }

    /// All local variable names, unordered
    pub fn var_names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    /// Remove every local variable whose name starts with `prefix`
    pub fn remove_vars_matching(&mut self, prefix: &str) {
        self.vars.retain(|name, _| !name.starts_with(prefix));
    }

    /// Independent copy for a task: same host and module, snapshotted locals.
    /// Writes on either side are invisible to the other.
    pub fn fork(&self) -> Context {
        Context {
            host: Arc::clone(&self.host),
            module: Arc::clone(&self.module),
            vars: self.vars.clone(),
        }
    }
}
