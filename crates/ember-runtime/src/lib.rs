//! Ember Runtime - system function library
//!
//! This library provides the built-in "system" module of the Ember expression
//! language together with the host layer it is registered against:
//! - Value representation and coercion
//! - Function registration (eager and lazy calling conventions)
//! - Randomness and coherent noise
//! - Clock and calendar queries
//! - Variable introspection
//! - Task scheduling, named locks, and process-wide globals

/// Ember runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod context;
pub mod expression;
pub mod host;
pub mod noise;
pub mod span;
pub mod stdlib;
pub mod tasks;
pub mod value;

// Re-export commonly used types
pub use context::{Context, EvalKind};
pub use expression::{Expression, LazyValue};
pub use host::{ScriptHost, SharedRng};
pub use span::Span;
pub use tasks::{TaskHandle, TaskStatus};
pub use value::{FunctionValue, RuntimeError, Value, ValueList};
