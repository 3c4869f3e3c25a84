//! Shared fixtures for the integration tests

use ember_runtime::{stdlib, Context, EvalKind, Expression, LazyValue, RuntimeError, ScriptHost, Span, Value};
use std::sync::Arc;

/// Expression with the full system catalog plus a matching context
pub fn fixture() -> (Expression, Context) {
    // Task engine logs are captured per test; opt in with EMBER_LOG
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("EMBER_LOG"))
        .with_test_writer()
        .try_init();

    let host = Arc::new(ScriptHost::new());
    let mut expr = Expression::new("main");
    stdlib::register(&mut expr);
    (expr, Context::new(host, "main"))
}

/// Call a builtin with already-evaluated arguments in plain value context
pub fn call(
    expr: &Expression,
    ctx: &mut Context,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    call_with_kind(expr, ctx, name, args, EvalKind::Value)
}

pub fn call_with_kind(
    expr: &Expression,
    ctx: &mut Context,
    name: &str,
    args: Vec<Value>,
    kind: EvalKind,
) -> Result<Value, RuntimeError> {
    let thunks: Vec<LazyValue> = args.into_iter().map(LazyValue::constant).collect();
    expr.call(name, ctx, kind, &thunks, Span::dummy())
}
