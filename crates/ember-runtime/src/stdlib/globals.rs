//! Process-wide shared globals
//!
//! `system_variable_get` and `system_variable_set` read and write the
//! Value-keyed map every host and task in the process shares. The lazy
//! default of `system_variable_get` is evaluated at most once per missing
//! key; concurrent callers agree on the single installed value.

use crate::context::EvalKind;
use crate::expression::Expression;
use crate::host::ScriptHost;
use crate::value::{RuntimeError, Value};

pub(crate) fn register(expr: &mut Expression) {
    expr.add_lazy_function("system_variable_get", None, |ctx, _, args, span| {
        if args.is_empty() {
            return Err(RuntimeError::InvalidArgument {
                msg: "'system_variable_get' expects at least a key to be fetched".to_string(),
                span,
            });
        }
        let key = args[0].eval(ctx, EvalKind::Value)?;
        if args.len() > 1 {
            let default = &args[1];
            return ScriptHost::system_get_or_insert_with(key, || {
                default.eval(ctx, EvalKind::Value)
            });
        }
        Ok(ScriptHost::system_get(&key).unwrap_or(Value::Null))
    });

    expr.add_lazy_function("system_variable_set", Some(2), |ctx, _, args, _| {
        let key = args[0].eval(ctx, EvalKind::Value)?;
        let value = args[1].eval(ctx, EvalKind::Value)?;
        Ok(ScriptHost::system_set(key, value).unwrap_or(Value::Null))
    });
}
