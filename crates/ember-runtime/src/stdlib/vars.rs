//! Variable introspection builtins
//!
//! Three scopes are distinguished by name prefix: `global_...` lives in the
//! host's per-module global registry, names starting with `_` are local-only
//! and exempt from bulk deletion, everything else is a per-context local.

use crate::context::EvalKind;
use crate::expression::Expression;
use crate::value::Value;
use std::sync::Arc;

pub(crate) fn register(expr: &mut Expression) {
    expr.add_lazy_function("var", Some(1), |ctx, _, args, _| {
        let name = args[0].eval(ctx, EvalKind::Value)?.to_string();
        if name.starts_with("global_") {
            let host = Arc::clone(ctx.host());
            let module = ctx.module().to_string();
            Ok(host.get_or_create_global(&module, &name))
        } else {
            Ok(ctx.get_or_create_var(&name))
        }
    });

    expr.add_lazy_function("undef", Some(1), |ctx, _, args, _| {
        let target = args[0].eval(ctx, EvalKind::Value)?;
        let host = Arc::clone(ctx.host());
        let module = ctx.module().to_string();

        if let Value::Function(function) = &target {
            host.del_function(&module, function.name());
            return Ok(Value::Null);
        }

        let mut name = target.to_string();
        let is_prefix = name.ends_with('*');
        while name.ends_with('*') {
            name.pop();
        }

        if is_prefix {
            host.del_functions_with_prefix(&module, &name);
            if name.starts_with("global_") {
                host.del_globals_with_prefix(&module, &name);
            } else if !name.starts_with('_') {
                ctx.remove_vars_matching(&name);
            }
        } else {
            host.del_function(&module, &name);
            if name.starts_with("global_") {
                host.del_global(&module, &name);
            } else if !name.starts_with('_') {
                ctx.del_var(&name);
            }
        }
        Ok(Value::Null)
    });

    expr.add_lazy_function("vars", Some(1), |ctx, _, args, _| {
        let prefix = args[0].eval(ctx, EvalKind::Value)?.to_string();
        let mut names = if prefix.starts_with("global") {
            let host = Arc::clone(ctx.host());
            let module = ctx.module().to_string();
            host.global_names(&module, |name| name.starts_with(&prefix))
        } else {
            ctx.var_names()
                .into_iter()
                .filter(|name| name.starts_with(&prefix))
                .collect()
        };
        names.sort();
        Ok(Value::List(names.into_iter().map(Value::string).collect()))
    });
}
