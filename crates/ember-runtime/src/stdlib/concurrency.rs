//! Task and synchronization builtins
//!
//! `task` schedules a script function on the task engine with a fork of the
//! calling context; the rest of the family observes or joins the returned
//! handle. `synchronize` wraps the evaluation of an expression in a named
//! reentrant lock.

use crate::context::{Context, EvalKind};
use crate::expression::Expression;
use crate::span::Span;
use crate::tasks::{self, TaskHandle};
use crate::value::{FunctionValue, RuntimeError, Value};
use std::thread;

pub(crate) fn register(expr: &mut Expression) {
    expr.add_lazy_function_with_delegation("task", None, |ctx, _, expr, args, span| {
        if args.is_empty() {
            return Err(RuntimeError::InvalidArgument {
                msg: "'task' requires at least function to call as a parameter".to_string(),
                span,
            });
        }
        let function_value = args[0].eval(ctx, EvalKind::Value)?;
        let function = resolve_function(ctx, expr.module(), function_value, span)?;

        // Argument-discovery protocol: an optional list bundles the call
        // arguments; whatever remains after the function bundle is the
        // queue key.
        let (call_args, queue) = match args.len() {
            1 => (Vec::new(), Value::Null),
            _ => {
                let second = args[1].eval(ctx, EvalKind::Value)?;
                if let Value::List(items) = second {
                    let queue = if args.len() > 2 {
                        args[2].eval(ctx, EvalKind::Value)?
                    } else {
                        Value::Null
                    };
                    (items.into_vec(), queue)
                } else {
                    (Vec::new(), second)
                }
            }
        };

        let mut task_ctx = ctx.fork();
        let handle = tasks::submit(queue, move || {
            function.call(&mut task_ctx, call_args, span)
        });
        thread::yield_now();
        Ok(Value::Task(handle))
    });

    expr.add_function("task_count", |_, args, _| {
        let count = match args.first() {
            Some(queue) => tasks::task_count_for(queue),
            None => tasks::task_count(),
        };
        Ok(Value::Number(count as f64))
    });

    expr.add_unary_function("task_value", |_, v, span| {
        let handle = expect_task(&v, "task_value", span)?;
        match handle.value() {
            None => Ok(Value::Null),
            Some(outcome) => outcome,
        }
    });

    expr.add_unary_function("task_join", |_, v, span| {
        let handle = expect_task(&v, "task_join", span)?;
        handle.join()
    });

    expr.add_unary_function("task_completed", |_, v, span| {
        let handle = expect_task(&v, "task_completed", span)?;
        Ok(Value::from_bool(handle.is_finished()))
    });

    // Reserved hook for docking work onto a host-owned main thread; the
    // ambient scheduler has none, so this is the identity on its argument.
    expr.add_lazy_function("task_dock", Some(1), |ctx, kind, args, _| {
        args[0].eval(ctx, kind)
    });

    expr.add_lazy_function("synchronize", None, |ctx, kind, args, span| {
        if args.is_empty() {
            return Err(RuntimeError::InvalidArgument {
                msg: "'synchronize' require at least an expression to synchronize".to_string(),
                span,
            });
        }
        if args.len() > 2 {
            return Err(RuntimeError::InvalidArgument {
                msg: "'synchronize' expects an optional lock value and an expression".to_string(),
                span,
            });
        }
        let (key, body_index) = if args.len() == 2 {
            (args[0].eval(ctx, EvalKind::Value)?, 1)
        } else {
            (Value::Null, 0)
        };
        let lock = tasks::lock_for(&key);
        let _guard = lock.lock();
        // The guard drops on every exit path, including the error one
        args[body_index].eval(ctx, kind)
    });
}

fn resolve_function(
    ctx: &Context,
    module: &str,
    value: Value,
    span: Span,
) -> Result<FunctionValue, RuntimeError> {
    match value {
        Value::Function(function) => Ok(function),
        other => {
            let name = other.to_string();
            ctx.host()
                .get_function(module, &name)
                .ok_or(RuntimeError::UnknownFunction { name, span })
        }
    }
}

fn expect_task<'v>(
    v: &'v Value,
    builtin: &str,
    span: Span,
) -> Result<&'v TaskHandle, RuntimeError> {
    match v {
        Value::Task(handle) => Ok(handle),
        _ => Err(RuntimeError::InvalidArgument {
            msg: format!("'{}' could only be used with a task value", builtin),
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::testutil::{call, fixture};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn double_fn() -> Value {
        Value::Function(FunctionValue::new("double", Some(1), |_, args| {
            Ok(Value::Number(args[0].as_double(Span::dummy())? * 2.0))
        }))
    }

    #[test]
    fn test_task_runs_function_with_list_args() {
        let (expr, mut ctx) = fixture();
        let handle = call(
            &expr,
            &mut ctx,
            "task",
            vec![double_fn(), Value::list(vec![Value::Number(21.0)])],
        )
        .unwrap();
        let joined = call(&expr, &mut ctx, "task_join", vec![handle]).unwrap();
        assert_eq!(joined, Value::Number(42.0));
    }

    #[test]
    fn test_task_resolves_function_by_name() {
        let (expr, mut ctx) = fixture();
        ctx.host().define_function(
            "sys_test",
            FunctionValue::new("answer", Some(0), |_, _| Ok(Value::Number(42.0))),
        );
        let handle = call(&expr, &mut ctx, "task", vec![Value::string("answer")]).unwrap();
        let joined = call(&expr, &mut ctx, "task_join", vec![handle]).unwrap();
        assert_eq!(joined, Value::Number(42.0));
    }

    #[test]
    fn test_task_unknown_function_name() {
        let (expr, mut ctx) = fixture();
        let err = call(&expr, &mut ctx, "task", vec![Value::string("no_such_fn")]).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownFunction { .. }));
    }

    #[test]
    fn test_task_no_arguments_is_an_error() {
        let (expr, mut ctx) = fixture();
        assert!(call(&expr, &mut ctx, "task", vec![]).is_err());
    }

    #[test]
    fn test_task_captures_forked_context() {
        let (expr, mut ctx) = fixture();
        ctx.set_var("n", Value::Number(5.0));
        let reader = Value::Function(FunctionValue::new("read_n", Some(0), |ctx, _| {
            Ok(ctx.get_var("n").unwrap_or(Value::Null))
        }));
        let handle = call(&expr, &mut ctx, "task", vec![reader]).unwrap();
        // Mutating the parent after submission must not affect the task
        ctx.set_var("n", Value::Number(99.0));
        let joined = call(&expr, &mut ctx, "task_join", vec![handle]).unwrap();
        assert_eq!(joined, Value::Number(5.0));
    }

    #[test]
    fn test_task_value_non_blocking_then_result() {
        let (expr, mut ctx) = fixture();
        let slow = Value::Function(FunctionValue::new("slow", Some(0), |_, _| {
            thread::sleep(Duration::from_millis(60));
            Ok(Value::string("done"))
        }));
        let handle = call(&expr, &mut ctx, "task", vec![slow]).unwrap();
        // Immediately after submission the task is almost surely unfinished
        let early = call(&expr, &mut ctx, "task_value", vec![handle.clone()]).unwrap();
        let _ = early; // Null or the result, depending on scheduling
        call(&expr, &mut ctx, "task_join", vec![handle.clone()]).unwrap();
        let late = call(&expr, &mut ctx, "task_value", vec![handle]).unwrap();
        assert_eq!(late, Value::string("done"));
    }

    #[test]
    fn test_task_family_rejects_non_tasks() {
        let (expr, mut ctx) = fixture();
        for builtin in ["task_value", "task_join", "task_completed"] {
            let err = call(&expr, &mut ctx, builtin, vec![Value::Number(1.0)]).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("'{}' could only be used with a task value", builtin)
            );
        }
    }

    #[test]
    fn test_task_completed_transitions_once() {
        let (expr, mut ctx) = fixture();
        let handle = call(&expr, &mut ctx, "task", vec![double_fn(), Value::list(vec![Value::Number(1.0)])]).unwrap();
        call(&expr, &mut ctx, "task_join", vec![handle.clone()]).unwrap();
        for _ in 0..3 {
            let completed =
                call(&expr, &mut ctx, "task_completed", vec![handle.clone()]).unwrap();
            assert_eq!(completed, Value::TRUE);
        }
    }

    #[test]
    fn test_task_join_reraises_error() {
        let (expr, mut ctx) = fixture();
        let failing = Value::Function(FunctionValue::new("failing", Some(0), |_, _| {
            Err(RuntimeError::InvalidArgument {
                msg: "task body failed".to_string(),
                span: Span::dummy(),
            })
        }));
        let handle = call(&expr, &mut ctx, "task", vec![failing]).unwrap();
        let err = call(&expr, &mut ctx, "task_join", vec![handle.clone()]).unwrap_err();
        assert_eq!(err.to_string(), "task body failed");
        // Completed, with an error
        assert_eq!(
            call(&expr, &mut ctx, "task_completed", vec![handle]).unwrap(),
            Value::TRUE
        );
    }

    #[test]
    fn test_queued_tasks_run_in_submission_order() {
        let (expr, mut ctx) = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue_key = Value::string("concurrency-test-queue");

        let mut handles = Vec::new();
        for i in 0..6 {
            let log = Arc::clone(&log);
            let appender = Value::Function(FunctionValue::new("append", Some(0), move |_, _| {
                log.lock().unwrap().push(i);
                Ok(Value::Null)
            }));
            let handle = call(
                &expr,
                &mut ctx,
                "task",
                vec![appender, Value::list(vec![]), queue_key.clone()],
            )
            .unwrap();
            handles.push(handle);
        }
        for handle in handles {
            call(&expr, &mut ctx, "task_join", vec![handle]).unwrap();
        }
        assert_eq!(*log.lock().unwrap(), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_task_count_with_queue_key() {
        let (expr, mut ctx) = fixture();
        let queue_key = Value::string("concurrency-test-count");
        let slow = Value::Function(FunctionValue::new("slow_count", Some(0), |_, _| {
            thread::sleep(Duration::from_millis(40));
            Ok(Value::Null)
        }));
        let handle = call(
            &expr,
            &mut ctx,
            "task",
            vec![slow, Value::list(vec![]), queue_key.clone()],
        )
        .unwrap();
        let pending = call(&expr, &mut ctx, "task_count", vec![queue_key.clone()]).unwrap();
        assert_eq!(pending, Value::Number(1.0));
        call(&expr, &mut ctx, "task_join", vec![handle]).unwrap();
        let drained = call(&expr, &mut ctx, "task_count", vec![queue_key]).unwrap();
        assert_eq!(drained, Value::Number(0.0));
    }

    #[test]
    fn test_task_dock_is_identity() {
        let (expr, mut ctx) = fixture();
        let v = call(&expr, &mut ctx, "task_dock", vec![Value::Number(7.0)]).unwrap();
        assert_eq!(v, Value::Number(7.0));
    }

    #[test]
    fn test_synchronize_arity() {
        let (expr, mut ctx) = fixture();
        assert!(call(&expr, &mut ctx, "synchronize", vec![]).is_err());
        assert!(call(
            &expr,
            &mut ctx,
            "synchronize",
            vec![Value::Null, Value::Null, Value::Null]
        )
        .is_err());
    }

    #[test]
    fn test_synchronize_returns_body_value() {
        let (expr, mut ctx) = fixture();
        assert_eq!(
            call(&expr, &mut ctx, "synchronize", vec![Value::Number(3.0)]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            call(
                &expr,
                &mut ctx,
                "synchronize",
                vec![Value::string("lock-key"), Value::Number(4.0)]
            )
            .unwrap(),
            Value::Number(4.0)
        );
    }

    #[test]
    fn test_synchronize_is_reentrant() {
        // A nested synchronize on the same key from the same thread must not
        // deadlock
        let (expr, mut ctx) = fixture();
        let key = Value::string("concurrency-test-reentrant");
        let lock = tasks::lock_for(&key);
        let _outer = lock.lock();
        let result = call(
            &expr,
            &mut ctx,
            "synchronize",
            vec![key, Value::Number(1.0)],
        )
        .unwrap();
        assert_eq!(result, Value::Number(1.0));
    }

    #[test]
    fn test_synchronize_excludes_other_holders() {
        let key = Value::string("concurrency-test-mutex");
        let lock = tasks::lock_for(&key);
        let witness = Arc::new(Mutex::new(0u32));

        let guard = lock.lock();
        let contender = {
            let witness = Arc::clone(&witness);
            let key = key.clone();
            thread::spawn(move || {
                let (expr, mut ctx) = fixture();
                let witness_inner = Arc::clone(&witness);
                let body = Value::Function(FunctionValue::new("bump", Some(0), move |_, _| {
                    *witness_inner.lock().unwrap() += 1;
                    Ok(Value::Null)
                }));
                // The body thunk evaluates inside the critical section
                let thunks = vec![
                    crate::expression::LazyValue::constant(key),
                    crate::expression::LazyValue::new(move |ctx, _| {
                        body_call(&body, ctx)
                    }),
                ];
                expr.call(
                    "synchronize",
                    &mut ctx,
                    EvalKind::Value,
                    &thunks,
                    Span::dummy(),
                )
                .unwrap();
            })
        };

        // While this thread holds the lock the contender cannot run its body
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*witness.lock().unwrap(), 0);
        drop(guard);
        contender.join().unwrap();
        assert_eq!(*witness.lock().unwrap(), 1);
    }

    fn body_call(body: &Value, ctx: &mut Context) -> Result<Value, RuntimeError> {
        match body {
            Value::Function(f) => f.call(ctx, Vec::new(), Span::dummy()),
            _ => unreachable!(),
        }
    }
}
