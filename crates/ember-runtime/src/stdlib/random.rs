//! Randomness and coherent noise builtins
//!
//! `rand` draws from the host's shared default generator, or from a cached
//! per-seed generator when a seed argument is given. `perlin` and `simplex`
//! sample the deterministic noise lattices; the optional trailing seed picks
//! a cached seeded sampler.

use crate::context::EvalKind;
use crate::expression::Expression;
use crate::noise::{PerlinSampler, SimplexSampler};
use crate::value::{RuntimeError, Value};

pub(crate) fn register(expr: &mut Expression) {
    expr.add_lazy_function("rand", None, |ctx, kind, args, span| {
        if args.len() != 1 && args.len() != 2 {
            return Err(RuntimeError::InvalidArgument {
                msg: "'rand' takes one (range) or two arguments (range and seed)".to_string(),
                span,
            });
        }
        let rng = if args.len() == 2 {
            let seed = args[1].eval(ctx, EvalKind::Value)?.as_int(span)?;
            ctx.host().random(Some(seed))
        } else {
            ctx.host().random(None)
        };
        let argument = args[0].eval(ctx, EvalKind::Value)?;
        if let Value::List(items) = &argument {
            if items.is_empty() {
                return Err(RuntimeError::InvalidArgument {
                    msg: "'rand' cannot choose from an empty list".to_string(),
                    span,
                });
            }
            return Ok(items[rng.next_below(items.len())].clone());
        }
        if kind == EvalKind::Boolean {
            // Weighted coin: range * f32 draw, below 1 is false
            let drawn = argument.as_double(span)? * rng.next_f32() as f64;
            return Ok(Value::from_bool(drawn >= 1.0));
        }
        Ok(Value::Number(argument.as_double(span)? * rng.next_f64()))
    });

    expr.add_lazy_function("perlin", None, |ctx, _, args, span| {
        let sampler;
        let x;
        let y;
        let z;
        if args.len() >= 4 {
            x = args[0].eval(ctx, EvalKind::Value)?;
            y = args[1].eval(ctx, EvalKind::Value)?;
            z = args[2].eval(ctx, EvalKind::Value)?;
            let seed = args[3].eval(ctx, EvalKind::Value)?.as_int(span)?;
            sampler = PerlinSampler::seeded(seed);
        } else {
            sampler = PerlinSampler::default_instance();
            if args.is_empty() {
                return Err(RuntimeError::InvalidArgument {
                    msg: "'perlin' requires at least one dimension to sample from".to_string(),
                    span,
                });
            }
            x = args[0].eval(ctx, EvalKind::Value)?;
            y = if args.len() > 1 {
                args[1].eval(ctx, EvalKind::Value)?
            } else {
                Value::Null
            };
            z = if args.len() > 2 {
                args[2].eval(ctx, EvalKind::Value)?
            } else {
                Value::Null
            };
        }

        let result = if matches!(z, Value::Null) {
            if matches!(y, Value::Null) {
                sampler.sample1d(x.as_double(span)?)
            } else {
                sampler.sample2d(x.as_double(span)?, y.as_double(span)?)
            }
        } else {
            sampler.sample3d(x.as_double(span)?, y.as_double(span)?, z.as_double(span)?)
        };
        Ok(Value::Number(result))
    });

    expr.add_lazy_function("simplex", None, |ctx, _, args, span| {
        let sampler;
        let x;
        let y;
        let z;
        if args.len() >= 4 {
            x = args[0].eval(ctx, EvalKind::Value)?;
            y = args[1].eval(ctx, EvalKind::Value)?;
            z = args[2].eval(ctx, EvalKind::Value)?;
            let seed = args[3].eval(ctx, EvalKind::Value)?.as_int(span)?;
            sampler = SimplexSampler::seeded(seed);
        } else {
            sampler = SimplexSampler::default_instance();
            if args.len() < 2 {
                return Err(RuntimeError::InvalidArgument {
                    msg: "'simplex' requires at least two dimensions to sample from".to_string(),
                    span,
                });
            }
            x = args[0].eval(ctx, EvalKind::Value)?;
            y = args[1].eval(ctx, EvalKind::Value)?;
            z = if args.len() > 2 {
                args[2].eval(ctx, EvalKind::Value)?
            } else {
                Value::Null
            };
        }

        let result = if matches!(z, Value::Null) {
            sampler.sample2d(x.as_double(span)?, y.as_double(span)?)
        } else {
            sampler.sample3d(x.as_double(span)?, y.as_double(span)?, z.as_double(span)?)
        };
        Ok(Value::Number(result))
    });
}
