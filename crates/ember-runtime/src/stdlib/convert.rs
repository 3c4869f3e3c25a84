//! Value adapters: coercion, case mapping, regex substitution, output
//!
//! The small eager builtins that reinterpret a value: `bool`, `number`,
//! `type`, `length`, `hash_code`, `copy`, the case mappers, the regex
//! replacers, and `print`.

use crate::context::EvalKind;
use crate::expression::Expression;
use crate::value::{RuntimeError, Value};
use regex::Regex;

pub(crate) fn register(expr: &mut Expression) {
    expr.add_unary_function("hash_code", |_, v, _| {
        // Truncated to 32 bits so the result stays an exact integer Number
        Ok(Value::Number(v.hash_code() as u32 as f64))
    });

    expr.add_unary_function("copy", |_, v, _| Ok(v.deep_copy()));

    expr.add_lazy_function("bool", Some(1), |ctx, _, args, _| {
        let v = args[0].eval(ctx, EvalKind::Boolean)?;
        if let Value::String(s) = &v {
            if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("null") {
                return Ok(Value::FALSE);
            }
        }
        Ok(Value::from_bool(v.is_truthy()))
    });

    expr.add_unary_function("number", |_, v, _| {
        if let Value::Number(_) = v {
            return Ok(v);
        }
        Ok(match parse_number(&v.to_string()) {
            Some(n) => Value::Number(n),
            None => Value::Null,
        })
    });

    expr.add_unary_function("lower", |_, v, _| {
        Ok(Value::string(v.to_string().to_lowercase()))
    });

    expr.add_unary_function("upper", |_, v, _| {
        Ok(Value::string(v.to_string().to_uppercase()))
    });

    expr.add_unary_function("title", |_, v, _| {
        Ok(Value::string(title_case(&v.to_string())))
    });

    expr.add_function("replace", |_, args, span| {
        let (data, re, replacement) = replace_args("replace", &args, span)?;
        Ok(Value::string(
            re.replace_all(&data, replacement.as_str()).into_owned(),
        ))
    });

    expr.add_function("replace_first", |_, args, span| {
        let (data, re, replacement) = replace_args("replace_first", &args, span)?;
        Ok(Value::string(
            re.replace(&data, replacement.as_str()).into_owned(),
        ))
    });

    expr.add_unary_function("type", |_, v, _| Ok(Value::string(v.type_name())));

    expr.add_unary_function("length", |_, v, span| {
        Ok(Value::Number(v.length(span)? as f64))
    });

    expr.add_unary_function("print", |ctx, v, _| {
        ctx.host().print(&v.to_string());
        Ok(v) // pass through for variables
    });
}

/// Numeric grammar for `number`: integer first, then double
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(int as f64);
    }
    trimmed.parse::<f64>().ok()
}

/// First letter of every whitespace-delimited word upper, the rest lower
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

fn replace_args(
    name: &str,
    args: &[Value],
    span: crate::span::Span,
) -> Result<(String, Regex, String), RuntimeError> {
    if args.len() != 2 && args.len() != 3 {
        return Err(RuntimeError::InvalidArgument {
            msg: format!(
                "'{}' expects string to read, pattern regex, and optional replacement string",
                name
            ),
            span,
        });
    }
    let data = args[0].to_string();
    let pattern = args[1].to_string();
    let replacement = if args.len() == 3 {
        args[2].to_string()
    } else {
        String::new()
    };
    let re = Regex::new(&pattern).map_err(|err| RuntimeError::InvalidArgument {
        msg: format!("Invalid regex pattern: {}", err),
        span,
    })?;
    Ok((data, re, replacement))
}
