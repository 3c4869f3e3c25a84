//! Clock and calendar builtins
//!
//! `time` reads a monotonic clock for duration measurement; `unix_time` is
//! wall time in epoch milliseconds. `convert_date` maps between epoch millis
//! and calendar parts under UTC and the proleptic Gregorian calendar.

use crate::context::EvalKind;
use crate::expression::Expression;
use crate::value::{RuntimeError, Value};
use chrono::{Datelike, TimeZone, Timelike, Utc};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

static PROCESS_START: LazyLock<Instant> = LazyLock::new(Instant::now);

pub(crate) fn register(expr: &mut Expression) {
    expr.add_lazy_function("time", Some(0), |_, _, _, _| {
        let micros = PROCESS_START.elapsed().as_micros() as f64;
        Ok(Value::Number(micros / 1000.0))
    });

    expr.add_lazy_function("unix_time", Some(0), |_, _, _, _| {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(Value::Number(millis as f64))
    });

    expr.add_unary_function("sleep", |_, v, span| {
        let millis = v.as_int(span)?;
        thread::sleep(Duration::from_millis(millis.max(0) as u64));
        thread::yield_now();
        Ok(v) // pass through for variables
    });

    expr.add_lazy_function("profile_expr", Some(1), |ctx, _, args, _| {
        let deadline = Instant::now() + Duration::from_millis(50);
        let mut iterations: u64 = 0;
        while Instant::now() < deadline {
            args[0].eval(ctx, EvalKind::Value)?;
            iterations += 1;
        }
        Ok(Value::Number(iterations as f64))
    });

    expr.add_function("convert_date", |_, args, span| {
        if args.is_empty() {
            return Err(RuntimeError::InvalidArgument {
                msg: "'convert_date' requires at least one parameter".to_string(),
                span,
            });
        }

        // Millis to calendar parts
        if args.len() == 1 && !matches!(args[0], Value::List(_)) {
            let millis = args[0].as_int(span)?;
            let date = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| RuntimeError::InvalidArgument {
                    msg: format!("Invalid timestamp: {}", millis),
                    span,
                })?;
            return Ok(Value::list_of_nums([
                date.year() as f64,
                date.month() as f64,
                date.day() as f64,
                date.hour() as f64,
                date.minute() as f64,
                date.second() as f64,
                date.weekday().number_from_monday() as f64, // Mon=1 .. Sun=7
                date.ordinal() as f64,
                date.iso_week().week() as f64,
            ]));
        }

        // Calendar parts to millis; a single list argument is unpacked
        let parts: Vec<i64> = match &args[0] {
            Value::List(items) => items
                .iter()
                .map(|v| v.as_int(span))
                .collect::<Result<_, _>>()?,
            _ => args
                .iter()
                .map(|v| v.as_int(span))
                .collect::<Result<_, _>>()?,
        };

        let (hour, minute, second) = match parts.len() {
            3 => (0, 0, 0),
            6 => (parts[3], parts[4], parts[5]),
            _ => {
                return Err(RuntimeError::InvalidArgument {
                    msg: "Date conversion requires 3 arguments for Dates or 6 arguments, for time"
                        .to_string(),
                    span,
                })
            }
        };

        let date = Utc
            .with_ymd_and_hms(
                parts[0] as i32,
                parts[1] as u32,
                parts[2] as u32,
                hour as u32,
                minute as u32,
                second as u32,
            )
            .single()
            .ok_or_else(|| RuntimeError::InvalidArgument {
                msg: format!(
                    "Invalid date components: {}",
                    parts
                        .iter()
                        .map(|p| p.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                span,
            })?;
        Ok(Value::Number(date.timestamp_millis() as f64))
    });
}
