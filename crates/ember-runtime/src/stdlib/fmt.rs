//! Formatted string construction
//!
//! `str(format, ...)` scans the format string for `%`-specifiers, coerces one
//! argument per specifier to the type the conversion demands, and renders the
//! result with C-locale semantics. The scanner accepts
//! `%[index$][flags][width][.precision][t|T]conversion` with conversions
//! `s d o x a e f g b %` (upper-case variants of the letters render
//! upper-cased output).

use crate::expression::Expression;
use crate::span::Span;
use crate::value::{RuntimeError, Value};
use regex::{Captures, Regex};
use std::sync::LazyLock;

// %[argument_index$][flags][width][.precision][t]conversion
static SPEC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%(\d+\$)?([-#+ 0,(<]*)?(\d+)?(\.\d+)?([tT])?([a-zA-Z%])")
        .expect("format specifier pattern")
});

pub(crate) fn register(expr: &mut Expression) {
    expr.add_function("str", |_, args, span| {
        if args.is_empty() {
            return Err(RuntimeError::InvalidArgument {
                msg: "'str' requires at least one argument".to_string(),
                span,
            });
        }
        let format = args[0].to_string();
        // A single list argument supplies the whole argument vector
        let values: Vec<Value> = match args.get(1) {
            Some(Value::List(items)) if args.len() == 2 => items.as_slice().to_vec(),
            _ => args[1..].to_vec(),
        };
        let coerced = coerce_arguments(&format, &values, span)?;
        render(&format, &coerced).map(Value::string).map_err(|detail| {
            RuntimeError::InvalidArgument {
                msg: format!("Illegal string format: {}", detail),
                span,
            }
        })
    });
}

/// One argument, coerced to the type its specifier demands
#[derive(Debug, Clone, PartialEq)]
enum FormatArg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Scan `format` and coerce one value per argument-consuming specifier
fn coerce_arguments(
    format: &str,
    values: &[Value],
    span: Span,
) -> Result<Vec<FormatArg>, RuntimeError> {
    let mut coerced = Vec::new();
    let mut index = 0usize;
    for caps in SPEC_PATTERN.captures_iter(format) {
        let conv_str = &caps[6];
        let conv = conv_str.as_bytes()[0] as char;
        match conv.to_ascii_lowercase() {
            's' => {
                let v = next_value(values, &mut index, &caps[0], span)?;
                coerced.push(FormatArg::Str(v.to_string()));
            }
            'd' | 'o' | 'x' => {
                let v = next_value(values, &mut index, &caps[0], span)?;
                coerced.push(FormatArg::Int(v.as_int(span)?));
            }
            'a' | 'e' | 'f' | 'g' => {
                let v = next_value(values, &mut index, &caps[0], span)?;
                coerced.push(FormatArg::Float(v.as_double(span)?));
            }
            'b' => {
                let v = next_value(values, &mut index, &caps[0], span)?;
                coerced.push(FormatArg::Bool(v.is_truthy()));
            }
            '%' => {}
            _ => {
                return Err(RuntimeError::InvalidArgument {
                    msg: format!("Format not supported: {}", conv_str),
                    span,
                })
            }
        }
    }
    Ok(coerced)
}

fn next_value<'v>(
    values: &'v [Value],
    index: &mut usize,
    specifier: &str,
    span: Span,
) -> Result<&'v Value, RuntimeError> {
    match values.get(*index) {
        Some(v) => {
            *index += 1;
            Ok(v)
        }
        None => Err(RuntimeError::InvalidArgument {
            msg: format!("Not enough arguments for {}", specifier),
            span,
        }),
    }
}

struct Spec {
    index: Option<usize>,
    flags: String,
    width: Option<usize>,
    precision: Option<usize>,
    time: bool,
    conversion: char,
}

impl Spec {
    fn from_captures(caps: &Captures) -> Spec {
        Spec {
            index: caps
                .get(1)
                .and_then(|m| m.as_str().trim_end_matches('$').parse().ok()),
            flags: caps.get(2).map_or(String::new(), |m| m.as_str().to_string()),
            width: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            precision: caps
                .get(4)
                .and_then(|m| m.as_str().trim_start_matches('.').parse().ok()),
            time: caps.get(5).is_some(),
            conversion: caps[6].as_bytes()[0] as char,
        }
    }

    fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }
}

/// Render `format` against the coerced arguments. The error string is the
/// bare detail; the caller wraps it into the runtime error.
fn render(format: &str, args: &[FormatArg]) -> Result<String, String> {
    let mut out = String::new();
    let mut last = 0usize;
    let mut next_index = 0usize;
    let mut previous_index: Option<usize> = None;

    for caps in SPEC_PATTERN.captures_iter(format) {
        let whole = caps
            .get(0)
            .ok_or_else(|| "empty format match".to_string())?;
        out.push_str(&format[last..whole.start()]);
        last = whole.end();

        let spec = Spec::from_captures(&caps);
        if spec.time {
            return Err("time conversions are not supported".to_string());
        }
        if spec.conversion == '%' {
            out.push('%');
            continue;
        }

        let index = if spec.has_flag('<') {
            previous_index.ok_or_else(|| "no previous argument for '<'".to_string())?
        } else if let Some(explicit) = spec.index {
            explicit
                .checked_sub(1)
                .ok_or_else(|| "argument index must be positive".to_string())?
        } else {
            let implicit = next_index;
            next_index += 1;
            implicit
        };
        previous_index = Some(index);

        let arg = args
            .get(index)
            .ok_or_else(|| format!("format argument index out of range: {}$", index + 1))?;
        out.push_str(&render_one(&spec, arg)?);
    }
    out.push_str(&format[last..]);
    Ok(out)
}

fn render_one(spec: &Spec, arg: &FormatArg) -> Result<String, String> {
    let upper = spec.conversion.is_ascii_uppercase();
    let conv = spec.conversion.to_ascii_lowercase();
    let rendered = match conv {
        's' => {
            let text = match arg {
                FormatArg::Str(s) => s.clone(),
                FormatArg::Int(i) => i.to_string(),
                FormatArg::Float(f) => f.to_string(),
                FormatArg::Bool(b) => b.to_string(),
            };
            assemble("", clip(&text, spec.precision), spec, false)
        }
        'b' => {
            let text = match arg {
                FormatArg::Bool(b) => b.to_string(),
                // Any non-boolean argument is present, hence true
                _ => "true".to_string(),
            };
            assemble("", clip(&text, spec.precision), spec, false)
        }
        'd' => format_int(int_arg(arg, conv)?, spec),
        'o' => {
            let body = format!("{:o}", int_arg(arg, conv)? as u64);
            let body = if spec.has_flag('#') {
                format!("0{}", body)
            } else {
                body
            };
            assemble("", body, spec, true)
        }
        'x' => {
            let body = format!("{:x}", int_arg(arg, conv)? as u64);
            let body = if spec.has_flag('#') {
                format!("0x{}", body)
            } else {
                body
            };
            assemble("", body, spec, true)
        }
        'f' => format_float_body(float_arg(arg, conv)?, spec, |v, spec| {
            let body = format!("{:.*}", spec.precision.unwrap_or(6), v);
            if spec.has_flag(',') {
                group_decimal(&body)
            } else {
                body
            }
        }),
        'e' => format_float_body(float_arg(arg, conv)?, spec, |v, spec| {
            sci_body(v, spec.precision.unwrap_or(6))
        }),
        'g' => format_float_body(float_arg(arg, conv)?, spec, |v, spec| {
            general_body(v, spec.precision.unwrap_or(6))
        }),
        'a' => format_float_body(float_arg(arg, conv)?, spec, |v, _| hex_float_body(v)),
        other => return Err(format!("unsupported conversion: {}", other)),
    };
    Ok(if upper { rendered.to_uppercase() } else { rendered })
}

fn int_arg(arg: &FormatArg, conv: char) -> Result<i64, String> {
    match arg {
        FormatArg::Int(i) => Ok(*i),
        other => Err(format!(
            "format specifier '%{}' expects an integer argument, got {:?}",
            conv, other
        )),
    }
}

fn float_arg(arg: &FormatArg, conv: char) -> Result<f64, String> {
    match arg {
        FormatArg::Float(f) => Ok(*f),
        other => Err(format!(
            "format specifier '%{}' expects a floating-point argument, got {:?}",
            conv, other
        )),
    }
}

fn clip(text: &str, precision: Option<usize>) -> String {
    match precision {
        Some(limit) => text.chars().take(limit).collect(),
        None => text.to_string(),
    }
}

fn sign_str(negative: bool, spec: &Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.has_flag('+') {
        "+"
    } else if spec.has_flag(' ') {
        " "
    } else {
        ""
    }
}

/// Pad `sign`+`body` to the requested width: spaces before the sign, or
/// zeros between sign and body for numeric conversions with the `0` flag,
/// or spaces after the body when left-justified.
fn assemble(sign: &str, body: String, spec: &Spec, zero_pad_allowed: bool) -> String {
    let len = sign.chars().count() + body.chars().count();
    match spec.width {
        Some(width) if len < width => {
            let pad = width - len;
            if spec.has_flag('-') {
                format!("{}{}{}", sign, body, " ".repeat(pad))
            } else if zero_pad_allowed && spec.has_flag('0') {
                format!("{}{}{}", sign, "0".repeat(pad), body)
            } else {
                format!("{}{}{}", " ".repeat(pad), sign, body)
            }
        }
        _ => format!("{}{}", sign, body),
    }
}

fn format_int(value: i64, spec: &Spec) -> String {
    let negative = value < 0;
    let mut digits = value.unsigned_abs().to_string();
    if spec.has_flag(',') {
        digits = group_thousands(&digits);
    }
    if negative && spec.has_flag('(') {
        return assemble("", format!("({})", digits), spec, false);
    }
    assemble(sign_str(negative, spec), digits, spec, true)
}

/// Shared non-finite / sign handling for the floating-point conversions;
/// `body` renders the finite magnitude.
fn format_float_body(value: f64, spec: &Spec, body: impl Fn(f64, &Spec) -> String) -> String {
    if value.is_nan() {
        return assemble("", "NaN".to_string(), spec, false);
    }
    if value.is_infinite() {
        let sign = sign_str(value < 0.0, spec);
        return assemble(sign, "Infinity".to_string(), spec, false);
    }
    let negative = value.is_sign_negative();
    assemble(sign_str(negative, spec), body(value.abs(), spec), spec, true)
}

/// Scientific notation with a signed, at-least-two-digit exponent
/// (`3.14e+02`), for a non-negative finite value
fn sci_body(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("+", exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}

/// General notation: `precision` significant digits, scientific when the
/// exponent falls outside [-4, precision)
fn general_body(value: f64, precision: usize) -> String {
    let p = precision.max(1);
    if value == 0.0 {
        return format!("{:.*}", p - 1, 0.0);
    }
    let exp = value.log10().floor() as i32;
    if exp < -4 || exp >= p as i32 {
        sci_body(value, p - 1)
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, value)
    }
}

/// Hexadecimal floating point (`0x1.8p1`), for a non-negative finite value
fn hex_float_body(value: f64) -> String {
    if value == 0.0 {
        return "0x0.0p0".to_string();
    }
    let bits = value.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i64;
    let mantissa = bits & 0x000f_ffff_ffff_ffff;
    let (lead, exp) = if exp_bits == 0 {
        ('0', -1022)
    } else {
        ('1', exp_bits - 1023)
    };
    let mut hex = format!("{:013x}", mantissa);
    while hex.len() > 1 && hex.ends_with('0') {
        hex.pop();
    }
    format!("0x{}.{}p{}", lead, hex, exp)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn group_decimal(body: &str) -> String {
    match body.split_once('.') {
        Some((int_part, frac)) => format!("{}.{}", group_thousands(int_part), frac),
        None => group_thousands(body),
    }
}
