//! Standard and host functions

use arbor_compiler::semantic::builtins;
use arbor_core::expr::{EngineError, EngineResult, ExprValue};
use arbor_core::types::value::format_duration;
use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;
use std::sync::Arc;

/// A function implemented by the host application
///
/// Declared to expressions through a `ValueType::Function` schema element
/// of the same name.
pub type HostFunction = Arc<dyn Fn(&[ExprValue]) -> Result<ExprValue, String> + Send + Sync>;

/// Call a standard function in global style, e.g. `size(x)`
pub(crate) fn call_global(
    function: &str,
    args: &[ExprValue],
    pattern: Option<&Regex>,
) -> EngineResult<ExprValue> {
    match (function, args) {
        (builtins::SIZE, [value]) => size(value),
        (builtins::MATCHES, [text, regex]) => matches(text, regex, pattern),
        (builtins::INT, [value]) => to_int(value),
        (builtins::DOUBLE, [value]) => to_double(value),
        (builtins::STRING, [value]) => to_string(value),
        (builtins::DURATION, [value]) => to_duration(value),
        (builtins::TIMESTAMP, [value]) => to_timestamp(value),
        _ => Err(no_overload(function, args)),
    }
}

/// Call a standard function in receiver style, e.g. `x.size()`
pub(crate) fn call_method(
    function: &str,
    target: &ExprValue,
    args: &[ExprValue],
    pattern: Option<&Regex>,
) -> EngineResult<ExprValue> {
    match (function, target, args) {
        (builtins::SIZE, value, []) => size(value),
        (builtins::CONTAINS, ExprValue::String(s), [ExprValue::String(sub)]) => {
            Ok(ExprValue::Bool(s.contains(sub.as_str())))
        }
        (builtins::STARTS_WITH, ExprValue::String(s), [ExprValue::String(prefix)]) => {
            Ok(ExprValue::Bool(s.starts_with(prefix.as_str())))
        }
        (builtins::ENDS_WITH, ExprValue::String(s), [ExprValue::String(suffix)]) => {
            Ok(ExprValue::Bool(s.ends_with(suffix.as_str())))
        }
        (builtins::MATCHES, text, [regex]) => matches(text, regex, pattern),
        _ => {
            let mut all = vec![target.clone()];
            all.extend_from_slice(args);
            Err(no_overload(function, &all))
        }
    }
}

fn no_overload(function: &str, args: &[ExprValue]) -> EngineError {
    let types: Vec<&str> = args.iter().map(ExprValue::type_name).collect();
    EngineError::Runtime(format!(
        "No matching overload for {}({})",
        function,
        types.join(", ")
    ))
}

fn size(value: &ExprValue) -> EngineResult<ExprValue> {
    let len = match value {
        ExprValue::String(s) => s.chars().count(),
        ExprValue::Bytes(b) => b.len(),
        ExprValue::List(items) => items.len(),
        ExprValue::Map(entries) => entries.len(),
        other => return Err(no_overload(builtins::SIZE, std::slice::from_ref(other))),
    };
    i64::try_from(len)
        .map(ExprValue::Int)
        .map_err(|_| EngineError::Runtime("size overflows int".into()))
}

/// Compile a regular expression
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid regular expression '{}': {}", pattern, e))
}

fn matches(text: &ExprValue, regex: &ExprValue, compiled: Option<&Regex>) -> EngineResult<ExprValue> {
    match (text, regex) {
        (ExprValue::String(text), ExprValue::String(pattern)) => {
            let is_match = match compiled {
                Some(regex) => regex.is_match(text),
                None => compile_pattern(pattern)
                    .map_err(EngineError::Runtime)?
                    .is_match(text),
            };
            Ok(ExprValue::Bool(is_match))
        }
        _ => Err(no_overload(builtins::MATCHES, &[text.clone(), regex.clone()])),
    }
}

fn to_int(value: &ExprValue) -> EngineResult<ExprValue> {
    let out_of_range = || EngineError::Runtime(format!("{} out of int range", value));
    match value {
        ExprValue::Int(i) => Ok(ExprValue::Int(*i)),
        ExprValue::Uint(u) => i64::try_from(*u).map(ExprValue::Int).map_err(|_| out_of_range()),
        ExprValue::Double(d) => {
            // i64::MAX as f64 rounds up to 2^63
            if d.is_finite() && *d >= i64::MIN as f64 && *d < i64::MAX as f64 {
                Ok(ExprValue::Int(d.trunc() as i64))
            } else {
                Err(out_of_range())
            }
        }
        ExprValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map(ExprValue::Int)
            .map_err(|e| EngineError::Runtime(format!("cannot parse {:?} as int: {}", s, e))),
        ExprValue::Timestamp(t) => Ok(ExprValue::Int(t.timestamp())),
        other => Err(no_overload(builtins::INT, std::slice::from_ref(other))),
    }
}

fn to_double(value: &ExprValue) -> EngineResult<ExprValue> {
    match value {
        ExprValue::Int(i) => Ok(ExprValue::Double(*i as f64)),
        ExprValue::Uint(u) => Ok(ExprValue::Double(*u as f64)),
        ExprValue::Double(d) => Ok(ExprValue::Double(*d)),
        ExprValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map(ExprValue::Double)
            .map_err(|e| EngineError::Runtime(format!("cannot parse {:?} as double: {}", s, e))),
        other => Err(no_overload(builtins::DOUBLE, std::slice::from_ref(other))),
    }
}

fn to_string(value: &ExprValue) -> EngineResult<ExprValue> {
    let text = match value {
        ExprValue::String(s) => s.clone(),
        ExprValue::Bool(b) => b.to_string(),
        ExprValue::Int(i) => i.to_string(),
        ExprValue::Uint(u) => u.to_string(),
        ExprValue::Double(d) => d.to_string(),
        ExprValue::Bytes(b) => String::from_utf8(b.clone())
            .map_err(|_| EngineError::Runtime("bytes are not valid UTF-8".into()))?,
        ExprValue::Duration(d) => format_duration(d),
        ExprValue::Timestamp(t) => t.to_rfc3339(),
        other => return Err(no_overload(builtins::STRING, std::slice::from_ref(other))),
    };
    Ok(ExprValue::String(text))
}

fn to_duration(value: &ExprValue) -> EngineResult<ExprValue> {
    match value {
        ExprValue::String(s) => parse_duration(s).map(ExprValue::Duration).map_err(EngineError::Runtime),
        ExprValue::Duration(d) => Ok(ExprValue::Duration(*d)),
        other => Err(no_overload(builtins::DURATION, std::slice::from_ref(other))),
    }
}

fn to_timestamp(value: &ExprValue) -> EngineResult<ExprValue> {
    match value {
        ExprValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| ExprValue::Timestamp(t.with_timezone(&Utc)))
            .map_err(|e| EngineError::Runtime(format!("invalid timestamp {:?}: {}", s, e))),
        ExprValue::Int(seconds) => Utc
            .timestamp_opt(*seconds, 0)
            .single()
            .map(ExprValue::Timestamp)
            .ok_or_else(|| EngineError::Runtime(format!("timestamp {} out of range", seconds))),
        ExprValue::Timestamp(t) => Ok(ExprValue::Timestamp(*t)),
        other => Err(no_overload(builtins::TIMESTAMP, std::slice::from_ref(other))),
    }
}

/// Parse a duration such as `90s`, `1.5h`, `1h30m` or `-250ms`
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid duration {:?}", text);
    let (negative, mut rest) = match text.trim() {
        "" => return Err(invalid()),
        t => match t.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, t.strip_prefix('+').unwrap_or(t)),
        },
    };
    if rest == "0" {
        return Ok(Duration::zero());
    }

    let mut nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "h" => 3_600e9,
            "m" => 60e9,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            "ns" => 1.0,
            _ => return Err(invalid()),
        };
        nanos += number * scale;
        rest = &rest[unit_len..];
    }

    if !nanos.is_finite() || nanos >= i64::MAX as f64 {
        return Err(format!("duration {:?} out of range", text));
    }
    let nanos = nanos.round() as i64;
    Ok(Duration::nanoseconds(if negative { -nanos } else { nanos }))
}
