use anyhow::{bail, Result};
use serde_json::Value;

use crate::util::{clamp_i64, parse_bool_str};

pub(crate) fn first_string<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
}

/// First string under any of `keys`, trimmed; empty counts as missing.
pub(crate) fn required_string<'a>(
    args: &'a Value,
    canonical_key: &str,
    keys: &[&str],
) -> Result<&'a str> {
    let value = first_string(args, keys).map(str::trim).unwrap_or("");
    if value.is_empty() {
        bail!("{canonical_key} is required.");
    }
    Ok(value)
}

/// Like [`required_string`] but keeps surrounding whitespace.
pub(crate) fn required_string_preserve<'a>(
    args: &'a Value,
    canonical_key: &str,
    keys: &[&str],
) -> Result<&'a str> {
    let value = first_string(args, keys).unwrap_or("");
    if value.is_empty() {
        bail!("{canonical_key} is required.");
    }
    Ok(value)
}

/// Integers arrive as JSON numbers (floored) or numeric strings.
pub(crate) fn integer(args: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match args.get(*key)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v.floor() as i64)),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.floor() as i64),
        _ => None,
    })
}

/// Zero-based line clamped into `[0, line_count - 1]`; missing means 0.
pub(crate) fn line(args: &Value, keys: &[&str], line_count: usize) -> usize {
    let last = line_count.saturating_sub(1) as i64;
    clamp_i64(integer(args, keys).unwrap_or(0), 0, last) as usize
}

/// Zero-based column, never negative.
pub(crate) fn column(args: &Value, keys: &[&str]) -> usize {
    integer(args, keys).unwrap_or(0).max(0) as usize
}

pub(crate) fn count(args: &Value, key: &str, default: i64, min: i64, max: i64) -> usize {
    clamp_i64(integer(args, &[key]).unwrap_or(default), min, max) as usize
}

pub(crate) fn flag(args: &Value, key: &str) -> bool {
    match args.get(key) {
        Some(Value::Bool(value)) => *value,
        Some(Value::String(text)) => parse_bool_str(text).unwrap_or(false),
        _ => false,
    }
}
