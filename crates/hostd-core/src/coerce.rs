//! Lenient value coercions used by the action argument schemas.
//!
//! Callers send untyped JSON. Recognized keys are coerced to the type the
//! action needs; a value that cannot be coerced fails the whole build.
//! `null` always means "not supplied".

use serde_json::{Map, Value};

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn to_bool(v: &Value) -> Result<bool, String> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            other => Err(format!("expected a boolean, got string '{other}'")),
        },
        other => Err(format!("expected a boolean, got {}", kind(other))),
    }
}

pub fn to_int(v: &Value) -> Result<i64, String> {
    match v {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            let t = n.as_f64().map(f64::trunc).unwrap_or(f64::NAN);
            if t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64 {
                Ok(t as i64)
            } else {
                Err(format!("integer out of range: {n}"))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected an integer, got string '{s}'")),
        other => Err(format!("expected an integer, got {}", kind(other))),
    }
}

/// A single name, a number, or a list of those joined with `,`.
pub fn to_name_list(v: &Value) -> Result<String, String> {
    fn scalar(v: &Value) -> Result<String, String> {
        match v {
            Value::String(s) => Ok(s.trim().to_string()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(format!("expected a name, got {}", kind(other))),
        }
    }

    match v {
        Value::Array(items) => {
            let names = items.iter().map(scalar).collect::<Result<Vec<_>, _>>()?;
            Ok(names
                .into_iter()
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(","))
        }
        other => scalar(other),
    }
}

/// Look up `key` and coerce it; absent or `null` yields `None`.
/// Errors are prefixed with the key name.
pub fn field<T>(
    args: &Map<String, Value>,
    key: &str,
    coerce: fn(&Value) -> Result<T, String>,
) -> Result<Option<T>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => coerce(v).map(Some).map_err(|e| format!("{key}: {e}")),
    }
}
