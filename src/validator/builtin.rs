//! Built-in leaf validators.
//!
//! A deliberately small set covering the common cases; each is a thin
//! factory over [`ValidatorFactory`] and doubles as the reference pattern
//! for user-defined validators. Raw values arrive as strings from the
//! process environment or as structured values from an injected bootstrap
//! snapshot, so every predicate accepts both forms where that makes sense.
//!
//! All parsing here is a single linear pass over the input; structured
//! input is delegated to `serde_json`.

use serde_json::Value;

use super::{EnvValidator, ValidatorFactory, ValidatorOptions};
use crate::errors::Issue;

/// Any UTF-8 string, passed through verbatim.
pub fn string(options: ValidatorOptions) -> EnvValidator {
    ValidatorFactory::new(|raw: &Value| match raw {
        Value::String(_) => Ok(raw.clone()),
        other => Err(vec![Issue::root(format!(
            "expected a string, got {}",
            value_kind(other)
        ))]),
    })
    .build(options)
}

/// A 64-bit signed integer, accepted as a number or a decimal string.
pub fn int(options: ValidatorOptions) -> EnvValidator {
    ValidatorFactory::new(|raw: &Value| parse_i64(raw).map(Value::from)).build(options)
}

/// A TCP port: an integer in 1..=65535.
pub fn port(options: ValidatorOptions) -> EnvValidator {
    ValidatorFactory::new(|raw: &Value| {
        let n = parse_i64(raw)?;
        if (1..=65535).contains(&n) {
            Ok(Value::from(n))
        } else {
            Err(vec![Issue::root(format!(
                "expected a TCP port (1-65535), got {n}"
            ))])
        }
    })
    .build(options)
}

/// A boolean, accepted as `true`/`false`/`1`/`0` or a JSON boolean.
pub fn boolean(options: ValidatorOptions) -> EnvValidator {
    ValidatorFactory::new(|raw: &Value| match raw {
        Value::Bool(_) => Ok(raw.clone()),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            other => Err(vec![Issue::root(format!(
                "expected true/false/1/0, got \"{other}\""
            ))]),
        },
        other => Err(vec![Issue::root(format!(
            "expected a boolean, got {}",
            value_kind(other)
        ))]),
    })
    .build(options)
}

/// An arbitrary JSON document: strings are parsed, structured values pass
/// through unchanged.
pub fn json(options: ValidatorOptions) -> EnvValidator {
    ValidatorFactory::new(|raw: &Value| match raw {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| vec![Issue::root(format!("invalid JSON: {e}"))]),
        other => Ok(other.clone()),
    })
    .build(options)
}

fn parse_i64(raw: &Value) -> Result<i64, Vec<Issue>> {
    match raw {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            vec![Issue::root(format!("expected an integer, got {n}"))]
        }),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            vec![Issue::root(format!("expected an integer, got \"{s}\""))]
        }),
        other => Err(vec![Issue::root(format!(
            "expected an integer, got {}",
            value_kind(other)
        ))]),
    }
}

/// JSON type name for error messages.
fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
