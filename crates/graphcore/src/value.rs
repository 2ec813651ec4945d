//! JSON value helpers shared by the engine and executors.
//!
//! Node inputs, outputs and configuration are plain JSON, so the engine works
//! directly with [`serde_json::Value`].

pub use serde_json::Value;

/// String-keyed JSON object used for node inputs, outputs and config.
pub type Map = serde_json::Map<String, Value>;

/// Truthiness used by condition nodes.
///
/// `null`, `false`, `0`, `""`, `[]` and `{}` are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Short name of a value's JSON type, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a value for text output: strings verbatim, everything else as compact JSON.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
