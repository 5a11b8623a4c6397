//! Argument and result serialization
//!
//! Turns captured values into expressions of the replay program: registered
//! objects become their variables, byte views become binary cache
//! references, everything else becomes a literal.

use gpurec_shared::Value;

use crate::recorder::Session;

/// Name of the replay program's array of decoded cache entries
pub const CACHE_ARRAY: &str = "D";

/// Reference to a binary cache entry
pub fn cache_reference(index: usize) -> String {
    format!("{CACHE_ARRAY}[{index}]")
}

/// Expression for a captured value
pub(crate) fn expression(session: &mut Session, value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_literal(*n),
        Value::String(s) => string_literal(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|v| expression(session, v)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Dict(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let fields: Vec<String> = map
                .iter()
                .map(|(key, v)| format!("{}: {}", property_key(key), expression(session, v)))
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }
        Value::Object(obj) => session.object_variable(obj),
        Value::Bytes(view) => cache_reference(session.cache().cache_view(view)),
        Value::Image(image) => {
            tracing::warn!(
                width = image.width(),
                height = image.height(),
                "Image source cannot be serialized, recording null"
            );
            "null".to_string()
        }
    }
}

/// Comma-separated argument list, without trailing `undefined` arguments
pub(crate) fn arguments(session: &mut Session, args: &[Value]) -> String {
    let used = args
        .iter()
        .rposition(|v| !v.is_undefined())
        .map_or(0, |last| last + 1);
    args[..used]
        .iter()
        .map(|v| expression(session, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A call statement, optionally assigning its result
pub fn call_statement(
    result: Option<&str>,
    deferred: bool,
    target: &str,
    method: &str,
    args: &str,
) -> String {
    let awaited = if deferred { "await " } else { "" };
    match result {
        Some(result) => format!("{result} = {awaited}{target}.{method}({args});"),
        None => format!("{awaited}{target}.{method}({args});"),
    }
}

/// Number literal; integral values print without a fraction
pub fn number_literal(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

/// String literal safe to embed in an HTML script block
pub fn string_literal(s: &str) -> String {
    // serde_json never fails on a plain string
    serde_json::to_string(s)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        key.to_string()
    } else {
        string_literal(key)
    }
}
