//! ABOUTME: The dynamic-typed context value and its truthiness rules
//! ABOUTME: serde_json::Value already is the tagged null/bool/number/string/list/object variant spec.md §9 asks for

/// Context values are JSON-compatible. `serde_json::Value` already is the
/// tagged variant (null / bool / number / string / list / object) spec.md §9
/// asks implementers in statically typed languages to use, so the kernel
/// re-exports it directly rather than wrapping it.
pub type Value = serde_json::Value;

/// Truthiness used by the condition evaluator (§4.1) and by emission
/// selection (§4.5 step 5, §4.6 step 4). Missing fields render as the string
/// `"undefined"` and are falsy; everything else follows JSON-ish truthiness:
/// `null`, `false`, `0`, `""`, empty arrays, and empty objects are falsy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "undefined",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
