//! Canonicalization of incoming raw values, and the element-set view of a
//! stored value that the diff and restore paths operate on.

use serde_json::Value;

/// Canonicalize a raw incoming value for storage and comparison.
///
/// Strings are interpreted: `"true"`/`"false"` become booleans and `"none"`
/// becomes null (case-insensitive, surrounding whitespace ignored), and text
/// containing `;` is split into an ordered list of strings. Every other
/// value passes through untouched.
///
/// # Examples
///
/// ```
/// use fieldlog::normalize;
/// use serde_json::json;
///
/// assert_eq!(normalize(json!(" TRUE ")), json!(true));
/// assert_eq!(normalize(json!("None")), json!(null));
/// assert_eq!(normalize(json!("a;b;a")), json!(["a", "b", "a"]));
/// assert_eq!(normalize(json!("Plain Text")), json!("Plain Text"));
/// assert_eq!(normalize(json!(42)), json!(42));
/// ```
pub fn normalize(raw: Value) -> Value {
    match raw {
        Value::String(text) => normalize_str(&text),
        other => other,
    }
}

/// Canonicalize a textual raw value. See [`normalize`].
pub fn normalize_str(raw: &str) -> Value {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "none" => Value::Null,
        _ if raw.contains(';') => Value::Array(
            raw.split(';')
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    }
}

/// The element sequence of a value: a list is itself, null is empty, and
/// anything else is a single element.
pub fn elements(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Like [`elements`], treating an absent value as empty.
pub fn elements_of(value: Option<&Value>) -> Vec<Value> {
    value.map(elements).unwrap_or_default()
}

/// Fold an element sequence back into a value: no elements is null, one
/// element is that element, more stay a list.
pub fn collapse(mut elements: Vec<Value>) -> Value {
    match elements.len() {
        0 => Value::Null,
        1 => elements.remove(0),
        _ => Value::Array(elements),
    }
}

/// Scalars (including null) compare directly; lists and objects do not.
pub fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// An order-independent, hashable rendering of a value.
///
/// Object keys are emitted sorted at every depth, so two objects holding the
/// same fields in a different insertion order share a key.
pub fn canonical_key(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
