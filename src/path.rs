//! Dot-path access into nested documents.
//!
//! A path such as `"info.contact.email"` names a chain of object keys. Lists
//! are leaves: a path never indexes into a list.

use crate::Document;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Resolve `path` against `doc`.
///
/// Returns `None` as soon as a segment is missing or an intermediate is not
/// an object. A stored `null` is returned as `Some(&Value::Null)`.
///
/// # Examples
///
/// ```
/// use fieldlog::path;
/// use serde_json::json;
///
/// let doc = json!({"info": {"name": "v1", "gone": null}});
/// let doc = doc.as_object().unwrap();
///
/// assert_eq!(path::get(doc, "info.name"), Some(&json!("v1")));
/// assert_eq!(path::get(doc, "info.gone"), Some(&json!(null)));
/// assert_eq!(path::get(doc, "info.name.deeper"), None);
/// assert_eq!(path::get(doc, "missing"), None);
/// ```
pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let (parent, last) = match path.rsplit_once('.') {
        None => (doc, path),
        Some((parent_path, last)) => (map_at(doc, parent_path)?, last),
    };
    parent.get(last)
}

/// Whether `path` resolves in `doc`.
pub fn contains(doc: &Document, path: &str) -> bool {
    get(doc, path).is_some()
}

/// Assign `value` at `path`, creating intermediate objects as needed.
///
/// An intermediate that exists but is not an object is replaced with an
/// empty object.
pub fn set(doc: &mut Document, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    set_in(doc, &segments, value);
}

/// Remove the value at `path`, returning it.
///
/// Returns `None` and leaves `doc` untouched when any segment is absent.
pub fn delete(doc: &mut Document, path: &str) -> Option<Value> {
    let (parent, last) = match path.rsplit_once('.') {
        None => (doc, path),
        Some((parent_path, last)) => (map_at_mut(doc, parent_path)?, last),
    };
    parent.remove(last)
}

/// Move the value at `old_path` to `new_path`.
///
/// Persisting a rename is a single store write that unsets the old path and
/// sets the new one; this is the in-memory counterpart.
///
/// # Errors
///
/// Returns [`Error::FieldAbsent`] when `old_path` does not resolve.
pub fn rename(doc: &mut Document, old_path: &str, new_path: &str) -> Result<()> {
    let value = delete(doc, old_path).ok_or_else(|| Error::FieldAbsent {
        path: old_path.to_string(),
    })?;
    set(doc, new_path, value);
    Ok(())
}

fn map_at<'a>(doc: &'a Document, path: &str) -> Option<&'a Document> {
    let mut current = doc;
    for key in path.split('.') {
        current = current.get(key)?.as_object()?;
    }
    Some(current)
}

fn map_at_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Document> {
    let mut current = doc;
    for key in path.split('.') {
        current = current.get_mut(key)?.as_object_mut()?;
    }
    Some(current)
}

fn set_in(map: &mut Document, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match slot {
                Value::Object(child) => set_in(child, rest, value),
                other => {
                    let mut child = Map::new();
                    set_in(&mut child, rest, value);
                    *other = Value::Object(child);
                }
            }
        }
    }
}
