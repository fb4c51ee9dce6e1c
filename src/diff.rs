//! Structured diffs between field values and between whole documents.
//!
//! Values are compared as element sets (see [`value::elements`]): a scalar is
//! a one-element set, null is empty, a list is its members. Primitive
//! elements are compared by equality. Lists of embedded objects are compared
//! by their [`canonical_key`], so field order inside an object and the order
//! of the objects inside the list never register as changes.

use crate::Document;
use crate::value::{self, canonical_key, is_primitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Elements gained and lost by one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangedValues {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Value>,
}

impl ChangedValues {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// One field's change inside a multi-field log entry.
///
/// A descriptor carrying only `field` marks a field that appeared or
/// disappeared as a whole. `renamed_to` marks a rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
}

impl FieldDescriptor {
    /// A field that was created or dropped as a whole.
    pub fn marker(field: impl Into<String>) -> Self {
        FieldDescriptor {
            field: field.into(),
            added: Vec::new(),
            removed: Vec::new(),
            renamed_to: None,
        }
    }

    pub fn changed(field: impl Into<String>, change: ChangedValues) -> Self {
        FieldDescriptor {
            field: field.into(),
            added: change.added,
            removed: change.removed,
            renamed_to: None,
        }
    }

    pub fn renamed(field: impl Into<String>, to: impl Into<String>) -> Self {
        FieldDescriptor {
            field: field.into(),
            added: Vec::new(),
            removed: Vec::new(),
            renamed_to: Some(to.into()),
        }
    }

    /// Whether replaying this descriptor can change a value.
    pub fn carries_values(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Diff one field's old and new value.
///
/// Null and absent are both the empty set, so creating a field reports only
/// `added` and clearing it reports only `removed`.
///
/// # Examples
///
/// ```
/// use fieldlog::diff_field;
/// use serde_json::json;
///
/// let change = diff_field(&json!(["a", "b"]), &json!(["a", "c"]));
/// assert_eq!(change.added, vec![json!("c")]);
/// assert_eq!(change.removed, vec![json!("b")]);
///
/// let change = diff_field(&json!(null), &json!("v1"));
/// assert_eq!(change.added, vec![json!("v1")]);
/// assert!(change.removed.is_empty());
/// ```
pub fn diff_field(old: &Value, new: &Value) -> ChangedValues {
    if old == new {
        return ChangedValues::default();
    }

    let old_elements = value::elements(old);
    let new_elements = value::elements(new);

    if old_elements.iter().chain(&new_elements).all(is_primitive) {
        ChangedValues {
            added: difference(&new_elements, &old_elements),
            removed: difference(&old_elements, &new_elements),
        }
    } else if all_objects(&old_elements) && all_objects(&new_elements) {
        diff_object_lists(&old_elements, &new_elements)
    } else {
        // Nested lists or mixed members: swap the sides wholesale.
        ChangedValues {
            added: new_elements,
            removed: old_elements,
        }
    }
}

/// Set diff of two lists of embedded objects.
///
/// Objects present on both sides are never reported, whatever their position
/// or field order.
pub fn diff_object_lists(old: &[Value], new: &[Value]) -> ChangedValues {
    let old_keys: HashSet<String> = old.iter().map(canonical_key).collect();
    let new_keys: HashSet<String> = new.iter().map(canonical_key).collect();

    ChangedValues {
        added: keyed_difference(new, &old_keys),
        removed: keyed_difference(old, &new_keys),
    }
}

/// Diff two whole documents field by field.
///
/// Both documents are flattened to dot paths (lists stay leaves). The `_id`
/// and `log` subtrees are ignored. Descriptors come out sorted by path.
///
/// # Examples
///
/// ```
/// use fieldlog::{diff_documents, FieldDescriptor};
/// use serde_json::json;
///
/// let old = json!({"stable_id": "X", "info": {"a": 1}, "tags": ["x"]});
/// let new = json!({"stable_id": "X", "info": {"a": 2}, "extra": true, "tags": ["x"]});
/// let fields = diff_documents(old.as_object().unwrap(), new.as_object().unwrap());
///
/// assert_eq!(fields.len(), 2);
/// assert_eq!(fields[0], FieldDescriptor::marker("extra"));
/// assert_eq!(fields[1].field, "info.a");
/// assert_eq!(fields[1].added, vec![json!(2)]);
/// assert_eq!(fields[1].removed, vec![json!(1)]);
/// ```
pub fn diff_documents(old: &Document, new: &Document) -> Vec<FieldDescriptor> {
    let flat_old = flatten(old);
    let flat_new = flatten(new);

    let paths: BTreeSet<&String> = flat_old.keys().chain(flat_new.keys()).collect();

    let mut fields = Vec::new();
    for path in paths {
        if is_bookkeeping(path) {
            continue;
        }

        let (old_value, new_value) = match (flat_old.get(path), flat_new.get(path)) {
            (Some(old_value), Some(new_value)) => (old_value, new_value),
            _ => {
                fields.push(FieldDescriptor::marker(path.as_str()));
                continue;
            }
        };

        if let (Value::Array(old_items), Value::Array(new_items)) = (old_value, new_value) {
            if all_objects(old_items) && all_objects(new_items) {
                let change = diff_object_lists(old_items, new_items);
                if !change.is_empty() {
                    fields.push(FieldDescriptor::changed(path.as_str(), change));
                }
                continue;
            }
        }

        if old_value != new_value {
            let change = diff_field(old_value, new_value);
            if !change.is_empty() {
                fields.push(FieldDescriptor::changed(path.as_str(), change));
            }
        }
    }
    fields
}

/// Flatten nested objects into `dot.path -> leaf` pairs. Lists are leaves.
pub fn flatten(doc: &Document) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(doc, "", &mut out);
    out
}

fn flatten_into(map: &Document, prefix: &str, out: &mut BTreeMap<String, Value>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &path, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

fn is_bookkeeping(path: &str) -> bool {
    let head = path.split('.').next().unwrap_or(path);
    head == "_id" || head == "log"
}

fn all_objects(items: &[Value]) -> bool {
    items.iter().all(Value::is_object)
}

/// Members of `from` not in `minus`, first occurrence order, no duplicates.
fn difference(from: &[Value], minus: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in from {
        if !minus.contains(item) && !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

fn keyed_difference(from: &[Value], minus: &HashSet<String>) -> Vec<Value> {
    let mut seen = HashSet::new();
    from.iter()
        .filter(|item| {
            let key = canonical_key(item);
            !minus.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}
