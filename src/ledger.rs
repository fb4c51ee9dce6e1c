//! The per-document change log.
//!
//! Every document carries a `log` array of [`LogEntry`] values, newest
//! first. Entries are only ever prepended; an entry is never edited after it
//! is written. Replaying the `added`/`removed` sets of the entries backwards
//! reconstructs any earlier value of a field.

use crate::Document;
use crate::diff::{ChangedValues, FieldDescriptor};
use crate::error::{Error, Result};
use crate::value;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of the document key holding the change log.
pub const LOG_FIELD: &str = "log";

const NO_VALUES: &[Value] = &[];

/// The kind of operation that produced a process record or log entry.
///
/// Serialized (and written into log entries) in snake case, e.g.
/// `"update_one"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    UpdateOne,
    UpdateAll,
    UpdateWithFile,
    RestoreOne,
    RestoreAll,
    RenameOne,
    RenameAll,
    RemoveOne,
    RemoveAll,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::UpdateOne => "update_one",
            Operation::UpdateAll => "update_all",
            Operation::UpdateWithFile => "update_with_file",
            Operation::RestoreOne => "restore_one",
            Operation::RestoreAll => "restore_all",
            Operation::RenameOne => "rename_one",
            Operation::RenameAll => "rename_all",
            Operation::RemoveOne => "remove_one",
            Operation::RemoveAll => "remove_all",
        }
    }

    /// Tag for an operation that replaced an existing document's fields.
    pub fn overwrite_tag(&self) -> String {
        format!("{}-overwrite", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an entry written under `tag` can be the target of a restore.
///
/// Only entries whose tag starts with `update` or `restore`
/// (case-insensitive) record an invertible value change.
pub fn is_restorable_tag(tag: &str) -> bool {
    let tag = tag.to_ascii_lowercase();
    tag.starts_with("update") || tag.starts_with("restore")
}

/// One committed change, as stored in a document's `log` array.
///
/// Single-field operations fill `modified_field` and `changed_values`;
/// multi-field operations fill `modified_fields`. Inserts carry neither.
///
/// ```text
/// { "log_id": "01J...", "operation": "update_one",
///   "modified_field": "tags",
///   "changed_values": { "added": ["c"], "removed": ["b"] } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Id of the process record for the invocation that wrote this entry.
    pub log_id: String,

    pub operation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_values: Option<ChangedValues>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_fields: Option<Vec<FieldDescriptor>>,
}

impl LogEntry {
    /// An entry recording only that the operation touched the document.
    pub fn new(log_id: impl Into<String>, operation: impl Into<String>) -> Self {
        LogEntry {
            log_id: log_id.into(),
            operation: operation.into(),
            modified_field: None,
            changed_values: None,
            modified_fields: None,
        }
    }

    /// An entry for a change to a single field.
    pub fn single(
        log_id: impl Into<String>,
        operation: impl Into<String>,
        field: impl Into<String>,
        change: ChangedValues,
    ) -> Self {
        LogEntry {
            modified_field: Some(field.into()),
            changed_values: Some(change),
            ..LogEntry::new(log_id, operation)
        }
    }

    /// An entry for a change spanning several fields.
    pub fn multi(
        log_id: impl Into<String>,
        operation: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        LogEntry {
            modified_fields: Some(fields),
            ..LogEntry::new(log_id, operation)
        }
    }

    pub fn is_restorable(&self) -> bool {
        is_restorable_tag(&self.operation)
    }

    /// The `(added, removed)` sets this entry recorded for `field`, if it
    /// describes that field at all.
    pub fn change_for(&self, field: &str) -> Option<(&[Value], &[Value])> {
        if self.modified_field.as_deref() == Some(field) {
            return Some(match &self.changed_values {
                Some(change) => (change.added.as_slice(), change.removed.as_slice()),
                None => (NO_VALUES, NO_VALUES),
            });
        }
        self.modified_fields
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|descriptor| descriptor.field == field)
            .map(|descriptor| (descriptor.added.as_slice(), descriptor.removed.as_slice()))
    }

    /// Paths of the fields whose values this entry recorded, in entry order.
    pub fn value_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        if let Some(field) = &self.modified_field {
            fields.push(field.as_str());
        }
        for descriptor in self.modified_fields.as_deref().unwrap_or_default() {
            if descriptor.carries_values() && !fields.contains(&descriptor.field.as_str()) {
                fields.push(descriptor.field.as_str());
            }
        }
        fields
    }
}

/// Decode a document's log. An absent log is empty.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the `log` field is not an array of
/// entries.
pub fn entries(doc: &Document) -> Result<Vec<LogEntry>> {
    match doc.get(LOG_FIELD) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(log) => Vec::<LogEntry>::deserialize(log)
            .map_err(|e| Error::InvalidInput(format!("malformed log: {e}"))),
    }
}

/// Build the document's new log with `entry` prepended.
///
/// Existing entries are carried over verbatim. The caller persists the
/// result in the same write as the field change it describes.
///
/// # Errors
///
/// Returns [`Error::Json`] if `entry` cannot be serialized.
pub fn append(doc: &Document, entry: &LogEntry) -> Result<Value> {
    let mut log = match doc.get(LOG_FIELD) {
        Some(Value::Array(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    log.insert(0, serde_json::to_value(entry)?);
    Ok(Value::Array(log))
}

/// Reconstruct the value `field` had before the entry `log_id` was written.
///
/// Entries are replayed from the newest down to and including the target.
/// Each entry describing `field` is inverted: its `added` members are taken
/// out of the running value and its `removed` members appended. When
/// `current` is not a list, a result of at most one element collapses back
/// to a scalar (or null).
///
/// # Errors
///
/// - [`Error::NotFound`] if no entry has `log_id`.
/// - [`Error::NotRestorable`] if the target entry is not an update or
///   restore.
/// - [`Error::FieldAbsent`] if the target entry does not describe `field`.
///
/// # Examples
///
/// ```
/// use fieldlog::{ledger, ChangedValues, LogEntry};
/// use serde_json::json;
///
/// let log = vec![LogEntry::single(
///     "p1",
///     "update_one",
///     "tags",
///     ChangedValues { added: vec![json!("c")], removed: vec![json!("b")] },
/// )];
///
/// let restored = ledger::restore(&log, "p1", "tags", Some(&json!(["a", "c"]))).unwrap();
/// assert_eq!(restored, json!(["a", "b"]));
/// ```
pub fn restore(
    log: &[LogEntry],
    log_id: &str,
    field: &str,
    current: Option<&Value>,
) -> Result<Value> {
    let target = log
        .iter()
        .position(|entry| entry.log_id == log_id)
        .ok_or_else(|| Error::NotFound(format!("log_id {log_id}")))?;

    let entry = &log[target];
    if !entry.is_restorable() {
        return Err(Error::NotRestorable {
            log_id: log_id.to_string(),
            operation: entry.operation.clone(),
        });
    }
    if entry.change_for(field).is_none() {
        return Err(Error::FieldAbsent {
            path: field.to_string(),
        });
    }

    let mut restored = value::elements_of(current);
    for entry in &log[..=target] {
        if let Some((added, removed)) = entry.change_for(field) {
            restored.retain(|item| !added.contains(item));
            restored.extend(removed.iter().cloned());
        }
    }

    Ok(match current {
        Some(Value::Array(_)) => Value::Array(restored),
        _ if restored.len() <= 1 => value::collapse(restored),
        _ => Value::Array(restored),
    })
}
