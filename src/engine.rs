//! The engine ties a [`DocumentStore`] and a [`ProcessLog`] together and
//! hosts the operation handlers (see the `insert`, `update`, `rename`,
//! `remove` and `restore` modules).
//!
//! Every handler follows the same pipeline: create a process record, resolve
//! the target documents, compute each document's field change and log entry,
//! and submit both in one single-document write. When nothing changed, the
//! process record is deleted again before the [`Report`] (or the error) is
//! returned.

use crate::Document;
use crate::diff::{ChangedValues, diff_field};
use crate::error::{Error, Result};
use crate::ledger::{self, LOG_FIELD, LogEntry, Operation};
use crate::path;
use crate::process::{ProcessId, ProcessLog};
use crate::store::{Criteria, DocumentStore, ID_FIELD, Update, WriteOp};
use log::{info, warn};
use serde_json::Value;
use std::fmt;

/// Key of the externally stable document identifier.
pub const STABLE_ID: &str = "stable_id";

/// Default actor recorded when none is configured.
const DEFAULT_ACTOR: &str = "unknown";

/// Applies logged field operations to one collection.
///
/// # Examples
///
/// ```
/// use fieldlog::{Criteria, Engine, MemoryProcessLog, MemoryStore};
/// use serde_json::json;
///
/// let mut engine = Engine::builder(MemoryStore::new(), MemoryProcessLog::new())
///     .actor("curator")
///     .method("manual fix")
///     .collection("samples")
///     .build();
///
/// let doc = json!({"stable_id": "X", "tags": ["a", "b"]});
/// engine.insert(vec![doc.as_object().unwrap().clone()]).unwrap();
///
/// let report = engine
///     .update_one(&Criteria::field("stable_id", "X"), "tags", json!("a;c"))
///     .unwrap();
/// assert_eq!(report.updated, 1);
/// ```
pub struct Engine<S, P> {
    pub(crate) store: S,
    pub(crate) processes: P,
    actor: String,
    method: String,
    collection: String,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S, P> {
    store: S,
    processes: P,
    actor: String,
    method: String,
    collection: String,
}

impl<S, P> EngineBuilder<S, P> {
    /// Name recorded as the actor of every process record.
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Free-text description of how the data was obtained.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Collection name recorded in process records.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn build(self) -> Engine<S, P> {
        Engine {
            store: self.store,
            processes: self.processes,
            actor: self.actor,
            method: self.method,
            collection: self.collection,
        }
    }
}

impl<S, P> Engine<S, P> {
    pub fn builder(store: S, processes: P) -> EngineBuilder<S, P> {
        EngineBuilder {
            store,
            processes,
            actor: DEFAULT_ACTOR.to_string(),
            method: String::new(),
            collection: String::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn processes(&self) -> &P {
        &self.processes
    }
}

impl<S: DocumentStore, P: ProcessLog> Engine<S, P> {
    /// Run one handler invocation under its own process record.
    ///
    /// The record is created before `body` runs and deleted again when the
    /// invocation changed nothing, whether `body` succeeded or failed. A
    /// failed bulk write may have applied some of its operations, so after
    /// one the record is kept.
    pub(crate) fn run<F>(&mut self, operation: Operation, body: F) -> Result<Report>
    where
        F: FnOnce(&mut Self, &mut Report) -> Result<()>,
    {
        let mut report = self.begin(operation)?;
        match body(self, &mut report) {
            Ok(()) => self.finish(report),
            Err(e) => {
                if report.changed() == 0 && !report.unconfirmed_writes {
                    if let Some(id) = report.process_id.take() {
                        if let Err(cleanup) = self.processes.delete(&id) {
                            warn!("{operation}: could not delete process record {id}: {cleanup}");
                        }
                    }
                }
                Err(e)
            }
        }
    }

    /// Submit `ops` in one bulk write and count them as updated.
    pub(crate) fn write_all(&mut self, report: &mut Report, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        report.unconfirmed_writes = true;
        report.updated += self.store.bulk_write(ops)? as usize;
        report.unconfirmed_writes = false;
        Ok(())
    }

    /// Insert `docs` and count them as inserted.
    pub(crate) fn insert_all(&mut self, report: &mut Report, docs: Vec<Document>) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        report.unconfirmed_writes = true;
        report.inserted += self.store.insert_many(docs)?.len();
        report.unconfirmed_writes = false;
        Ok(())
    }

    fn begin(&mut self, operation: Operation) -> Result<Report> {
        let process_id = self.processes.create(
            &self.actor,
            &self.method,
            operation.as_str(),
            &self.collection,
        )?;
        Ok(Report::new(operation, process_id))
    }

    /// Delete the process record when the invocation changed nothing.
    fn finish(&mut self, mut report: Report) -> Result<Report> {
        if report.changed() == 0 {
            if let Some(id) = report.process_id.take() {
                self.processes.delete(&id)?;
            }
            info!("{}: no changes were made", report.operation);
        } else {
            info!("{report}");
        }
        Ok(report)
    }
}

/// Outcome of one handler invocation.
#[derive(Debug)]
pub struct Report {
    pub operation: Operation,

    /// Id stamped into this invocation's log entries. `None` when nothing
    /// changed and the process record was deleted.
    pub process_id: Option<ProcessId>,

    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,

    /// Set while a bulk write is in flight.
    unconfirmed_writes: bool,
}

/// A target the handler could not process.
#[derive(Debug)]
pub struct Failure {
    /// Criteria, stable id or row that failed.
    pub target: String,
    pub error: Error,
}

impl Report {
    pub fn new(operation: Operation, process_id: ProcessId) -> Self {
        Report {
            operation,
            process_id: Some(process_id),
            inserted: 0,
            updated: 0,
            skipped: 0,
            failures: Vec::new(),
            unconfirmed_writes: false,
        }
    }

    /// Documents inserted or modified.
    pub fn changed(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn is_noop(&self) -> bool {
        self.changed() == 0
    }

    /// The id to stamp into log entries.
    pub(crate) fn log_id(&self) -> &str {
        self.process_id.as_deref().unwrap_or_default()
    }

    /// Record a per-target failure, or hand back an error that is not
    /// confined to the target.
    pub(crate) fn fail(&mut self, target: impl Into<String>, error: Error) -> Result<()> {
        if !error.is_recoverable() {
            return Err(error);
        }
        let target = target.into();
        warn!("{}: {target}: {error}", self.operation);
        self.failures.push(Failure { target, error });
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} inserted, {} updated, {} skipped, {} failed",
            self.operation,
            self.inserted,
            self.updated,
            self.skipped,
            self.failures.len()
        )?;
        if let Some(id) = &self.process_id {
            write!(f, " (process {id})")?;
        }
        Ok(())
    }
}

/// A field change computed against one document.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// The document with the new value in place (log not yet updated).
    pub document: Document,
    pub previous: Option<Value>,
    pub change: ChangedValues,
}

/// Compute the effect of setting `field` to `new_value` in `doc`.
///
/// Returns `None` when the field already holds `new_value`. Setting an
/// absent field to null counts as a change: it creates the field.
pub fn apply_field_change(doc: &Document, field: &str, new_value: Value) -> Option<FieldChange> {
    let previous = path::get(doc, field).cloned();
    if previous.as_ref() == Some(&new_value) {
        return None;
    }

    let change = diff_field(previous.as_ref().unwrap_or(&Value::Null), &new_value);
    let mut document = doc.clone();
    path::set(&mut document, field, new_value);
    Some(FieldChange {
        document,
        previous,
        change,
    })
}

/// Build the single write that sets `field` and prepends its log entry.
pub(crate) fn field_update(
    doc: &Document,
    field: &str,
    new_value: Value,
    log_id: &str,
    operation: &str,
) -> Result<Option<Update>> {
    let Some(field_change) = apply_field_change(doc, field, new_value.clone()) else {
        return Ok(None);
    };
    let entry = LogEntry::single(log_id, operation, field, field_change.change);
    let log = ledger::append(doc, &entry)?;
    Ok(Some(Update::new().set(field, new_value).set(LOG_FIELD, log)))
}

/// Criteria addressing exactly `doc`: its `_id` when it has one, else its
/// stable id.
pub(crate) fn identify(doc: &Document) -> Criteria {
    match doc.get(ID_FIELD) {
        Some(id) => Criteria::all().and(ID_FIELD, id.clone()),
        None => Criteria::all().and(STABLE_ID, doc.get(STABLE_ID).cloned().unwrap_or_default()),
    }
}

/// Human-readable name of a document for reports and logging.
pub(crate) fn label(doc: &Document) -> String {
    match doc.get(STABLE_ID).or_else(|| doc.get(ID_FIELD)) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "<unidentified>".to_string(),
    }
}
