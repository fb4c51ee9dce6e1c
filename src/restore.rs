//! Restoring earlier field values by replaying document logs backwards.

use crate::Document;
use crate::diff::{ChangedValues, FieldDescriptor, diff_field};
use crate::engine::{Engine, Report, identify, label};
use crate::error::{Error, Result};
use crate::ledger::{self, LOG_FIELD, LogEntry, Operation};
use crate::path;
use crate::process::ProcessLog;
use crate::store::{Criteria, DocumentStore, Update, WriteOp};
use log::debug;
use serde_json::Value;

impl<S: DocumentStore, P: ProcessLog> Engine<S, P> {
    /// Put `field` of the first document matching `criteria` back to the
    /// value it had before the log entry `log_id` was written.
    ///
    /// The restore is itself logged, so it can be restored in turn. When the
    /// field already holds the restored value nothing is written.
    ///
    /// A missing document, an unknown `log_id`, an entry that does not
    /// describe `field`, and a non-restorable entry are all reported as
    /// failures.
    pub fn restore_one(&mut self, criteria: &Criteria, field: &str, log_id: &str) -> Result<Report> {
        self.run(Operation::RestoreOne, |engine, report| {
            let Some(doc) = engine.store.find_one(criteria)? else {
                return report.fail(
                    criteria.to_string(),
                    Error::NotFound(format!("no document matches {criteria}")),
                );
            };

            let restored = ledger::entries(&doc)
                .and_then(|log| ledger::restore(&log, log_id, field, path::get(&doc, field)));
            let restored = match restored {
                Ok(value) => value,
                Err(e) => return report.fail(label(&doc), e),
            };

            match restore_change(&doc, field, restored) {
                None => {
                    debug!("{}: '{field}' already holds the restored value", label(&doc));
                    report.skipped += 1;
                }
                Some((value, change)) => {
                    let entry =
                        LogEntry::single(report.log_id(), report.operation.as_str(), field, change);
                    let log = ledger::append(&doc, &entry)?;
                    let update = Update::new().set(field, value).set(LOG_FIELD, log);
                    report.updated += engine.store.update_one(&identify(&doc), &update)? as usize;
                }
            }
            Ok(())
        })
    }

    /// Undo the entry `log_id` in every document whose log contains it.
    ///
    /// Every field the entry recorded values for is restored. Documents
    /// without the entry are skipped; documents where the entry is not
    /// restorable are reported as failures.
    pub fn restore_all(&mut self, log_id: &str) -> Result<Report> {
        self.run(Operation::RestoreAll, |engine, report| {
            let mut ops = Vec::new();
            for doc in engine.store.find_many(&Criteria::all())? {
                match restore_document(&doc, log_id, report) {
                    Ok(Some(update)) => ops.push(WriteOp::UpdateOne {
                        criteria: identify(&doc),
                        update,
                    }),
                    Ok(None) => report.skipped += 1,
                    Err(e) => report.fail(label(&doc), e)?,
                }
            }
            engine.write_all(report, ops)
        })
    }
}

/// The value to write and its change, or `None` if `field` already holds
/// `restored`. A restored null over an absent field is no change.
fn restore_change(doc: &Document, field: &str, restored: Value) -> Option<(Value, ChangedValues)> {
    let current = path::get(doc, field);
    match current {
        Some(value) if *value == restored => None,
        None if restored.is_null() => None,
        _ => {
            let change = diff_field(current.unwrap_or(&Value::Null), &restored);
            Some((restored, change))
        }
    }
}

fn restore_document(doc: &Document, log_id: &str, report: &Report) -> Result<Option<Update>> {
    let log = ledger::entries(doc)?;
    let Some(entry) = log.iter().find(|entry| entry.log_id == log_id) else {
        return Ok(None);
    };
    if !entry.is_restorable() {
        return Err(Error::NotRestorable {
            log_id: log_id.to_string(),
            operation: entry.operation.clone(),
        });
    }

    let mut update = Update::new();
    let mut fields = Vec::new();
    for field in entry.value_fields() {
        let restored = ledger::restore(&log, log_id, field, path::get(doc, field))?;
        if let Some((value, change)) = restore_change(doc, field, restored) {
            update = update.set(field, value);
            fields.push(FieldDescriptor::changed(field, change));
        }
    }

    if fields.is_empty() {
        debug!("{}: fields of {log_id} already restored", label(doc));
        return Ok(None);
    }

    let tag = report.operation.as_str();
    let entry = match <[FieldDescriptor; 1]>::try_from(fields) {
        Ok([single]) => LogEntry::single(
            report.log_id(),
            tag,
            single.field,
            ChangedValues {
                added: single.added,
                removed: single.removed,
            },
        ),
        Err(fields) => LogEntry::multi(report.log_id(), tag, fields),
    };
    let log = ledger::append(doc, &entry)?;
    Ok(Some(update.set(LOG_FIELD, log)))
}
