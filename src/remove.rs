//! Removing a field.

use crate::Document;
use crate::diff::{ChangedValues, FieldDescriptor};
use crate::engine::{Engine, Report, identify, label};
use crate::error::{Error, Result};
use crate::ledger::{self, LOG_FIELD, LogEntry, Operation};
use crate::path;
use crate::process::ProcessLog;
use crate::store::{Criteria, DocumentStore, Update, WriteOp};
use crate::value;
use log::debug;

impl<S: DocumentStore, P: ProcessLog> Engine<S, P> {
    /// Remove `field` from the first document matching `criteria`.
    ///
    /// The removed value is kept in the log entry's `removed` set. A missing
    /// document or field is reported as a failure and nothing is written.
    pub fn remove_one(&mut self, criteria: &Criteria, field: &str) -> Result<Report> {
        self.run(Operation::RemoveOne, |engine, report| {
            match engine.store.find_one(criteria)? {
                None => report.fail(
                    criteria.to_string(),
                    Error::NotFound(format!("no document matches {criteria}")),
                ),
                Some(doc) => match remove_update(&doc, field, report)? {
                    None => report.fail(
                        label(&doc),
                        Error::FieldAbsent {
                            path: field.to_string(),
                        },
                    ),
                    Some(update) => {
                        report.updated += engine.store.update_one(&identify(&doc), &update)? as usize;
                        Ok(())
                    }
                },
            }
        })
    }

    /// Remove `field` from every document that has it.
    pub fn remove_all(&mut self, field: &str) -> Result<Report> {
        self.run(Operation::RemoveAll, |engine, report| {
            let mut ops = Vec::new();
            for doc in engine.store.find_many(&Criteria::all())? {
                match remove_update(&doc, field, report)? {
                    None => {
                        debug!("{}: no field '{field}'", label(&doc));
                        report.skipped += 1;
                    }
                    Some(update) => ops.push(WriteOp::UpdateOne {
                        criteria: identify(&doc),
                        update,
                    }),
                }
            }
            engine.write_all(report, ops)
        })
    }
}

fn remove_update(doc: &Document, field: &str, report: &Report) -> Result<Option<Update>> {
    let Some(previous) = path::get(doc, field) else {
        return Ok(None);
    };

    let change = ChangedValues {
        added: Vec::new(),
        removed: value::elements(previous),
    };
    let entry = LogEntry::multi(
        report.log_id(),
        report.operation.as_str(),
        vec![FieldDescriptor::changed(field, change)],
    );
    let log = ledger::append(doc, &entry)?;
    Ok(Some(Update::new().unset(field).set(LOG_FIELD, log)))
}
