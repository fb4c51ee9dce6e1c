//! Renaming (moving) a field.

use crate::Document;
use crate::diff::FieldDescriptor;
use crate::engine::{Engine, Report, identify, label};
use crate::error::{Error, Result};
use crate::ledger::{self, LOG_FIELD, LogEntry, Operation};
use crate::path;
use crate::process::ProcessLog;
use crate::store::{Criteria, DocumentStore, Update, WriteOp};
use log::debug;

impl<S: DocumentStore, P: ProcessLog> Engine<S, P> {
    /// Move `field` to `new_field` in the first document matching
    /// `criteria`.
    ///
    /// The old path is unset and the new one set in the same write. A
    /// missing document or field is reported as a failure.
    pub fn rename_one(&mut self, criteria: &Criteria, field: &str, new_field: &str) -> Result<Report> {
        self.run(Operation::RenameOne, |engine, report| {
            if let Err(e) = check_rename(field, new_field) {
                return report.fail(field, e);
            }

            match engine.store.find_one(criteria)? {
                None => report.fail(
                    criteria.to_string(),
                    Error::NotFound(format!("no document matches {criteria}")),
                ),
                Some(doc) => match rename_update(&doc, field, new_field, report)? {
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

    /// Move `field` to `new_field` in every document that has it.
    pub fn rename_all(&mut self, field: &str, new_field: &str) -> Result<Report> {
        self.run(Operation::RenameAll, |engine, report| {
            if let Err(e) = check_rename(field, new_field) {
                return report.fail(field, e);
            }

            let mut ops = Vec::new();
            for doc in engine.store.find_many(&Criteria::all())? {
                match rename_update(&doc, field, new_field, report)? {
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

fn check_rename(field: &str, new_field: &str) -> Result<()> {
    if field.is_empty() || new_field.is_empty() {
        return Err(Error::InvalidInput("field names must not be empty".to_string()));
    }
    if field == new_field {
        return Err(Error::InvalidInput(format!(
            "'{field}' cannot be renamed to itself"
        )));
    }
    Ok(())
}

fn rename_update(
    doc: &Document,
    field: &str,
    new_field: &str,
    report: &Report,
) -> Result<Option<Update>> {
    let Some(value) = path::get(doc, field).cloned() else {
        return Ok(None);
    };

    let entry = LogEntry::multi(
        report.log_id(),
        report.operation.as_str(),
        vec![FieldDescriptor::renamed(field, new_field)],
    );
    let log = ledger::append(doc, &entry)?;
    Ok(Some(
        Update::new()
            .unset(field)
            .set(new_field, value)
            .set(LOG_FIELD, log),
    ))
}
