//! Setting a field's value, on one document, on every document, or row by
//! row from an update file.

use crate::Document;
use crate::diff::diff_field;
use crate::engine::{Engine, Report, field_update, identify, label};
use crate::error::{Error, Result};
use crate::ingest::{self, UpdateBatch};
use crate::ledger::{self, LOG_FIELD, LogEntry, Operation};
use crate::path;
use crate::process::ProcessLog;
use crate::store::{Criteria, DocumentStore, WriteOp};
use crate::value::normalize;
use log::{debug, info, warn};
use serde_json::Value;
use std::path::Path;

impl<S: DocumentStore, P: ProcessLog> Engine<S, P> {
    /// Set `field` to the normalized `raw` value in the first document
    /// matching `criteria`, creating the field if needed.
    ///
    /// A missing document is reported as a [`Error::NotFound`] failure.
    pub fn update_one(&mut self, criteria: &Criteria, field: &str, raw: Value) -> Result<Report> {
        let new_value = normalize(raw);
        self.run(Operation::UpdateOne, |engine, report| {
            let Some(doc) = engine.store.find_one(criteria)? else {
                return report.fail(
                    criteria.to_string(),
                    Error::NotFound(format!("no document matches {criteria}")),
                );
            };

            let tag = report.operation.as_str();
            match field_update(&doc, field, new_value, report.log_id(), tag)? {
                None => {
                    debug!("{}: '{field}' already up to date", label(&doc));
                    report.skipped += 1;
                }
                Some(update) => {
                    report.updated += engine.store.update_one(&identify(&doc), &update)? as usize;
                }
            }
            Ok(())
        })
    }

    /// Set `field` to the normalized `raw` value in every document.
    ///
    /// All changed documents are written in one bulk write; each write still
    /// carries its own field change and log together.
    pub fn update_all(&mut self, field: &str, raw: Value) -> Result<Report> {
        let new_value = normalize(raw);
        self.run(Operation::UpdateAll, |engine, report| {
            let tag = report.operation.as_str();

            let mut ops = Vec::new();
            for doc in engine.store.find_many(&Criteria::all())? {
                match field_update(&doc, field, new_value.clone(), report.log_id(), tag)? {
                    None => {
                        debug!("{}: '{field}' already up to date", label(&doc));
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

    /// Apply the rows of one update file under a single process record.
    ///
    /// A row whose document does not exist creates it, holding just the
    /// match field and the updated field.
    pub fn update_rows(&mut self, batch: UpdateBatch) -> Result<Report> {
        self.run(Operation::UpdateWithFile, |engine, report| {
            engine.apply_rows(batch, report)
        })
    }

    /// Apply an update CSV file, or every CSV file of a directory in natural
    /// order. Each file gets its own process record and report.
    ///
    /// A file that cannot be parsed is reported as a failure in its own
    /// report; the remaining files are still applied.
    pub fn update_from_path(&mut self, path: &Path) -> Result<Vec<Report>> {
        let files = ingest::collect_files(path, "csv")?;
        info!("{} update file(s) to process", files.len());

        let mut reports = Vec::new();
        for file in files {
            if !ingest::has_extension(&file, "csv") {
                warn!("{} is not a CSV file, skipping", file.display());
                continue;
            }
            info!("importing {}", file.display());
            let report = self.run(Operation::UpdateWithFile, |engine, report| {
                match ingest::read_update_csv(&file) {
                    Ok(batch) => engine.apply_rows(batch, report),
                    Err(e) => report.fail(file.display().to_string(), e),
                }
            })?;
            reports.push(report);
        }
        Ok(reports)
    }

    fn apply_rows(&mut self, batch: UpdateBatch, report: &mut Report) -> Result<()> {
        let tag = report.operation.as_str();
        let field = batch.update_field.as_str();

        for row in batch.rows {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    report.fail(field, e)?;
                    continue;
                }
            };
            let new_value = normalize(row.value);
            let criteria = Criteria::field(batch.match_field.as_str(), row.match_value.as_str());

            match self.store.find_one(&criteria)? {
                Some(doc) => match field_update(&doc, field, new_value, report.log_id(), tag)? {
                    None => {
                        debug!("{}: '{field}' already up to date", row.match_value);
                        report.skipped += 1;
                    }
                    Some(update) => {
                        report.updated += self.store.update_one(&identify(&doc), &update)? as usize;
                    }
                },
                None => {
                    debug!(
                        "no document with {} {}, creating it",
                        batch.match_field, row.match_value
                    );
                    let mut doc = Document::new();
                    path::set(
                        &mut doc,
                        &batch.match_field,
                        Value::String(row.match_value.clone()),
                    );
                    let change = diff_field(&Value::Null, &new_value);
                    path::set(&mut doc, field, new_value);
                    let entry = LogEntry::single(report.log_id(), tag, field, change);
                    let log = ledger::append(&doc, &entry)?;
                    doc.insert(LOG_FIELD.to_string(), log);
                    self.store.insert_one(doc)?;
                    report.inserted += 1;
                }
            }
        }
        Ok(())
    }
}
