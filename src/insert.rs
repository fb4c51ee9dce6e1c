//! Inserting documents with identity merge on `stable_id`.

use crate::Document;
use crate::diff::diff_documents;
use crate::engine::{Engine, Report, STABLE_ID, identify};
use crate::error::{Error, Result};
use crate::ingest;
use crate::ledger::{self, LOG_FIELD, LogEntry, Operation};
use crate::process::ProcessLog;
use crate::store::{Criteria, DocumentStore, ID_FIELD, Update};
use log::{debug, info};
use serde_json::Value;
use std::path::Path;

/// Maximum number of new documents handed to one `insert_many`.
pub const INSERT_CHUNK_SIZE: usize = 10_000;

impl<S: DocumentStore, P: ProcessLog> Engine<S, P> {
    /// Insert documents, merging into existing documents with the same
    /// `stable_id`.
    ///
    /// - No existing document: inserted with a one-entry log (`insert`).
    /// - Existing and identical (ignoring `_id` and `log`): skipped.
    /// - Existing and different: the incoming top-level fields overwrite the
    ///   existing ones, logged as `insert-overwrite` with one descriptor per
    ///   changed path.
    ///
    /// Documents without a string `stable_id` are reported as
    /// [`Error::InvalidInput`] failures.
    pub fn insert(&mut self, documents: Vec<Document>) -> Result<Report> {
        self.run(Operation::Insert, |engine, report| {
            engine.insert_batch(documents, report)
        })
    }

    /// Insert the documents of a JSON file, or of every `.json` file in a
    /// directory (natural order), under one process record.
    ///
    /// A file that is not valid JSON is reported as a failure and the
    /// remaining files are still inserted.
    pub fn insert_from_path(&mut self, path: &Path) -> Result<Report> {
        let files = ingest::collect_files(path, "json")?;
        info!("{} file(s) to process", files.len());

        self.run(Operation::Insert, |engine, report| {
            for file in files {
                info!("processing {}", file.display());
                match ingest::read_json_documents(&file) {
                    Ok(documents) => engine.insert_batch(documents, report)?,
                    Err(e) => report.fail(file.display().to_string(), e)?,
                }
            }
            Ok(())
        })
    }

    fn insert_batch(&mut self, documents: Vec<Document>, report: &mut Report) -> Result<()> {
        let tag = report.operation.as_str();
        let mut fresh = Vec::new();

        for doc in documents {
            let Some(stable_id) = doc.get(STABLE_ID).and_then(Value::as_str).map(str::to_owned)
            else {
                report.fail(
                    Value::Object(doc).to_string(),
                    Error::InvalidInput(format!("document has no string {STABLE_ID}")),
                )?;
                continue;
            };

            let Some(existing) = self
                .store
                .find_one(&Criteria::field(STABLE_ID, stable_id.as_str()))?
            else {
                let mut doc = doc;
                let entry = LogEntry::new(report.log_id(), tag);
                doc.insert(
                    LOG_FIELD.to_string(),
                    Value::Array(vec![serde_json::to_value(&entry)?]),
                );
                fresh.push(doc);
                continue;
            };

            let incoming = without_bookkeeping(doc);
            if incoming == without_bookkeeping(existing.clone()) {
                debug!("{stable_id}: identical document exists, skipping");
                report.skipped += 1;
                continue;
            }

            let mut merged = existing.clone();
            for (key, value) in &incoming {
                merged.insert(key.clone(), value.clone());
            }
            let fields = diff_documents(&existing, &merged);
            if fields.is_empty() {
                debug!("{stable_id}: incoming fields already present, skipping");
                report.skipped += 1;
                continue;
            }

            debug!("{stable_id}: document differs, overwriting {} field(s)", fields.len());
            let entry = LogEntry::multi(report.log_id(), report.operation.overwrite_tag(), fields);
            let log = ledger::append(&existing, &entry)?;

            let mut update = Update::new();
            for (key, value) in incoming {
                update = update.set(key, value);
            }
            update = update.set(LOG_FIELD, log);
            report.updated += self.store.update_one(&identify(&existing), &update)? as usize;
        }

        for chunk in fresh.chunks(INSERT_CHUNK_SIZE) {
            debug!("inserting {} document(s)", chunk.len());
            self.insert_all(report, chunk.to_vec())?;
        }
        Ok(())
    }
}

fn without_bookkeeping(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc.remove(LOG_FIELD);
    doc
}
