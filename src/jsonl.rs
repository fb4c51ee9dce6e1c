//! File-backed collections and process records, one JSON value per line.
//!
//! A collection lives in `<dir>/<collection>.jsonl`. The whole file is
//! rewritten on every effective write, atomically: the new contents go to a
//! `.tmp` sibling, are synced, and then renamed over the old file. If the
//! process crashes mid-write the previous file survives intact, and a failed
//! write leaves the in-memory documents as they were.
//!
//! Process records live in `<dir>/log_details.jsonl` and are appended one
//! line at a time. A trailing line without its newline (a crash mid-append)
//! is ignored on read.

use crate::Document;
use crate::error::{Error, Result};
use crate::process::{ProcessId, ProcessLog, ProcessRecord};
use crate::store::{Criteria, DocId, DocumentStore, MemoryStore, Update, WriteOp};
use fs2::FileExt;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the process record log inside a data directory.
pub const PROCESS_LOG_FILE: &str = "log_details.jsonl";

/// A collection persisted as a JSONL file.
///
/// Holds an exclusive advisory lock on `<collection>.lock` for as long as it
/// is open, so two processes never interleave writes to one collection.
pub struct JsonlStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_file: File,
    docs: MemoryStore,
}

impl JsonlStore {
    /// Open (or create) the collection `collection` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another process has the collection open,
    /// and [`Error::Json`] if a stored line is not a JSON object.
    pub fn open(dir: impl AsRef<Path>, collection: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("{collection}.jsonl"));
        let lock_path = dir.join(format!("{collection}.lock"));
        let lock_file = acquire_lock(&lock_path)?;

        let docs: Vec<Document> = read_lines(&path)?;
        debug!(
            "opened collection {} with {} document(s)",
            path.display(),
            docs.len()
        );

        Ok(JsonlStore {
            path,
            lock_path,
            lock_file,
            docs: MemoryStore::from_documents(docs),
        })
    }

    /// Path of the collection's data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the collection's lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// All documents, in insertion order.
    pub fn documents(&self) -> &[Document] {
        self.docs.documents()
    }

    /// Write `next` to disk and only then make it the in-memory state.
    fn commit(&mut self, next: MemoryStore) -> Result<()> {
        write_atomic(&self.path, next.documents())?;
        self.docs = next;
        Ok(())
    }
}

impl DocumentStore for JsonlStore {
    fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>> {
        self.docs.find_one(criteria)
    }

    fn find_many(&self, criteria: &Criteria) -> Result<Vec<Document>> {
        self.docs.find_many(criteria)
    }

    fn insert_one(&mut self, doc: Document) -> Result<DocId> {
        let mut next = self.docs.clone();
        let id = next.insert_one(doc)?;
        self.commit(next)?;
        Ok(id)
    }

    fn insert_many(&mut self, docs: Vec<Document>) -> Result<Vec<DocId>> {
        let mut next = self.docs.clone();
        let ids = next.insert_many(docs)?;
        if !ids.is_empty() {
            self.commit(next)?;
        }
        Ok(ids)
    }

    fn update_one(&mut self, criteria: &Criteria, update: &Update) -> Result<u64> {
        let mut next = self.docs.clone();
        let modified = next.update_one(criteria, update)?;
        if modified > 0 {
            self.commit(next)?;
        }
        Ok(modified)
    }

    fn bulk_write(&mut self, ops: Vec<WriteOp>) -> Result<u64> {
        let mut next = self.docs.clone();
        let modified = next.bulk_write(ops)?;
        if modified > 0 {
            self.commit(next)?;
        }
        Ok(modified)
    }
}

impl Drop for JsonlStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}

/// Process records appended to `<dir>/log_details.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlProcessLog {
    path: PathBuf,
}

impl JsonlProcessLog {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(JsonlProcessLog {
            path: dir.join(PROCESS_LOG_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every complete record, oldest first.
    pub fn records(&self) -> Result<Vec<ProcessRecord>> {
        read_lines(&self.path)
    }
}

impl ProcessLog for JsonlProcessLog {
    fn create(
        &mut self,
        actor: &str,
        method: &str,
        operation: &str,
        collection: &str,
    ) -> Result<ProcessId> {
        let record = ProcessRecord::new(actor, method, operation, collection);
        let json = serde_json::to_string(&record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.sync_data()?;

        Ok(record.id)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() != before {
            write_atomic(&self.path, &records)?;
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ProcessRecord>> {
        Ok(self.records()?.into_iter().find(|record| record.id == id))
    }
}

fn acquire_lock(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::Locked {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Decode every complete line of `path`. A missing file reads as empty;
/// blank lines and a final line lacking its newline are skipped.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut items = Vec::new();
    for line in contents.split_inclusive('\n') {
        let Some(line) = line.strip_suffix('\n') else {
            debug!("skipping partial trailing line in {}", path.display());
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        items.push(serde_json::from_str(line)?);
    }
    Ok(items)
}

/// Replace `path` with one JSON line per item via `.tmp` + sync + rename.
fn write_atomic<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let tmp_path = path.with_extension("jsonl.tmp");

    let mut contents = String::new();
    for item in items {
        contents.push_str(&serde_json::to_string(item)?);
        contents.push('\n');
    }

    let mut file = File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_data()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
