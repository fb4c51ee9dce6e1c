//! Process records: who ran which operation, when, and on what collection.
//!
//! Every handler invocation creates one record up front and stamps its id
//! into the log entries it writes (`log_id`). If the invocation ends up
//! changing nothing, the record is deleted again so no id is left pointing
//! at an operation that never happened.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of a [`ProcessRecord`].
pub type ProcessId = String;

/// Metadata about one operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    #[serde(rename = "_id")]
    pub id: ProcessId,

    /// The person or service that ran the operation.
    pub name: String,

    pub operation: String,

    pub collection: String,

    /// How the data was obtained or modified (free text).
    pub method: String,

    pub date: DateTime<Utc>,
}

impl ProcessRecord {
    /// Create a record with a fresh ULID and the current time.
    pub fn new(name: &str, method: &str, operation: &str, collection: &str) -> Self {
        ProcessRecord {
            id: Ulid::new().to_string(),
            name: name.to_string(),
            operation: operation.to_string(),
            collection: collection.to_string(),
            method: method.to_string(),
            date: Utc::now(),
        }
    }
}

/// Storage for process records.
pub trait ProcessLog {
    /// Record a new invocation and return its id.
    fn create(
        &mut self,
        actor: &str,
        method: &str,
        operation: &str,
        collection: &str,
    ) -> Result<ProcessId>;

    /// Remove a record. Deleting an unknown id is not an error.
    fn delete(&mut self, id: &str) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<ProcessRecord>>;
}

/// Process records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProcessLog {
    records: Vec<ProcessRecord>,
}

impl MemoryProcessLog {
    pub fn new() -> Self {
        MemoryProcessLog::default()
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }
}

impl ProcessLog for MemoryProcessLog {
    fn create(
        &mut self,
        actor: &str,
        method: &str,
        operation: &str,
        collection: &str,
    ) -> Result<ProcessId> {
        let record = ProcessRecord::new(actor, method, operation, collection);
        let id = record.id.clone();
        self.records.push(record);
        Ok(id)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.records.retain(|record| record.id != id);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ProcessRecord>> {
        Ok(self.records.iter().find(|record| record.id == id).cloned())
    }
}
