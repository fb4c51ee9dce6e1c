//! Field-level document mutation with a replayable change log embedded in
//! every document.

mod config;
mod diff;
mod engine;
mod error;
pub mod ingest;
mod insert;
mod jsonl;
pub mod ledger;
pub mod path;
mod process;
mod remove;
mod rename;
mod restore;
mod store;
mod update;
pub mod value;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use config::{Command, Config};
pub use diff::{ChangedValues, FieldDescriptor, diff_documents, diff_field, diff_object_lists, flatten};
pub use engine::{
    Engine, EngineBuilder, Failure, FieldChange, Report, STABLE_ID, apply_field_change,
};
pub use error::{Error, Result};
pub use ingest::{UpdateBatch, UpdateRow};
pub use insert::INSERT_CHUNK_SIZE;
pub use jsonl::{JsonlProcessLog, JsonlStore, PROCESS_LOG_FILE};
pub use ledger::{LOG_FIELD, LogEntry, Operation};
pub use process::{MemoryProcessLog, ProcessId, ProcessLog, ProcessRecord};
pub use store::{Criteria, DocId, DocumentStore, ID_FIELD, MemoryStore, Update, WriteOp};
pub use value::normalize;
