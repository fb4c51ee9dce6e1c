#![allow(dead_code)]

use fieldlog::{
    Criteria, Document, DocumentStore, Engine, LogEntry, MemoryProcessLog, MemoryStore, ledger,
};
use serde_json::Value;

pub type MemoryEngine = Engine<MemoryStore, MemoryProcessLog>;

/// Unwrap a `json!` object literal into a document.
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn engine() -> MemoryEngine {
    engine_with(Vec::new())
}

/// An engine over documents stored as given (no `_id` assigned, log kept).
pub fn engine_with(docs: Vec<Document>) -> MemoryEngine {
    Engine::builder(MemoryStore::from_documents(docs), MemoryProcessLog::new())
        .actor("tester")
        .method("unit test")
        .collection("samples")
        .build()
}

/// The stored document with the given stable id.
pub fn stored(engine: &MemoryEngine, stable_id: &str) -> Document {
    engine
        .store()
        .find_one(&Criteria::field("stable_id", stable_id))
        .unwrap()
        .unwrap_or_else(|| panic!("no document with stable_id {stable_id}"))
}

pub fn log_of(engine: &MemoryEngine, stable_id: &str) -> Vec<LogEntry> {
    ledger::entries(&stored(engine, stable_id)).unwrap()
}

/// The newest log entry of the document.
pub fn newest_entry(engine: &MemoryEngine, stable_id: &str) -> LogEntry {
    log_of(engine, stable_id)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("{stable_id} has an empty log"))
}

pub fn by_stable_id(stable_id: &str) -> Criteria {
    Criteria::field("stable_id", stable_id)
}
