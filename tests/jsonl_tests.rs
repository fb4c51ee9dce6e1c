mod common;

use common::doc;
use fieldlog::{
    Criteria, DocumentStore, Engine, Error, JsonlProcessLog, JsonlStore, PROCESS_LOG_FILE,
    ProcessLog, Update,
};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::tempdir;

#[test]
fn test_open_creates_nothing_until_first_write() {
    let dir = tempdir().unwrap();
    let store = JsonlStore::open(dir.path(), "samples").unwrap();
    assert!(store.documents().is_empty());
    assert!(!store.path().exists());
    assert!(store.lock_path().exists());
}

#[test]
fn test_documents_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let mut store = JsonlStore::open(dir.path(), "samples").unwrap();
        store.insert_one(doc(json!({"stable_id": "A", "v": 1}))).unwrap();
        store
            .update_one(
                &Criteria::field("stable_id", "A"),
                &Update::new().set("v", json!(2)),
            )
            .unwrap();
    }

    let store = JsonlStore::open(dir.path(), "samples").unwrap();
    assert_eq!(store.documents().len(), 1);
    assert_eq!(store.documents()[0]["v"], json!(2));
    assert!(!dir.path().join("samples.jsonl.tmp").exists());
}

#[test]
fn test_second_open_is_locked() {
    let dir = tempdir().unwrap();
    let _store = JsonlStore::open(dir.path(), "samples").unwrap();

    let err = JsonlStore::open(dir.path(), "samples").err().unwrap();
    assert!(matches!(err, Error::Locked { .. }));
    assert!(!err.is_recoverable());
    assert!(err.to_string().contains("samples.lock"), "{err}");
}

#[test]
fn test_lock_released_on_drop() {
    let dir = tempdir().unwrap();
    {
        let _store = JsonlStore::open(dir.path(), "samples").unwrap();
    }
    let _store = JsonlStore::open(dir.path(), "samples").unwrap();
}

#[test]
fn test_collections_lock_independently() {
    let dir = tempdir().unwrap();
    let _a = JsonlStore::open(dir.path(), "a").unwrap();
    let _b = JsonlStore::open(dir.path(), "b").unwrap();
}

#[test]
fn test_noop_update_does_not_rewrite_file() {
    let dir = tempdir().unwrap();
    let mut store = JsonlStore::open(dir.path(), "samples").unwrap();
    store.insert_one(doc(json!({"stable_id": "A", "v": 1}))).unwrap();
    let before = fs::read_to_string(store.path()).unwrap();

    let modified = store
        .update_one(
            &Criteria::field("stable_id", "A"),
            &Update::new().set("v", json!(1)),
        )
        .unwrap();
    assert_eq!(modified, 0);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
}

#[test]
fn test_failed_rewrite_keeps_documents_unchanged() {
    let dir = tempdir().unwrap();
    let mut store = JsonlStore::open(dir.path(), "samples").unwrap();
    store.insert_one(doc(json!({"stable_id": "A", "v": 1}))).unwrap();

    // A directory in the way of the temp file makes the rewrite fail.
    let tmp = dir.path().join("samples.jsonl.tmp");
    fs::create_dir(&tmp).unwrap();

    let by_a = Criteria::field("stable_id", "A");
    let err = store
        .update_one(&by_a, &Update::new().set("v", json!(2)))
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(store.insert_one(doc(json!({"stable_id": "B"}))).is_err());
    assert_eq!(store.documents().len(), 1);
    assert_eq!(store.documents()[0]["v"], json!(1));

    // Once the file can be written again, the retried update applies.
    fs::remove_dir(&tmp).unwrap();
    assert_eq!(
        store
            .update_one(&by_a, &Update::new().set("v", json!(2)))
            .unwrap(),
        1
    );
    assert_eq!(store.documents()[0]["v"], json!(2));
}

#[test]
fn test_partial_trailing_line_is_ignored() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("samples.jsonl"),
        "{\"stable_id\":\"A\"}\n{\"stable_id\":\"B\",\"trunc",
    )
    .unwrap();

    let store = JsonlStore::open(dir.path(), "samples").unwrap();
    assert_eq!(store.documents().len(), 1);
}

#[test]
fn test_process_log_append_and_delete() {
    let dir = tempdir().unwrap();
    let mut log = JsonlProcessLog::open(dir.path()).unwrap();
    assert_eq!(log.path(), dir.path().join(PROCESS_LOG_FILE));

    let first = log.create("tester", "manual", "update_one", "samples").unwrap();
    let second = log.create("tester", "manual", "remove_all", "samples").unwrap();
    assert_eq!(log.records().unwrap().len(), 2);

    log.delete(&first).unwrap();
    let records = log.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, second);
    assert_eq!(records[0].operation, "remove_all");
    assert!(log.get(&first).unwrap().is_none());
}

#[test]
fn test_process_log_skips_torn_append() {
    let dir = tempdir().unwrap();
    let mut log = JsonlProcessLog::open(dir.path()).unwrap();
    log.create("tester", "manual", "update_one", "samples").unwrap();

    let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
    file.write_all(b"{\"_id\":\"torn").unwrap();

    assert_eq!(log.records().unwrap().len(), 1);
}

#[test]
fn test_process_record_wire_shape() {
    let dir = tempdir().unwrap();
    let mut log = JsonlProcessLog::open(dir.path()).unwrap();
    let id = log.create("tester", "manual", "insert", "samples").unwrap();

    let line = fs::read_to_string(log.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(value["_id"], json!(id));
    assert_eq!(value["name"], json!("tester"));
    assert_eq!(value["collection"], json!("samples"));
    assert!(value["date"].is_string());
}

#[test]
fn test_engine_over_files_persists_log_and_rollback() {
    let dir = tempdir().unwrap();
    {
        let store = JsonlStore::open(dir.path(), "samples").unwrap();
        let processes = JsonlProcessLog::open(dir.path()).unwrap();
        let mut engine = Engine::builder(store, processes)
            .actor("tester")
            .method("files")
            .collection("samples")
            .build();

        engine.insert(vec![doc(json!({"stable_id": "A"}))]).unwrap();
        engine
            .update_one(&Criteria::field("stable_id", "A"), "status", json!("done"))
            .unwrap();
        // No-op: rolled back, leaves two process records.
        engine
            .update_one(&Criteria::field("stable_id", "A"), "status", json!("done"))
            .unwrap();
    }

    let store = JsonlStore::open(dir.path(), "samples").unwrap();
    let a = &store.documents()[0];
    assert_eq!(a["status"], json!("done"));
    assert_eq!(a["log"].as_array().unwrap().len(), 2);

    let processes = JsonlProcessLog::open(dir.path()).unwrap();
    let operations: Vec<String> = processes
        .records()
        .unwrap()
        .into_iter()
        .map(|r| r.operation)
        .collect();
    assert_eq!(operations, vec!["insert", "update_one"]);
}
