mod common;

use common::{by_stable_id, doc, engine_with, newest_entry, stored};
use fieldlog::{ChangedValues, Error};
use serde_json::json;

#[test]
fn test_update_then_restore_round_trip() {
    let mut engine = engine_with(vec![doc(json!({
        "stable_id": "X", "tags": ["a", "b"], "log": []
    }))]);

    let update = engine
        .update_one(&by_stable_id("X"), "tags", json!(["a", "c"]))
        .unwrap();
    let log_id = update.process_id.unwrap();

    let report = engine
        .restore_one(&by_stable_id("X"), "tags", &log_id)
        .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(stored(&engine, "X")["tags"], json!(["a", "b"]));

    let entry = newest_entry(&engine, "X");
    assert_eq!(entry.operation, "restore_one");
    assert_eq!(entry.modified_field.as_deref(), Some("tags"));
    assert_eq!(
        entry.changed_values,
        Some(ChangedValues {
            added: vec![json!("b")],
            removed: vec![json!("c")],
        })
    );
}

#[test]
fn test_restore_entries_are_restorable() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X", "status": "v1"}))]);
    engine
        .update_one(&by_stable_id("X"), "status", json!("v2"))
        .unwrap();
    let log_id = newest_entry(&engine, "X").log_id;

    let restore = engine
        .restore_one(&by_stable_id("X"), "status", &log_id)
        .unwrap();
    assert_eq!(stored(&engine, "X")["status"], json!("v1"));

    // Undo the undo.
    engine
        .restore_one(&by_stable_id("X"), "status", &restore.process_id.unwrap())
        .unwrap();
    assert_eq!(stored(&engine, "X")["status"], json!("v2"));
}

#[test]
fn test_restore_to_older_entry_replays_newer_ones() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X", "status": "v1"}))]);
    let first = engine
        .update_one(&by_stable_id("X"), "status", json!("v2"))
        .unwrap();
    engine
        .update_one(&by_stable_id("X"), "status", json!("v3"))
        .unwrap();

    engine
        .restore_one(&by_stable_id("X"), "status", &first.process_id.unwrap())
        .unwrap();
    assert_eq!(stored(&engine, "X")["status"], json!("v1"));
}

#[test]
fn test_restore_of_remove_entry_is_not_restorable() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X", "tags": ["a"]}))]);
    let removal = engine.remove_one(&by_stable_id("X"), "tags").unwrap();

    let report = engine
        .restore_one(&by_stable_id("X"), "tags", &removal.process_id.unwrap())
        .unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        Error::NotRestorable { ref operation, .. } if operation == "remove_one"
    ));
    assert!(!stored(&engine, "X").contains_key("tags"));
}

#[test]
fn test_restore_with_no_effect_deletes_process_record() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X", "status": "v1"}))]);
    let update = engine
        .update_one(&by_stable_id("X"), "status", json!("v2"))
        .unwrap();
    let log_id = update.process_id.unwrap();
    // Put the old value back by hand; restoring now changes nothing.
    engine
        .update_one(&by_stable_id("X"), "status", json!("v1"))
        .unwrap();
    let records_before = engine.processes().records().len();
    let log_before = stored(&engine, "X")["log"].clone();

    let report = engine
        .restore_one(&by_stable_id("X"), "status", &log_id)
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert!(report.process_id.is_none());
    assert_eq!(engine.processes().records().len(), records_before);
    assert_eq!(stored(&engine, "X")["log"], log_before);
}

#[test]
fn test_restore_unknown_log_id_is_reported() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X", "status": "v1"}))]);
    let report = engine
        .restore_one(&by_stable_id("X"), "status", "missing")
        .unwrap();
    assert!(matches!(report.failures[0].error, Error::NotFound(_)));
}

#[test]
fn test_restore_field_not_described_by_entry() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X", "a": 1, "b": 1}))]);
    let update = engine.update_one(&by_stable_id("X"), "a", json!(2)).unwrap();

    let report = engine
        .restore_one(&by_stable_id("X"), "b", &update.process_id.unwrap())
        .unwrap();
    assert!(matches!(report.failures[0].error, Error::FieldAbsent { .. }));
}

#[test]
fn test_restore_created_field_to_null() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "X"}))]);
    let update = engine
        .update_one(&by_stable_id("X"), "status", json!("v1"))
        .unwrap();

    engine
        .restore_one(&by_stable_id("X"), "status", &update.process_id.unwrap())
        .unwrap();
    assert_eq!(stored(&engine, "X")["status"], json!(null));
}

#[test]
fn test_restore_all_undoes_update_all() {
    let mut engine = engine_with(vec![
        doc(json!({"stable_id": "A", "status": "a"})),
        doc(json!({"stable_id": "B", "status": "b"})),
        doc(json!({"stable_id": "C", "status": "new"})),
    ]);
    let update = engine.update_all("status", json!("new")).unwrap();
    assert_eq!(update.updated, 2);

    let report = engine.restore_all(&update.process_id.unwrap()).unwrap();
    assert_eq!(report.updated, 2);
    // C never got an entry for that update.
    assert_eq!(report.skipped, 1);

    assert_eq!(stored(&engine, "A")["status"], json!("a"));
    assert_eq!(stored(&engine, "B")["status"], json!("b"));
    assert_eq!(stored(&engine, "C")["status"], json!("new"));
    assert_eq!(newest_entry(&engine, "A").operation, "restore_all");
}

#[test]
fn test_restore_all_refuses_rename_entries() {
    let mut engine = engine_with(vec![doc(json!({"stable_id": "A", "old": 1}))]);
    let rename = engine.rename_all("old", "new").unwrap();

    let report = engine.restore_all(&rename.process_id.unwrap()).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, Error::NotRestorable { .. }));
    assert!(report.process_id.is_none());
}
