mod common;

use common::doc;
use fieldlog::{ChangedValues, Error, FieldDescriptor, LogEntry, Operation, ledger};
use serde_json::{Value, json};

fn change(added: Value, removed: Value) -> ChangedValues {
    ChangedValues {
        added: added.as_array().cloned().unwrap_or_default(),
        removed: removed.as_array().cloned().unwrap_or_default(),
    }
}

#[test]
fn test_operation_tags() {
    assert_eq!(Operation::UpdateWithFile.as_str(), "update_with_file");
    assert_eq!(Operation::Insert.overwrite_tag(), "insert-overwrite");
    assert_eq!(
        serde_json::to_value(Operation::RestoreAll).unwrap(),
        json!("restore_all")
    );
}

#[test]
fn test_restorable_tags() {
    assert!(ledger::is_restorable_tag("update_one"));
    assert!(ledger::is_restorable_tag("Update_All"));
    assert!(ledger::is_restorable_tag("restore_one"));
    assert!(!ledger::is_restorable_tag("remove_one"));
    assert!(!ledger::is_restorable_tag("insert-overwrite"));
    assert!(!ledger::is_restorable_tag("rename_all"));
}

#[test]
fn test_single_entry_wire_shape() {
    let entry = LogEntry::single("p1", "update_one", "tags", change(json!(["c"]), json!(["b"])));
    assert_eq!(
        serde_json::to_value(&entry).unwrap(),
        json!({
            "log_id": "p1",
            "operation": "update_one",
            "modified_field": "tags",
            "changed_values": {"added": ["c"], "removed": ["b"]}
        })
    );
}

#[test]
fn test_insert_entry_wire_shape() {
    let entry = LogEntry::new("p1", "insert");
    assert_eq!(
        serde_json::to_value(&entry).unwrap(),
        json!({"log_id": "p1", "operation": "insert"})
    );
}

#[test]
fn test_append_prepends_and_keeps_history() {
    let d = doc(json!({"log": [{"log_id": "old", "operation": "insert"}]}));
    let log = ledger::append(&d, &LogEntry::new("new", "update_one")).unwrap();
    assert_eq!(
        log,
        json!([
            {"log_id": "new", "operation": "update_one"},
            {"log_id": "old", "operation": "insert"}
        ])
    );
}

#[test]
fn test_entries_of_document_without_log() {
    assert!(ledger::entries(&doc(json!({"a": 1}))).unwrap().is_empty());
}

#[test]
fn test_malformed_log_is_invalid_input() {
    let err = ledger::entries(&doc(json!({"log": [{"nope": 1}]}))).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_change_for_reads_both_entry_shapes() {
    let single = LogEntry::single("p", "update_one", "a", change(json!([1]), json!([])));
    assert_eq!(single.change_for("a").unwrap().0, &[json!(1)]);
    assert!(single.change_for("b").is_none());

    let multi = LogEntry::multi(
        "p",
        "insert-overwrite",
        vec![
            FieldDescriptor::marker("x"),
            FieldDescriptor::changed("y", change(json!([2]), json!([1]))),
        ],
    );
    assert_eq!(multi.change_for("y").unwrap().1, &[json!(1)]);
    assert!(multi.change_for("x").unwrap().0.is_empty());
    assert_eq!(multi.value_fields(), vec!["y"]);
}

#[test]
fn test_restore_single_step() {
    let log = vec![LogEntry::single(
        "p1",
        "update_one",
        "tags",
        change(json!(["c"]), json!(["b"])),
    )];
    let restored = ledger::restore(&log, "p1", "tags", Some(&json!(["a", "c"]))).unwrap();
    assert_eq!(restored, json!(["a", "b"]));
}

#[test]
fn test_restore_walks_every_newer_entry() {
    // v1 -> v2 (p1), v2 -> v3 (p2). Restoring p1 must undo p2 as well.
    let log = vec![
        LogEntry::single("p2", "update_one", "status", change(json!(["v3"]), json!(["v2"]))),
        LogEntry::single("p1", "update_one", "status", change(json!(["v2"]), json!(["v1"]))),
    ];
    let current = json!("v3");
    assert_eq!(
        ledger::restore(&log, "p2", "status", Some(&current)).unwrap(),
        json!("v2")
    );
    assert_eq!(
        ledger::restore(&log, "p1", "status", Some(&current)).unwrap(),
        json!("v1")
    );
}

#[test]
fn test_restore_skips_entries_for_other_fields() {
    let log = vec![
        LogEntry::single("p2", "update_one", "other", change(json!(["z"]), json!([]))),
        LogEntry::single("p1", "update_one", "status", change(json!(["v2"]), json!(["v1"]))),
    ];
    assert_eq!(
        ledger::restore(&log, "p1", "status", Some(&json!("v2"))).unwrap(),
        json!("v1")
    );
}

#[test]
fn test_restore_of_created_field_yields_null() {
    let log = vec![LogEntry::single("p1", "update_one", "status", change(json!(["v1"]), json!([])))];
    assert_eq!(
        ledger::restore(&log, "p1", "status", Some(&json!("v1"))).unwrap(),
        json!(null)
    );
}

#[test]
fn test_restore_unknown_log_id() {
    let log = vec![LogEntry::new("p1", "insert")];
    let err = ledger::restore(&log, "nope", "tags", None).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_restore_refuses_remove_entries() {
    let log = vec![LogEntry::multi(
        "p1",
        "remove_one",
        vec![FieldDescriptor::changed("tags", change(json!([]), json!(["a"])))],
    )];
    let err = ledger::restore(&log, "p1", "tags", None).unwrap_err();
    assert!(matches!(
        err,
        Error::NotRestorable { ref operation, .. } if operation == "remove_one"
    ));
}

#[test]
fn test_restore_requires_entry_to_describe_field() {
    let log = vec![LogEntry::single("p1", "update_one", "a", change(json!([1]), json!([])))];
    let err = ledger::restore(&log, "p1", "b", Some(&json!(2))).unwrap_err();
    assert!(matches!(err, Error::FieldAbsent { ref path } if path == "b"));
}
