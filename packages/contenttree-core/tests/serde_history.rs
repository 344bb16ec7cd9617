use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use contenttree_core::{
    ActionKind, ActorId, EntityId, HistoryPayload, HistoryRecord, Memento, RecordId, RenameRef,
    ReorderTarget, Scalar, Value,
};

fn sample_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 3, 1, 9, 30, 0).unwrap()
}

#[test]
fn scalars_and_values_round_trip() {
    let value = Value::Map(BTreeMap::from([
        ("title".to_string(), Value::str("Hello")),
        ("count".to_string(), Value::int(3)),
        ("ratio".to_string(), Value::Scalar(Scalar::Float(0.5))),
        ("flag".to_string(), Value::bool(true)),
        ("none".to_string(), Value::null()),
        (
            "when".to_string(),
            Value::Scalar(Scalar::Date(sample_time())),
        ),
        (
            "tags".to_string(),
            Value::List(vec![Value::str("a"), Value::str("b")]),
        ),
    ]));
    let json = serde_json::to_string(&value).unwrap();
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, value);
}

#[test]
fn edit_records_round_trip_with_their_patches() {
    let record = HistoryRecord {
        id: RecordId(7),
        time: sample_time(),
        actor: Some(ActorId::new("editor")),
        action: ActionKind::Edit,
        entity_ids: vec![EntityId(42)],
        payload: HistoryPayload::Edit {
            object_path: "/news/today".to_string(),
            changes: vec![
                ("title".to_string(), Scalar::Str("Old title".to_string())),
                (
                    "body".to_string(),
                    Scalar::Str("@@ =10\t-new\t+old".to_string()),
                ),
                ("tags.__len__".to_string(), Scalar::Int(2)),
            ],
        },
    };
    let json = serde_json::to_string(&record).unwrap();
    let back: HistoryRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn structural_records_round_trip() {
    let rename = HistoryRecord {
        id: RecordId(8),
        time: sample_time(),
        actor: None,
        action: ActionKind::Rename,
        entity_ids: vec![EntityId(1), EntityId(2)],
        payload: HistoryPayload::Rename {
            parent_id: EntityId(1),
            parent_path: "/".to_string(),
            children: vec![RenameRef {
                id: EntityId(2),
                old_name: "draft".to_string(),
                new_name: "final".to_string(),
            }],
        },
    };
    let reorder = HistoryRecord {
        id: RecordId(9),
        time: sample_time(),
        actor: Some(ActorId::new("editor")),
        action: ActionKind::Reorder,
        entity_ids: vec![EntityId(1)],
        payload: HistoryPayload::Reorder {
            parent_id: EntityId(1),
            parent_path: "/".to_string(),
            child_names: vec!["b".to_string(), "d".to_string()],
            target: ReorderTarget::Top,
            delta: None,
        },
    };
    for record in [rename, reorder] {
        let json = serde_json::to_string(&record).unwrap();
        let back: HistoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}

#[test]
fn mementos_round_trip() {
    let memento = Memento {
        orig_name: "post".to_string(),
        orig_parent_id: EntityId(5),
        orig_parent_path: "/news".to_string(),
        trashed_at: sample_time(),
        trashed_by: Some(ActorId::new("editor")),
    };
    let json = serde_json::to_string(&memento).unwrap();
    let back: Memento = serde_json::from_str(&json).unwrap();
    assert_eq!(back, memento);
}

#[test]
fn action_kinds_use_snake_case_on_the_wire() {
    assert_eq!(
        serde_json::to_string(&ActionKind::Edit).unwrap(),
        "\"edit\""
    );
    assert_eq!(
        serde_json::to_string(&ReorderTarget::Bottom).unwrap(),
        "\"bottom\""
    );
}
