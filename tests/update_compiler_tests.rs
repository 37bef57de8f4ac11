use serde_json::json;
use unitable::{EntityType, IndexKey, IndexName, KeyInput, Patch, UpdateStatement, Value};

#[test]
fn test_set_and_remove_partition_the_patch() {
    let patch = Patch::from_json(json!({
        "title": "trip",
        "archivedAt": null,
        "pinned": true,
        "color": null,
        "order": 3
    }))
    .unwrap();
    let statement = UpdateStatement::compile(&patch).unwrap();

    let mut set = statement.set_attributes();
    set.sort();
    let mut remove = statement.remove_attributes();
    remove.sort();

    assert_eq!(set, vec!["order", "pinned", "title"]);
    assert_eq!(remove, vec!["archivedAt", "color"]);
    assert!(!set.contains(&"body"));
    assert!(!remove.contains(&"body"));
}

#[test]
fn test_status_null_name_x() {
    let statement = Patch::from_json(json!({"status": null, "name": "x"}))
        .unwrap()
        .compile()
        .unwrap();

    assert_eq!(statement.set_attributes(), vec!["name"]);
    assert_eq!(statement.remove_attributes(), vec!["status"]);
    assert_ne!(statement.set[0].0, statement.remove[0]);
    assert_eq!(statement.values.len(), 1);
    assert_eq!(statement.names.len(), 2);
}

#[test]
fn test_compilation_is_deterministic() {
    let a = Patch::new().set("b", 1).remove("a").set("c", "x");
    let b = Patch::new().set("c", "x").set("b", 1).remove("a");
    assert_eq!(a.compile().unwrap(), b.compile().unwrap());
}

#[test]
fn test_values_never_inlined() {
    let statement = Patch::new()
        .set("status", "SET REMOVE")
        .set("count", 7)
        .compile()
        .unwrap();
    let expression = statement.expression();

    assert!(!expression.contains("status"));
    assert!(!expression.contains("SET REMOVE"));
    assert!(statement.values.values().any(|v| *v == Value::from("SET REMOVE")));
}

#[test]
fn test_rejections() {
    assert!(Patch::new().compile().unwrap_err().is_validation());
    assert!(Patch::new().set("entityType", "note").compile().unwrap_err().is_validation());
    assert!(Patch::new().remove("sortKey").compile().unwrap_err().is_validation());
    assert!(Patch::from_json(json!(["not", "an", "object"])).unwrap_err().is_validation());
}

#[test]
fn test_recomputed_index_keys_travel_with_source_field() {
    let input = KeyInput::new()
        .with("ownerId", "u1")
        .with("noteId", "n1")
        .with("updatedAt", "2024-09-01T00:00:00Z");
    let patch = Patch::new()
        .set("updatedAt", "2024-09-01T00:00:00Z")
        .merge(EntityType::Note.scheme().index_patch(&input).unwrap());
    let statement = patch.compile().unwrap();

    let set = statement.set_attributes();
    assert!(set.contains(&"updatedAt"));
    assert!(set.contains(&"gsi1partition"));
    assert!(set.contains(&"gsi1sort"));
}

#[test]
fn test_index_removal() {
    let patch = Patch::new()
        .set_index(IndexName::Gsi3, IndexKey::new("a", "b"))
        .remove_index(IndexName::Gsi2);
    let statement = patch.compile().unwrap();

    let mut remove = statement.remove_attributes();
    remove.sort();
    assert_eq!(remove, vec!["gsi2partition", "gsi2sort"]);
    assert_eq!(statement.set_attributes().len(), 2);
}
