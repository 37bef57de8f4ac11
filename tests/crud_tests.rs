mod common;

use common::*;
use std::sync::Arc;
use unitable::core::BackendError;
use unitable::keys::entities::activity::reschedule_patch;
use unitable::{
    Consistency, EntityType, InMemoryBackend, IndexName, KeyCondition, KeyInput, KeyPair,
    Operation, Patch, QueryRequest, SingleTable, TableConfig, TableError, Value,
};

#[tokio::test]
async fn test_put_get_round_trip() {
    let table = table();
    let record = user("u1", "alice")
        .with_attribute("age", 31)
        .with_attribute("score", 4.5)
        .with_attribute("verified", true)
        .with_attribute(
            "tags",
            Value::List(vec![Value::from("a"), Value::from("b")]),
        );

    let stored = table.put(record.clone()).await.unwrap();
    assert_eq!(stored, record);

    let loaded = table.get(&record.key()).await.unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(
        loaded.index_key(IndexName::Gsi1).map(|k| k.sort.as_str()),
        Some("user#alice")
    );
}

#[tokio::test]
async fn test_get_absent_is_none_and_required_is_not_found() {
    let table = table();
    let key = KeyPair::new("user#nobody", "user#nobody");

    assert!(table.get(&key).await.unwrap().is_none());
    let err = table.get_required(&key).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("user#nobody"));
}

#[tokio::test]
async fn test_strong_get_on_base_table() {
    let table = table();
    let record = note("u1", "n1", "2024-01-01");
    table.put(record.clone()).await.unwrap();

    let loaded = table.get_with(&record.key(), Consistency::Strong).await.unwrap();
    assert_eq!(loaded, Some(record));
}

#[tokio::test]
async fn test_put_overwrites() {
    let table = table();
    let first = note("u1", "n1", "2024-01-01").with_attribute("title", "a");
    let second = note("u1", "n1", "2024-01-01").with_attribute("body", "b");

    table.put(first).await.unwrap();
    table.put(second.clone()).await.unwrap();

    let loaded = table.get_required(&second.key()).await.unwrap();
    assert!(loaded.get("title").is_none());
    assert_eq!(loaded.get_str("body"), Some("b"));
}

#[tokio::test]
async fn test_put_rejects_reserved_attribute() {
    let table = table();
    let record = note("u1", "n1", "2024-01-01").with_attribute("partitionKey", "x");
    assert!(table.put(record).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_update_returns_all_new_attributes() {
    let table = table();
    let record = note("u1", "n1", "2024-01-01")
        .with_attribute("title", "draft")
        .with_attribute("status", "open");
    table.put(record.clone()).await.unwrap();

    let patch = Patch::new().set("title", "final").remove("status");
    let updated = table.update(&record.key(), &patch).await.unwrap();

    assert_eq!(updated.get_str("title"), Some("final"));
    assert!(updated.get("status").is_none());
    assert_eq!(updated.get_str("noteId"), Some("n1"));
    assert_eq!(updated.entity_type, "note");
    assert_eq!(table.get(&record.key()).await.unwrap(), Some(updated));
}

#[tokio::test]
async fn test_update_missing_item_fails() {
    let table = table();
    let err = table
        .update(&KeyPair::new("note#u1", "note#ghost"), &Patch::new().set("title", "x"))
        .await
        .unwrap_err();

    assert_eq!(err.operation(), Some(Operation::Update));
    assert!(table.get(&KeyPair::new("note#u1", "note#ghost")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_rejects_half_an_index_key() {
    let backend = Arc::new(InMemoryBackend::new());
    let table = SingleTable::new(backend.clone(), TableConfig::new(TABLE)).unwrap();
    let record = note("u1", "n1", "2024-01-01");
    table.put(record.clone()).await.unwrap();

    let patch = Patch::new().set("gsi1sort", "note#2024-09-09#n1");
    assert!(table.update(&record.key(), &patch).await.unwrap_err().is_validation());
    assert_eq!(backend.request_count(Operation::Update), 0);
    assert_eq!(table.get(&record.key()).await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_delete_twice_succeeds() {
    let table = table();
    let record = tag("n1", "travel");
    table.put(record.clone()).await.unwrap();

    assert!(table.delete(&record.key()).await.unwrap());
    assert!(table.delete(&record.key()).await.unwrap());
    assert!(table.get(&record.key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_backend_failure_classified_with_operation_and_key() {
    let backend = Arc::new(InMemoryBackend::new());
    let table = SingleTable::new(backend.clone(), TableConfig::new(TABLE)).unwrap();
    let record = note("u1", "n1", "2024-01-01");
    backend.inject_fault(record.key()).await;

    let err = table.put(record.clone()).await.unwrap_err();
    match err {
        TableError::Internal {
            operation,
            key,
            source,
        } => {
            assert_eq!(operation, Operation::Put);
            assert_eq!(key, record.key().to_string());
            assert!(matches!(source, BackendError::Service(_)));
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = table.delete(&record.key()).await.unwrap_err();
    assert_eq!(err.operation(), Some(Operation::Delete));
    // no retries
    assert_eq!(backend.request_count(Operation::Put), 1);
}

#[tokio::test]
async fn test_reschedule_moves_recurring_event() {
    let table = table();
    let input = KeyInput::new()
        .with("pairingId", "p1")
        .with("eventId", "e1")
        .with("startsAt", "2024-02-14T19:00:00Z")
        .with("date", "2023-02-14");
    let event = EntityType::CalendarEvent
        .scheme()
        .record(&input)
        .unwrap()
        .with_attribute("date", "2023-02-14");
    table.put(event.clone()).await.unwrap();

    let patch = reschedule_patch("e1", "2023-03-01").unwrap();
    let updated = table.update(&event.key(), &patch).await.unwrap();
    assert_eq!(updated.get_str("date"), Some("2023-03-01"));

    let old_day = QueryRequest::on_index(
        IndexName::Gsi2,
        KeyCondition::partition("event#recurring#02-14"),
    );
    let new_day = QueryRequest::on_index(
        IndexName::Gsi2,
        KeyCondition::partition("event#recurring#03-01"),
    );
    assert!(table.query_all(&old_day).await.unwrap().is_empty());
    let moved = table.query_all(&new_day).await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].key(), event.key());
}
