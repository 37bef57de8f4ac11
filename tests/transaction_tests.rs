mod common;

use common::*;
use unitable::core::BackendError;
use unitable::{
    EntityType, InMemoryBackend, KeyInput, KeyPair, Operation, Patch, Record, SingleTable,
    TableConfig, TableError, TransactOp,
};

fn pairing(id: &str, a: &str, b: &str) -> Record {
    let input = KeyInput::new()
        .with("pairingId", id)
        .with("userAId", a)
        .with("userBId", b)
        .with("createdAt", "2024-05-01T12:00:00Z");
    EntityType::Pairing
        .scheme()
        .record(&input)
        .unwrap()
        .with_attribute("userAId", a)
        .with_attribute("userBId", b)
}

fn pairing_request(sender: &str, receiver: &str) -> Record {
    let input = KeyInput::new()
        .with("senderId", sender)
        .with("receiverId", receiver)
        .with("createdAt", "2024-05-01T11:00:00Z");
    EntityType::PairingRequest
        .scheme()
        .record(&input)
        .unwrap()
}

fn finalize_pairing(pairing_id: &str, sender: &str, receiver: &str) -> Vec<TransactOp> {
    let back_reference = Patch::new().set("pairingId", pairing_id);
    vec![
        TransactOp::Put(pairing(pairing_id, sender, receiver)),
        TransactOp::Delete(pairing_request(sender, receiver).key()),
        TransactOp::update(user(sender, "alice").key(), back_reference.clone()),
        TransactOp::update(user(receiver, "bob").key(), back_reference),
    ]
}

async fn seed_pairing_state(table: &SingleTable, with_receiver: bool) {
    table.put(user("u1", "alice")).await.unwrap();
    if with_receiver {
        table.put(user("u2", "bob")).await.unwrap();
    }
    table.put(pairing_request("u1", "u2")).await.unwrap();
}

#[tokio::test]
async fn test_pairing_finalization_commits_together() {
    let table = table();
    seed_pairing_state(&table, true).await;

    let report = table.transact(finalize_pairing("p1", "u1", "u2")).await.unwrap();
    assert_eq!(report.chunks, 1);
    assert_eq!(report.operations, 4);

    let created = table.get_required(&pairing("p1", "u1", "u2").key()).await.unwrap();
    assert_eq!(created.get_str("userBId"), Some("u2"));
    assert!(table.get(&pairing_request("u1", "u2").key()).await.unwrap().is_none());
    for (id, name) in [("u1", "alice"), ("u2", "bob")] {
        let account = table.get_required(&user(id, name).key()).await.unwrap();
        assert_eq!(account.get_str("pairingId"), Some("p1"));
    }
}

#[tokio::test]
async fn test_failed_operation_leaves_no_effects() {
    let table = table();
    // u2 never created: its back-reference update must fail the transaction
    seed_pairing_state(&table, false).await;

    let err = table.transact(finalize_pairing("p1", "u1", "u2")).await.unwrap_err();
    assert_eq!(err.operation(), Some(Operation::TransactWrite));
    assert!(matches!(
        err,
        TableError::Internal {
            source: BackendError::TransactionCanceled(_),
            ..
        }
    ));

    assert!(table.get(&pairing("p1", "u1", "u2").key()).await.unwrap().is_none());
    assert!(table.get(&pairing_request("u1", "u2").key()).await.unwrap().is_some());
    let sender = table.get_required(&user("u1", "alice").key()).await.unwrap();
    assert!(sender.get("pairingId").is_none());
}

#[tokio::test]
async fn test_injected_fault_cancels_transaction() {
    let inner = InMemoryBackend::new();
    let (table, backend) = recording_table(inner, TableConfig::new(TABLE));
    seed_pairing_state(&table, true).await;
    backend.inner.inject_fault(user("u2", "bob").key()).await;

    assert!(table.transact(finalize_pairing("p1", "u1", "u2")).await.is_err());
    assert!(table.get(&pairing("p1", "u1", "u2").key()).await.unwrap().is_none());
    assert_eq!(backend.transaction_requests().await.len(), 1);
}

#[tokio::test]
async fn test_chunks_commit_in_order_and_stop_at_first_failure() {
    let config = TableConfig::new(TABLE).transaction_chunk_size(2);
    let (table, backend) = recording_table(InMemoryBackend::new(), config);

    let ops = vec![
        TransactOp::Put(tag("n1", "a")),
        TransactOp::Put(tag("n1", "b")),
        TransactOp::Put(tag("n1", "c")),
        TransactOp::update(KeyPair::new("tag#n1", "tag#missing"), Patch::new().set("x", 1)),
        TransactOp::Put(tag("n1", "e")),
    ];
    let err = table.transact(ops).await.unwrap_err();

    match &err {
        TableError::Internal { key, .. } => assert_eq!(key, "chunk 2 of 3 (1 committed)"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.transaction_requests().await.len(), 2);
    assert!(table.get(&tag("n1", "b").key()).await.unwrap().is_some());
    assert!(table.get(&tag("n1", "c").key()).await.unwrap().is_none());
    assert!(table.get(&tag("n1", "e").key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_same_key_twice_is_validation_error() {
    let (table, backend) = recording_table(InMemoryBackend::new(), TableConfig::new(TABLE));
    let record = tag("n1", "a");

    let err = table
        .transact(vec![TransactOp::Put(record.clone()), TransactOp::Delete(record.key())])
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(backend.transaction_requests().await.is_empty());
}

#[tokio::test]
async fn test_spans_entity_types() {
    let table = table();
    let account = user(&new_id(), "carol");
    let memo = note("u9", &new_id(), "2024-07-01");
    table.put(account.clone()).await.unwrap();

    table
        .transact(vec![
            TransactOp::Put(memo.clone()),
            TransactOp::update(account.key(), Patch::new().set("lastNoteAt", "2024-07-01")),
        ])
        .await
        .unwrap();

    assert!(table.get(&memo.key()).await.unwrap().is_some());
    let updated = table.get_required(&account.key()).await.unwrap();
    assert_eq!(updated.get_str("lastNoteAt"), Some("2024-07-01"));
}
