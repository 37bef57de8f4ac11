#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use unitable::core::{BackendResult, Item};
use unitable::expression::UpdateStatement;
use unitable::storage::{QueryInput, QueryOutput, TransactItem, WriteRequest};
use unitable::{
    EntityType, InMemoryBackend, KeyInput, KeyPair, Record, SingleTable, StorageBackend,
    TableConfig,
};

/// Wraps the in-memory backend and captures every batch and transaction
/// request as the key list it carried.
pub struct RecordingBackend {
    pub inner: InMemoryBackend,
    pub batches: Mutex<Vec<Vec<KeyPair>>>,
    pub transactions: Mutex<Vec<Vec<KeyPair>>>,
}

impl RecordingBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
            transactions: Mutex::new(Vec::new()),
        }
    }

    pub async fn batch_requests(&self) -> Vec<Vec<KeyPair>> {
        self.batches.lock().await.clone()
    }

    pub async fn transaction_requests(&self) -> Vec<Vec<KeyPair>> {
        self.transactions.lock().await.clone()
    }
}

fn write_key(request: &WriteRequest) -> KeyPair {
    match request {
        WriteRequest::Put(item) => KeyPair::from_item(item).unwrap(),
        WriteRequest::Delete(key) => key.clone(),
    }
}

fn transact_key(item: &TransactItem) -> KeyPair {
    match item {
        TransactItem::Put(item) => KeyPair::from_item(item).unwrap(),
        TransactItem::Update { key, .. } | TransactItem::Delete(key) => key.clone(),
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn get_item(
        &self,
        table: &str,
        key: &KeyPair,
        consistent_read: bool,
    ) -> BackendResult<Option<Item>> {
        self.inner.get_item(table, key, consistent_read).await
    }

    async fn put_item(&self, table: &str, item: Item) -> BackendResult<()> {
        self.inner.put_item(table, item).await
    }

    async fn update_item(
        &self,
        table: &str,
        key: &KeyPair,
        update: &UpdateStatement,
    ) -> BackendResult<Item> {
        self.inner.update_item(table, key, update).await
    }

    async fn delete_item(&self, table: &str, key: &KeyPair) -> BackendResult<()> {
        self.inner.delete_item(table, key).await
    }

    async fn query(&self, table: &str, input: &QueryInput) -> BackendResult<QueryOutput> {
        self.inner.query(table, input).await
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> BackendResult<Vec<WriteRequest>> {
        self.batches
            .lock()
            .await
            .push(requests.iter().map(write_key).collect());
        self.inner.batch_write(table, requests).await
    }

    async fn transact_write(&self, table: &str, items: Vec<TransactItem>) -> BackendResult<()> {
        self.transactions
            .lock()
            .await
            .push(items.iter().map(transact_key).collect());
        self.inner.transact_write(table, items).await
    }
}

pub const TABLE: &str = "app-table";

pub fn table() -> SingleTable {
    SingleTable::in_memory(TableConfig::new(TABLE)).unwrap()
}

/// A handle over a recording backend, returning the backend for inspection.
pub fn recording_table(
    inner: InMemoryBackend,
    config: TableConfig,
) -> (SingleTable, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::new(inner));
    let table = SingleTable::new(backend.clone(), config).unwrap();
    (table, backend)
}

pub fn user(id: &str, username: &str) -> Record {
    let input = KeyInput::new().with("userId", id).with("username", username);
    EntityType::User
        .scheme()
        .record(&input)
        .unwrap()
        .with_attribute("userId", id)
        .with_attribute("username", username)
}

pub fn note(owner: &str, id: &str, updated_at: &str) -> Record {
    let input = KeyInput::new()
        .with("ownerId", owner)
        .with("noteId", id)
        .with("updatedAt", updated_at);
    EntityType::Note
        .scheme()
        .record(&input)
        .unwrap()
        .with_attribute("noteId", id)
        .with_attribute("updatedAt", updated_at)
}

pub fn tag(target: &str, name: &str) -> Record {
    let input = KeyInput::new().with("targetId", target).with("tagName", name);
    EntityType::Tag.scheme().record(&input).unwrap()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
