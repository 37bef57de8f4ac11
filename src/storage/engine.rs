use crate::core::{BackendResult, IndexName, Item, KeyPair};
use crate::expression::{Filter, KeyCondition, UpdateStatement};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Key attributes of the last item a query examined, used to resume it.
pub type StartKey = BTreeMap<String, String>;

/// A single query round trip as handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    pub index: IndexName,
    pub key_condition: KeyCondition,
    pub filter: Option<Filter>,
    /// Attributes to return; `None` returns whole items.
    pub projection: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<StartKey>,
    pub scan_forward: bool,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOutput {
    pub items: Vec<Item>,
    /// Present when more matching items may follow.
    pub last_evaluated_key: Option<StartKey>,
}

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(KeyPair),
}

/// One operation of an all-or-nothing transactional write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    Put(Item),
    /// Fails the whole transaction when the item does not exist.
    Update {
        key: KeyPair,
        update: UpdateStatement,
    },
    Delete(KeyPair),
}

/// The storage contract the engine runs against.
///
/// Implementations report failures as [`crate::core::BackendError`] and never
/// retry on their own behalf beyond what their client does.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    async fn get_item(
        &self,
        table: &str,
        key: &KeyPair,
        consistent_read: bool,
    ) -> BackendResult<Option<Item>>;

    /// Unconditional overwrite.
    async fn put_item(&self, table: &str, item: Item) -> BackendResult<()>;

    /// Applies a compiled update to an existing item and returns the new item.
    async fn update_item(
        &self,
        table: &str,
        key: &KeyPair,
        update: &UpdateStatement,
    ) -> BackendResult<Item>;

    /// Deleting an absent key succeeds.
    async fn delete_item(&self, table: &str, key: &KeyPair) -> BackendResult<()>;

    async fn query(&self, table: &str, input: &QueryInput) -> BackendResult<QueryOutput>;

    /// Writes up to the backend's batch limit; returns the unprocessed entries.
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> BackendResult<Vec<WriteRequest>>;

    async fn transact_write(&self, table: &str, items: Vec<TransactItem>) -> BackendResult<()>;
}
