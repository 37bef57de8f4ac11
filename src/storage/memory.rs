use super::engine::{QueryInput, QueryOutput, StorageBackend, TransactItem, WriteRequest};
use super::table::MemoryTable;
use crate::config::{BATCH_WRITE_LIMIT, TRANSACT_WRITE_LIMIT};
use crate::core::{BackendError, BackendResult, Item, KeyPair, Operation};
use crate::expression::UpdateStatement;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

const OPERATIONS: [Operation; 7] = [
    Operation::Get,
    Operation::Put,
    Operation::Update,
    Operation::Delete,
    Operation::Query,
    Operation::BatchWrite,
    Operation::TransactWrite,
];

/// A process-local backend with the same observable contract as the
/// managed store: conditional updates, ordered partitions, four secondary
/// indexes, batch and transactional writes.
///
/// Every table lives under one lock, so a transaction is applied all at once.
/// Tables come into existence on first write.
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, MemoryTable>>,
    /// Keys whose writes fail with a service error
    faults: RwLock<HashSet<KeyPair>>,
    /// Entries a single batch call accepts before reporting the rest unprocessed
    batch_capacity: Option<usize>,
    requests: [AtomicUsize; 7],
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            faults: RwLock::new(HashSet::new()),
            batch_capacity: None,
            requests: Default::default(),
        }
    }

    /// Simulates throttling: each batch call writes at most `capacity`
    /// entries and hands the rest back as unprocessed.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = Some(capacity);
        self
    }

    /// Makes every subsequent write touching `key` fail.
    pub async fn inject_fault(&self, key: KeyPair) {
        self.faults.write().await.insert(key);
    }

    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    /// Number of items stored in `table`.
    pub async fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(MemoryTable::row_count)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, table: &str) -> bool {
        self.len(table).await == 0
    }

    /// Calls received for `operation`, failed ones included.
    pub fn request_count(&self, operation: Operation) -> usize {
        self.requests[slot(operation)].load(Ordering::Relaxed)
    }

    /// Non-zero request counters by operation.
    pub fn request_counts(&self) -> HashMap<Operation, usize> {
        OPERATIONS
            .iter()
            .map(|op| (*op, self.request_count(*op)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    fn record(&self, operation: Operation) {
        self.requests[slot(operation)].fetch_add(1, Ordering::Relaxed);
    }

    async fn check_fault(&self, key: &KeyPair) -> BackendResult<()> {
        if self.faults.read().await.contains(key) {
            return Err(BackendError::Service(format!(
                "injected fault for '{}'",
                key
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(operation: Operation) -> usize {
    OPERATIONS
        .iter()
        .position(|op| *op == operation)
        .unwrap_or_default()
}

fn request_key(request: &WriteRequest) -> BackendResult<KeyPair> {
    match request {
        WriteRequest::Put(item) => KeyPair::from_item(item),
        WriteRequest::Delete(key) => Ok(key.clone()),
    }
}

fn transact_key(item: &TransactItem) -> BackendResult<KeyPair> {
    match item {
        TransactItem::Put(item) => KeyPair::from_item(item),
        TransactItem::Update { key, .. } | TransactItem::Delete(key) => Ok(key.clone()),
    }
}

fn apply_transact_item(table: &mut MemoryTable, item: TransactItem) -> BackendResult<()> {
    match item {
        TransactItem::Put(item) => table.put(item),
        TransactItem::Update { key, update } => {
            table.update(&key, update.resolve()?)?;
            Ok(())
        }
        TransactItem::Delete(key) => {
            table.delete(&key);
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_item(
        &self,
        table: &str,
        key: &KeyPair,
        _consistent_read: bool,
    ) -> BackendResult<Option<Item>> {
        self.record(Operation::Get);
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn put_item(&self, table: &str, item: Item) -> BackendResult<()> {
        self.record(Operation::Put);
        self.check_fault(&KeyPair::from_item(&item)?).await?;
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().put(item)
    }

    async fn update_item(
        &self,
        table: &str,
        key: &KeyPair,
        update: &UpdateStatement,
    ) -> BackendResult<Item> {
        self.record(Operation::Update);
        self.check_fault(key).await?;
        let actions = update.resolve()?;
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().update(key, actions)
    }

    async fn delete_item(&self, table: &str, key: &KeyPair) -> BackendResult<()> {
        self.record(Operation::Delete);
        self.check_fault(key).await?;
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get_mut(table) {
            t.delete(key);
        }
        Ok(())
    }

    async fn query(&self, table: &str, input: &QueryInput) -> BackendResult<QueryOutput> {
        self.record(Operation::Query);
        if input.consistent_read && input.index.is_secondary() {
            return Err(BackendError::Service(format!(
                "consistent reads are not supported on index {}",
                input.index
            )));
        }
        if input.limit == Some(0) {
            return Err(BackendError::Service("limit must be positive".to_string()));
        }
        let tables = self.tables.read().await;
        match tables.get(table) {
            Some(t) => t.query(input),
            None => Ok(QueryOutput::default()),
        }
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> BackendResult<Vec<WriteRequest>> {
        self.record(Operation::BatchWrite);
        if requests.len() > BATCH_WRITE_LIMIT {
            return Err(BackendError::Service(format!(
                "batch of {} exceeds the limit of {}",
                requests.len(),
                BATCH_WRITE_LIMIT
            )));
        }

        let mut seen = HashSet::with_capacity(requests.len());
        for request in &requests {
            let key = request_key(request)?;
            self.check_fault(&key).await?;
            if !seen.insert(key.clone()) {
                return Err(BackendError::Service(format!(
                    "batch contains duplicate key '{}'",
                    key
                )));
            }
        }

        let capacity = self.batch_capacity.unwrap_or(requests.len());
        let mut requests = requests;
        let unprocessed = requests.split_off(capacity.min(requests.len()));

        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_string()).or_default();
        for request in requests {
            match request {
                WriteRequest::Put(item) => t.put(item)?,
                WriteRequest::Delete(key) => {
                    t.delete(&key);
                }
            }
        }
        Ok(unprocessed)
    }

    async fn transact_write(&self, table: &str, items: Vec<TransactItem>) -> BackendResult<()> {
        self.record(Operation::TransactWrite);
        if items.len() > TRANSACT_WRITE_LIMIT {
            return Err(BackendError::Service(format!(
                "transaction of {} exceeds the limit of {}",
                items.len(),
                TRANSACT_WRITE_LIMIT
            )));
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            let key = transact_key(item)?;
            if self.faults.read().await.contains(&key) {
                return Err(BackendError::TransactionCanceled(format!(
                    "injected fault for '{}'",
                    key
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(BackendError::Service(format!(
                    "transaction touches '{}' more than once",
                    key
                )));
            }
        }

        let mut tables = self.tables.write().await;
        let mut staged = tables.get(table).cloned().unwrap_or_default();
        for (position, item) in items.into_iter().enumerate() {
            apply_transact_item(&mut staged, item).map_err(|e| {
                BackendError::TransactionCanceled(format!("operation {} failed: {}", position, e))
            })?;
        }
        tables.insert(table.to_string(), staged);
        Ok(())
    }
}
