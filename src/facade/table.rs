use crate::config::TableConfig;
use crate::core::{KeyPair, Record, Result};
use crate::executor::{ExecutionContext, QueryRequest, batch, crud, query, transaction};
use crate::expression::Patch;
use crate::result::{BatchOp, BatchReport, Consistency, QueryPage, TransactOp, TransactReport};
use crate::storage::{InMemoryBackend, StorageBackend};
use std::future::Future;
use std::sync::Arc;

/// Handle on one shared table.
///
/// Cheap to clone; clones share the backend. The handle keeps no mutable
/// state of its own, so it can be passed freely across tasks.
///
/// ```
/// use unitable::{EntityType, KeyInput, SingleTable, TableConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> unitable::Result<()> {
/// let table = SingleTable::in_memory(TableConfig::new("app"))?;
/// let input = KeyInput::new().with("userId", "u1").with("username", "alice");
/// let user = EntityType::User.scheme().record(&input)?.with_attribute("username", "alice");
///
/// table.put(user.clone()).await?;
/// assert_eq!(table.get(&user.key()).await?, Some(user));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SingleTable {
    ctx: ExecutionContext,
}

impl SingleTable {
    pub fn new(backend: Arc<dyn StorageBackend>, config: TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ctx: ExecutionContext::new(backend, config),
        })
    }

    /// A handle over a fresh [`InMemoryBackend`].
    pub fn in_memory(config: TableConfig) -> Result<Self> {
        Self::new(Arc::new(InMemoryBackend::new()), config)
    }

    pub fn config(&self) -> &TableConfig {
        &self.ctx.config
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.ctx.backend
    }

    // CRUD

    pub async fn get(&self, key: &KeyPair) -> Result<Option<Record>> {
        crud::get(&self.ctx, key, Consistency::Eventual).await
    }

    /// Read with an explicit consistency level.
    pub async fn get_with(
        &self,
        key: &KeyPair,
        consistency: Consistency,
    ) -> Result<Option<Record>> {
        crud::get(&self.ctx, key, consistency).await
    }

    pub async fn get_required(&self, key: &KeyPair) -> Result<Record> {
        crud::get_required(&self.ctx, key, Consistency::Eventual).await
    }

    pub async fn put(&self, record: Record) -> Result<Record> {
        crud::put(&self.ctx, record).await
    }

    pub async fn update(&self, key: &KeyPair, patch: &Patch) -> Result<Record> {
        crud::update(&self.ctx, key, patch).await
    }

    pub async fn delete(&self, key: &KeyPair) -> Result<bool> {
        crud::delete(&self.ctx, key).await
    }

    // Queries

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryPage<Record>> {
        query::query(&self.ctx, request).await
    }

    pub async fn query_all(&self, request: &QueryRequest) -> Result<Vec<Record>> {
        query::query_all(&self.ctx, request).await
    }

    pub async fn query_mapped<T, F, Fut>(
        &self,
        request: &QueryRequest,
        mapper: F,
    ) -> Result<QueryPage<T>>
    where
        F: Fn(Record) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        query::query_mapped(&self.ctx, request, mapper).await
    }

    pub async fn query_all_mapped<T, F, Fut>(
        &self,
        request: &QueryRequest,
        mapper: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(Record) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        query::query_all_mapped(&self.ctx, request, mapper).await
    }

    // Batches

    pub async fn batch_write(&self, ops: Vec<BatchOp>) -> Result<BatchReport> {
        batch::batch_write(&self.ctx, ops).await
    }

    pub async fn batch_put(&self, records: Vec<Record>) -> Result<BatchReport> {
        self.batch_write(records.into_iter().map(BatchOp::Put).collect())
            .await
    }

    pub async fn batch_delete(&self, keys: Vec<KeyPair>) -> Result<BatchReport> {
        self.batch_write(keys.into_iter().map(BatchOp::Delete).collect())
            .await
    }

    // Transactions

    pub async fn transact(&self, ops: Vec<TransactOp>) -> Result<TransactReport> {
        transaction::transact(&self.ctx, ops).await
    }
}
