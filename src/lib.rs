// ============================================================================
// unitable Library
// ============================================================================

//! Single-table access engine.
//!
//! Heterogeneous entities share one wide key-value table: every item carries
//! a composite `partitionKey`/`sortKey`, an `entityType` tag and up to four
//! secondary-index key pairs. This crate builds those keys deterministically,
//! compiles partial updates, and runs CRUD, paginated queries, chunked
//! batches and atomic transactions against a pluggable [`StorageBackend`].
//!
//! ```
//! use unitable::{
//!     EntityType, KeyCondition, KeyInput, Patch, QueryRequest, SingleTable, TableConfig,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> unitable::Result<()> {
//! let table = SingleTable::in_memory(TableConfig::new("app"))?;
//!
//! let input = KeyInput::new()
//!     .with("ownerId", "u1")
//!     .with("noteId", "n1")
//!     .with("updatedAt", "2024-03-01T10:00:00Z");
//! let note = EntityType::Note.scheme().record(&input)?.with_attribute("title", "groceries");
//! table.put(note.clone()).await?;
//!
//! let updated = table
//!     .update(&note.key(), &Patch::new().set("title", "errands").remove("draft"))
//!     .await?;
//! assert_eq!(updated.get_str("title"), Some("errands"));
//!
//! let page = table.query(&QueryRequest::new(KeyCondition::partition("note#u1"))).await?;
//! assert_eq!(page.items.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod executor;
pub mod expression;
pub mod facade;
pub mod keys;
pub mod result;
pub mod storage;

// Re-export main types for convenience
pub use config::{RetryPolicy, TableConfig};
pub use crate::core::{
    BackendError, IndexKey, IndexName, Item, KeyPair, Operation, Record, RecordKeys, Result,
    TableError, Value,
};
pub use executor::QueryRequest;
pub use expression::{Filter, KeyCondition, Patch, PatchValue, SortCondition, UpdateStatement};
pub use facade::SingleTable;
pub use keys::{EntityType, KeyInput, KeyRegistry, KeyScheme};
pub use result::{
    BatchOp, BatchReport, ChunkOutcome, Consistency, Cursor, Order, QueryPage, TransactOp,
    TransactReport,
};
pub use storage::{InMemoryBackend, StorageBackend};

#[cfg(feature = "dynamodb")]
pub use storage::{DynamoDbBackend, DynamoDbConfig};
