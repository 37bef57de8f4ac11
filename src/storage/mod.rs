pub mod engine;
pub mod memory;
pub mod table;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use engine::{QueryInput, QueryOutput, StartKey, StorageBackend, TransactItem, WriteRequest};
pub use memory::InMemoryBackend;
pub use table::MemoryTable;
#[cfg(feature = "dynamodb")]
pub use dynamodb::{DynamoDbBackend, DynamoDbConfig};
