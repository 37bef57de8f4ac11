pub mod error;
pub mod record;
pub mod value;

pub use error::{BackendError, BackendResult, Operation, Result, TableError};
pub use record::{
    ENTITY_TYPE, INDEX_SLOTS, IndexKey, IndexName, Item, KeyPair, PARTITION_KEY, Record, RecordKeys,
    SORT_KEY, is_reserved_attribute,
};
pub use value::Value;
