pub mod batch;
pub mod context;
pub mod crud;
pub mod query;
pub mod transaction;

pub use context::ExecutionContext;
pub use query::QueryRequest;
