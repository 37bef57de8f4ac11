use std::fmt;
use thiserror::Error;

/// The storage call an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Put,
    Update,
    Delete,
    Query,
    BatchWrite,
    TransactWrite,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GetItem",
            Self::Put => "PutItem",
            Self::Update => "UpdateItem",
            Self::Delete => "DeleteItem",
            Self::Query => "Query",
            Self::BatchWrite => "BatchWriteItem",
            Self::TransactWrite => "TransactWriteItems",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by a storage backend.
///
/// Backends map their native errors onto these variants; the engine never
/// inspects them beyond wrapping them in [`TableError::Internal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Conditional check failed: {0}")]
    ConditionFailed(String),

    #[error("Transaction canceled: {0}")]
    TransactionCanceled(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Malformed item: {0}")]
    MalformedItem(String),

    #[error("Service error: {0}")]
    Service(String),
}

#[derive(Error, Debug)]
pub enum TableError {
    /// A caller required an item that does not exist.
    #[error("{entity} not found at '{key}'")]
    NotFound { entity: String, key: String },

    /// A non-success response from the underlying store.
    #[error("{operation} failed for '{key}': {source}")]
    Internal {
        operation: Operation,
        key: String,
        #[source]
        source: BackendError,
    },

    /// Malformed keys, patches or requests, caught before any store call.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl TableError {
    pub fn internal(operation: Operation, key: impl Into<String>, source: BackendError) -> Self {
        Self::Internal {
            operation,
            key: key.into(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The operation that failed, when the error came from the store.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Internal { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;

pub type BackendResult<T> = std::result::Result<T, BackendError>;
