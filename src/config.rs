use crate::core::{Result, TableError};
use serde::Deserialize;
use std::time::Duration;

/// Hard per-request item limit of a batch write.
pub const BATCH_WRITE_LIMIT: usize = 25;

/// Hard per-request item limit of a transactional write.
pub const TRANSACT_WRITE_LIMIT: usize = 100;

/// Bounded exponential backoff for resubmitting unprocessed batch entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Resubmissions after the first attempt; 0 disables them.
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before resubmission number `attempt` (0-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32) as u32).unwrap_or(u64::MAX);
        let delay = self.base_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Settings of one single-table handle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Name of the shared table
    pub table_name: String,

    /// Items per batch-write chunk, at most [`BATCH_WRITE_LIMIT`]
    pub batch_chunk_size: usize,

    /// Batch chunks in flight at once
    pub batch_concurrency: usize,

    /// Operations per transaction chunk, kept below [`TRANSACT_WRITE_LIMIT`]
    pub transaction_chunk_size: usize,

    /// Resubmission of unprocessed batch entries
    pub unprocessed_retry: RetryPolicy,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_name: "app-table".to_string(),
            batch_chunk_size: BATCH_WRITE_LIMIT,
            batch_concurrency: 8,
            transaction_chunk_size: 25,
            unprocessed_retry: RetryPolicy::default(),
        }
    }
}

impl TableConfig {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            ..Self::default()
        }
    }

    /// Set the batch chunk size
    pub fn batch_chunk_size(mut self, size: usize) -> Self {
        self.batch_chunk_size = size;
        self
    }

    /// Set how many batch chunks run concurrently
    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency;
        self
    }

    /// Set the transaction chunk size
    pub fn transaction_chunk_size(mut self, size: usize) -> Self {
        self.transaction_chunk_size = size;
        self
    }

    /// Set the unprocessed-entry retry policy
    pub fn unprocessed_retry(mut self, policy: RetryPolicy) -> Self {
        self.unprocessed_retry = policy;
        self
    }

    /// Parse from a JSON document; absent fields take their defaults.
    ///
    /// ```
    /// let json = r#"{"table_name": "main", "batch_chunk_size": 10}"#;
    /// let config = unitable::TableConfig::from_json(json).unwrap();
    /// assert_eq!(config.batch_chunk_size, 10);
    /// assert_eq!(config.transaction_chunk_size, 25);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TableError::validation(format!("invalid table config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(TableError::validation("table name is empty"));
        }
        if self.batch_chunk_size == 0 || self.batch_chunk_size > BATCH_WRITE_LIMIT {
            return Err(TableError::validation(format!(
                "batch chunk size must be within 1..={}, got {}",
                BATCH_WRITE_LIMIT, self.batch_chunk_size
            )));
        }
        if self.batch_concurrency == 0 {
            return Err(TableError::validation("batch concurrency must be at least 1"));
        }
        if self.transaction_chunk_size == 0 || self.transaction_chunk_size >= TRANSACT_WRITE_LIMIT {
            return Err(TableError::validation(format!(
                "transaction chunk size must be within 1..{}, got {}",
                TRANSACT_WRITE_LIMIT, self.transaction_chunk_size
            )));
        }
        Ok(())
    }
}
