//! What the executors hand back: query pages with their resume cursor, and
//! per-chunk reports for batch and transactional writes.

use crate::core::{BackendError, KeyPair, Operation, Record, Result, TableError};
use crate::expression::Patch;
use crate::storage::StartKey;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque pagination token: URL-safe base64 of the JSON last-evaluated key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn encode(key: &StartKey) -> Result<Self> {
        let json = serde_json::to_vec(key)
            .map_err(|e| TableError::validation(format!("cannot encode cursor: {}", e)))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Recovers the key a page ended at. Any corruption is a validation error.
    pub fn decode(&self) -> Result<StartKey> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.0.as_bytes())
            .map_err(|e| TableError::validation(format!("malformed cursor: {}", e)))?;
        let key: StartKey = serde_json::from_slice(&bytes)
            .map_err(|e| TableError::validation(format!("malformed cursor: {}", e)))?;
        if key.is_empty() {
            return Err(TableError::validation("malformed cursor: empty key"));
        }
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Consistency {
    #[default]
    Eventual,
    Strong,
}

impl Consistency {
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Strong)
    }
}

/// Sort-key direction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    /// Feed back into the next request to continue; `None` on the last page.
    pub next_cursor: Option<Cursor>,
    pub consistency: Consistency,
}

impl<T> QueryPage<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Put(Record),
    Delete(KeyPair),
}

impl BatchOp {
    pub fn key(&self) -> KeyPair {
        match self {
            Self::Put(record) => record.key(),
            Self::Delete(key) => key.clone(),
        }
    }
}

/// Outcome of one batch chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Position of the chunk in submission order
    pub index: usize,
    pub submitted: usize,
    pub written: usize,
    /// Requests issued for this chunk, resubmissions included
    pub attempts: usize,
    /// Keys still unprocessed after the last resubmission
    pub unprocessed: Vec<KeyPair>,
    pub error: Option<TableError>,
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.unprocessed.is_empty()
    }
}

/// Per-chunk view of a batch write.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub chunks: Vec<ChunkOutcome>,
}

impl BatchReport {
    pub fn submitted(&self) -> usize {
        self.chunks.iter().map(|c| c.submitted).sum()
    }

    pub fn written(&self) -> usize {
        self.chunks.iter().map(|c| c.written).sum()
    }

    pub fn requests(&self) -> usize {
        self.chunks.iter().map(|c| c.attempts).sum()
    }

    pub fn unprocessed(&self) -> impl Iterator<Item = &KeyPair> {
        self.chunks.iter().flat_map(|c| c.unprocessed.iter())
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(ChunkOutcome::is_success)
    }

    /// Aggregate view: the first chunk error, else any unprocessed leftovers
    /// as a throttling error, else the report itself.
    pub fn into_result(mut self) -> Result<Self> {
        if let Some(error) = self.chunks.iter_mut().find_map(|c| c.error.take()) {
            return Err(error);
        }
        let leftovers: Vec<String> = self.unprocessed().map(KeyPair::to_string).collect();
        if let Some(first) = leftovers.first() {
            return Err(TableError::internal(
                Operation::BatchWrite,
                first.clone(),
                BackendError::Throttled(format!(
                    "{} entries left unprocessed after retries",
                    leftovers.len()
                )),
            ));
        }
        Ok(self)
    }
}

/// One operation of a transactional write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactOp {
    Put(Record),
    Update { key: KeyPair, patch: Patch },
    Delete(KeyPair),
}

impl TransactOp {
    pub fn update(key: KeyPair, patch: Patch) -> Self {
        Self::Update { key, patch }
    }

    pub fn key(&self) -> KeyPair {
        match self {
            Self::Put(record) => record.key(),
            Self::Update { key, .. } | Self::Delete(key) => key.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactReport {
    /// Chunks committed, in order
    pub chunks: usize,
    pub operations: usize,
}
