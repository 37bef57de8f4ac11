use super::ExecutionContext;
use crate::core::{KeyPair, Operation, Result, TableError};
use crate::result::{BatchOp, BatchReport, ChunkOutcome};
use crate::storage::WriteRequest;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{Instrument, Level, event, info_span};

/// Splits `ops` into chunks, rejecting a chunk that names one key twice.
pub(crate) fn plan_chunks(ops: Vec<BatchOp>, chunk_size: usize) -> Result<Vec<Vec<BatchOp>>> {
    let mut chunks: Vec<Vec<BatchOp>> = Vec::new();
    let mut seen = HashSet::new();
    for op in ops {
        if let BatchOp::Put(record) = &op {
            record.validate()?;
        } else {
            op.key().validate()?;
        }
        if chunks.last().is_none_or(|chunk| chunk.len() >= chunk_size) {
            chunks.push(Vec::with_capacity(chunk_size));
            seen.clear();
        }
        let key = op.key();
        if !seen.insert(key.clone()) {
            return Err(TableError::validation(format!(
                "batch chunk {} names '{}' twice",
                chunks.len() - 1,
                key
            )));
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(op);
        }
    }
    Ok(chunks)
}

fn to_request(op: BatchOp) -> WriteRequest {
    match op {
        BatchOp::Put(record) => WriteRequest::Put(record.into_item()),
        BatchOp::Delete(key) => WriteRequest::Delete(key),
    }
}

fn request_key(request: &WriteRequest) -> Option<KeyPair> {
    match request {
        WriteRequest::Put(item) => KeyPair::from_item(item).ok(),
        WriteRequest::Delete(key) => Some(key.clone()),
    }
}

/// Writes `ops` in chunks issued concurrently. Chunks fail independently;
/// the report says what happened to each.
pub async fn batch_write(ctx: &ExecutionContext, ops: Vec<BatchOp>) -> Result<BatchReport> {
    let chunks = plan_chunks(ops, ctx.config.batch_chunk_size)?;
    let span = info_span!("table.batch_write", chunks = chunks.len());
    async {
        let outcomes: Vec<ChunkOutcome> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| write_chunk(ctx, index, chunk))
            .buffered(ctx.config.batch_concurrency)
            .collect()
            .await;

        let report = BatchReport { chunks: outcomes };
        event!(
            Level::DEBUG,
            written = report.written(),
            submitted = report.submitted(),
            "batch write finished"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

async fn write_chunk(ctx: &ExecutionContext, index: usize, chunk: Vec<BatchOp>) -> ChunkOutcome {
    let submitted = chunk.len();
    let first_key = chunk.first().map(BatchOp::key);
    let mut pending: Vec<WriteRequest> = chunk.into_iter().map(to_request).collect();
    let policy = &ctx.config.unprocessed_retry;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match ctx.backend.batch_write(ctx.table_name(), pending.clone()).await {
            Ok(unprocessed) if unprocessed.is_empty() => {
                pending.clear();
                break;
            }
            Ok(unprocessed) => {
                pending = unprocessed;
                let retries = attempts - 1;
                if retries >= policy.max_attempts {
                    event!(
                        Level::WARN,
                        chunk = index,
                        left = pending.len(),
                        "unprocessed entries remain after retries"
                    );
                    break;
                }
                event!(
                    Level::WARN,
                    chunk = index,
                    unprocessed = pending.len(),
                    attempt = attempts,
                    "resubmitting unprocessed entries"
                );
                tokio::time::sleep(policy.backoff(retries)).await;
            }
            Err(source) => {
                event!(Level::ERROR, chunk = index, error = %source, "batch chunk failed");
                let key = match &first_key {
                    Some(key) => format!("chunk {} starting at {}", index, key),
                    None => format!("chunk {}", index),
                };
                return ChunkOutcome {
                    index,
                    submitted,
                    written: submitted - pending.len(),
                    attempts,
                    unprocessed: Vec::new(),
                    error: Some(TableError::internal(Operation::BatchWrite, key, source)),
                };
            }
        }
    }

    ChunkOutcome {
        index,
        submitted,
        written: submitted - pending.len(),
        attempts,
        unprocessed: pending.iter().filter_map(request_key).collect(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, RecordKeys};

    fn put(id: usize) -> BatchOp {
        let keys = RecordKeys {
            partition_key: "tag#t".into(),
            sort_key: format!("tag#{}", id),
            ..Default::default()
        };
        BatchOp::Put(Record::new("tag", keys))
    }

    #[test]
    fn test_chunks_preserve_order() {
        let chunks = plan_chunks((0..7).map(put).collect(), 3).unwrap();
        let sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(chunks[1][0].key().sort_key, "tag#3");
    }

    #[test]
    fn test_duplicate_key_in_chunk_rejected() {
        let ops = vec![put(1), BatchOp::Delete(KeyPair::new("tag#t", "tag#1"))];
        assert!(plan_chunks(ops, 25).unwrap_err().is_validation());
    }

    #[test]
    fn test_same_key_in_different_chunks_allowed() {
        let ops = vec![put(1), put(2), put(1)];
        assert_eq!(plan_chunks(ops, 2).unwrap().len(), 2);
    }
}
