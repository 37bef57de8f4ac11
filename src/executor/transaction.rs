use super::ExecutionContext;
use crate::core::{Operation, Result, TableError};
use crate::result::{TransactOp, TransactReport};
use crate::storage::TransactItem;
use std::collections::HashSet;
use tracing::{Instrument, Level, event, info_span};

/// Compiles and validates every op up front, grouped into chunks of at most
/// `chunk_size`. Nothing is sent if any op is malformed.
pub(crate) fn plan_chunks(
    ops: Vec<TransactOp>,
    chunk_size: usize,
) -> Result<Vec<Vec<TransactItem>>> {
    let mut chunks: Vec<Vec<TransactItem>> = Vec::new();
    let mut seen = HashSet::new();
    for op in ops {
        let key = op.key();
        key.validate()?;
        if chunks.last().is_none_or(|chunk| chunk.len() >= chunk_size) {
            chunks.push(Vec::with_capacity(chunk_size));
            seen.clear();
        }
        if !seen.insert(key.clone()) {
            return Err(TableError::validation(format!(
                "transaction chunk {} touches '{}' more than once",
                chunks.len() - 1,
                key
            )));
        }

        let item = match op {
            TransactOp::Put(record) => {
                record.validate()?;
                TransactItem::Put(record.into_item())
            }
            TransactOp::Update { key, patch } => TransactItem::Update {
                key,
                update: patch.compile()?,
            },
            TransactOp::Delete(key) => TransactItem::Delete(key),
        };
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(item);
        }
    }
    Ok(chunks)
}

/// Writes `ops` atomically per chunk. Chunks commit in order and the first
/// failed chunk stops the run; earlier chunks stay committed.
pub async fn transact(ctx: &ExecutionContext, ops: Vec<TransactOp>) -> Result<TransactReport> {
    let chunks = plan_chunks(ops, ctx.config.transaction_chunk_size)?;
    let total = chunks.len();
    let span = info_span!("table.transact", chunks = total);
    async {
        let mut report = TransactReport::default();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let size = chunk.len();
            if let Err(source) = ctx.backend.transact_write(ctx.table_name(), chunk).await {
                event!(
                    Level::ERROR,
                    chunk = index,
                    committed = report.chunks,
                    error = %source,
                    "transaction chunk failed"
                );
                return Err(TableError::internal(
                    Operation::TransactWrite,
                    format!(
                        "chunk {} of {} ({} committed)",
                        index + 1,
                        total,
                        report.chunks
                    ),
                    source,
                ));
            }
            report.chunks += 1;
            report.operations += size;
        }

        event!(Level::DEBUG, operations = report.operations, "transaction committed");
        Ok(report)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KeyPair;
    use crate::expression::Patch;

    #[test]
    fn test_invalid_patch_fails_before_any_chunk() {
        let ops = vec![
            TransactOp::Delete(KeyPair::new("a", "1")),
            TransactOp::update(KeyPair::new("a", "2"), Patch::new()),
        ];
        assert!(plan_chunks(ops, 25).unwrap_err().is_validation());
    }

    #[test]
    fn test_repeated_key_rejected() {
        let ops = vec![
            TransactOp::Delete(KeyPair::new("a", "1")),
            TransactOp::update(KeyPair::new("a", "1"), Patch::new().set("x", 1)),
        ];
        assert!(plan_chunks(ops, 25).unwrap_err().is_validation());
    }

    #[test]
    fn test_chunking() {
        let ops = (0..5)
            .map(|i| TransactOp::Delete(KeyPair::new("a", i.to_string())))
            .collect();
        let chunks = plan_chunks(ops, 2).unwrap();
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
    }
}
