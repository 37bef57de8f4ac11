use super::ExecutionContext;
use crate::core::{BackendError, KeyPair, Operation, Record, Result, TableError};
use crate::expression::Patch;
use crate::keys::DELIMITER;
use crate::result::Consistency;
use tracing::{Instrument, Level, event, info_span};

pub(crate) fn decode(
    operation: Operation,
    key: &KeyPair,
    item: crate::core::Item,
) -> Result<Record> {
    Record::from_item(item).map_err(|e| TableError::internal(operation, key.to_string(), e))
}

fn backend_failed(operation: Operation, key: &KeyPair, source: BackendError) -> TableError {
    event!(
        Level::ERROR,
        operation = %operation,
        key = %key,
        error = %source,
        "backend call failed"
    );
    TableError::internal(operation, key.to_string(), source)
}

/// Item at `key`, or `None` when absent.
pub async fn get(
    ctx: &ExecutionContext,
    key: &KeyPair,
    consistency: Consistency,
) -> Result<Option<Record>> {
    key.validate()?;
    let span = info_span!("table.get", key = %key, consistent = consistency.is_strong());
    async {
        let item = ctx
            .backend
            .get_item(ctx.table_name(), key, consistency.is_strong())
            .await
            .map_err(|e| backend_failed(Operation::Get, key, e))?;

        event!(Level::DEBUG, found = item.is_some(), "get completed");
        item.map(|item| decode(Operation::Get, key, item)).transpose()
    }
    .instrument(span)
    .await
}

/// Like [`get`], but absence is a [`TableError::NotFound`].
pub async fn get_required(
    ctx: &ExecutionContext,
    key: &KeyPair,
    consistency: Consistency,
) -> Result<Record> {
    get(ctx, key, consistency).await?.ok_or_else(|| {
        let entity = key
            .partition_key
            .split(DELIMITER)
            .next()
            .unwrap_or_default();
        TableError::not_found(entity, key.to_string())
    })
}

/// Unconditional overwrite at the record's key.
pub async fn put(ctx: &ExecutionContext, record: Record) -> Result<Record> {
    record.validate()?;
    let key = record.key();
    let span = info_span!("table.put", key = %key, entity = %record.entity_type);
    async {
        ctx.backend
            .put_item(ctx.table_name(), record.clone().into_item())
            .await
            .map_err(|e| backend_failed(Operation::Put, &key, e))?;

        event!(Level::DEBUG, "put completed");
        Ok(record)
    }
    .instrument(span)
    .await
}

/// Applies `patch` to an existing item and returns the updated record.
/// A missing item is an error; updates never create items.
pub async fn update(ctx: &ExecutionContext, key: &KeyPair, patch: &Patch) -> Result<Record> {
    key.validate()?;
    let statement = patch.compile()?;
    let span = info_span!("table.update", key = %key, fields = patch.len());
    async {
        event!(Level::DEBUG, expression = %statement.expression(), "update compiled");
        let item = ctx
            .backend
            .update_item(ctx.table_name(), key, &statement)
            .await
            .map_err(|e| backend_failed(Operation::Update, key, e))?;

        decode(Operation::Update, key, item)
    }
    .instrument(span)
    .await
}

/// Deletes the item at `key`. Deleting an absent key succeeds.
pub async fn delete(ctx: &ExecutionContext, key: &KeyPair) -> Result<bool> {
    key.validate()?;
    let span = info_span!("table.delete", key = %key);
    async {
        ctx.backend
            .delete_item(ctx.table_name(), key)
            .await
            .map_err(|e| backend_failed(Operation::Delete, key, e))?;

        event!(Level::DEBUG, "delete completed");
        Ok(true)
    }
    .instrument(span)
    .await
}
