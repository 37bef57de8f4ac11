//! Backend over Amazon DynamoDB.
//!
//! Compiled update, key-condition and filter expressions are shipped as-is
//! with their placeholder maps. Updates carry an `attribute_exists` guard on
//! the partition key so a patch never creates an item.

use super::engine::{QueryInput, QueryOutput, StartKey, StorageBackend, TransactItem, WriteRequest};
use crate::core::{BackendError, BackendResult, Item, KeyPair, PARTITION_KEY, Value};
use crate::expression::{CompiledQuery, UpdateStatement};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    self as ddb, AttributeValue, DeleteRequest, PutRequest, ReturnValue, TransactWriteItem,
};
use aws_smithy_types::timeout::TimeoutConfig;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const EXISTS_GUARD: &str = "attribute_exists(#pk)";
const GUARD_NAME: &str = "#pk";

type AttributeMap = HashMap<String, AttributeValue>;

/// Client settings layered over the shared SDK configuration
#[derive(Debug, Clone, Default)]
pub struct DynamoDbConfig {
    /// AWS region (SDK default when unset)
    pub region: Option<String>,
    /// Endpoint override, e.g. a local emulator
    pub endpoint: Option<String>,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

#[derive(Clone)]
pub struct DynamoDbBackend {
    client: Client,
}

impl std::fmt::Debug for DynamoDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbBackend").finish_non_exhaustive()
    }
}

impl DynamoDbBackend {
    /// Build a client inheriting `sdk_config`, then apply the overrides.
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoDbConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Load the SDK configuration from the environment.
    pub async fn from_env(config: DynamoDbConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::new(&sdk_config, config)
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageBackend for DynamoDbBackend {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    async fn get_item(
        &self,
        table: &str,
        key: &KeyPair,
        consistent_read: bool,
    ) -> BackendResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key_attributes(key)))
            .consistent_read(consistent_read)
            .send()
            .await
            .map_err(classify)?;

        output.item.map(item_from_attributes).transpose()
    }

    async fn put_item(&self, table: &str, item: Item) -> BackendResult<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item_to_attributes(item)))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_item(
        &self,
        table: &str,
        key: &KeyPair,
        update: &UpdateStatement,
    ) -> BackendResult<Item> {
        let (names, values) = guarded_bindings(update);
        let output = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(key_attributes(key)))
            .update_expression(update.expression())
            .condition_expression(EXISTS_GUARD)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(classify)?;

        item_from_attributes(output.attributes.unwrap_or_default())
    }

    async fn delete_item(&self, table: &str, key: &KeyPair) -> BackendResult<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(key_attributes(key)))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn query(&self, table: &str, input: &QueryInput) -> BackendResult<QueryOutput> {
        let compiled = CompiledQuery::compile(
            input.index,
            &input.key_condition,
            input.filter.as_ref(),
            input.projection.as_deref(),
        );
        let limit = input
            .limit
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX));
        let start = input.exclusive_start_key.as_ref().map(|start| {
            start
                .iter()
                .map(|(name, value)| (name.clone(), AttributeValue::S(value.clone())))
                .collect::<AttributeMap>()
        });

        let output = self
            .client
            .query()
            .table_name(table)
            .set_index_name(input.index.index_name().map(str::to_string))
            .key_condition_expression(compiled.key_condition)
            .set_filter_expression(compiled.filter)
            .set_projection_expression(compiled.projection)
            .set_expression_attribute_names(Some(compiled.names.into_iter().collect()))
            .set_expression_attribute_values(Some(values_to_attributes(compiled.values)))
            .set_limit(limit)
            .set_exclusive_start_key(start)
            .scan_index_forward(input.scan_forward)
            .consistent_read(input.consistent_read)
            .send()
            .await
            .map_err(classify)?;

        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_from_attributes)
            .collect::<BackendResult<Vec<_>>>()?;
        let last_evaluated_key = match output.last_evaluated_key {
            Some(key) if !key.is_empty() => Some(start_key_from_attributes(key)?),
            _ => None,
        };

        Ok(QueryOutput {
            items,
            last_evaluated_key,
        })
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> BackendResult<Vec<WriteRequest>> {
        let requests = requests
            .into_iter()
            .map(write_request_to_sdk)
            .collect::<BackendResult<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(classify)?;

        let mut unprocessed = Vec::new();
        for request in output
            .unprocessed_items
            .unwrap_or_default()
            .into_values()
            .flatten()
        {
            if let Some(put) = request.put_request {
                unprocessed.push(WriteRequest::Put(item_from_attributes(put.item)?));
            }
            if let Some(delete) = request.delete_request {
                unprocessed.push(WriteRequest::Delete(key_from_attributes(delete.key)?));
            }
        }
        Ok(unprocessed)
    }

    async fn transact_write(&self, table: &str, items: Vec<TransactItem>) -> BackendResult<()> {
        let items = items
            .into_iter()
            .map(|item| transact_item_to_sdk(table, item))
            .collect::<BackendResult<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match err.code() {
        Some("ConditionalCheckFailedException") => BackendError::ConditionFailed(message),
        Some("TransactionCanceledException") => BackendError::TransactionCanceled(message),
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => BackendError::Throttled(message),
        _ => BackendError::Service(message),
    }
}

fn build_failed(err: BuildError) -> BackendError {
    BackendError::Service(format!("invalid request: {}", err))
}

fn guarded_bindings(
    update: &UpdateStatement,
) -> (HashMap<String, String>, Option<AttributeMap>) {
    let mut names: HashMap<String, String> = update
        .names
        .iter()
        .map(|(ph, name)| (ph.clone(), name.clone()))
        .collect();
    names.insert(GUARD_NAME.to_string(), PARTITION_KEY.to_string());

    let values = (!update.values.is_empty()).then(|| values_to_attributes(update.values.clone()));
    (names, values)
}

fn write_request_to_sdk(request: WriteRequest) -> BackendResult<ddb::WriteRequest> {
    let request = match request {
        WriteRequest::Put(item) => ddb::WriteRequest::builder()
            .put_request(
                PutRequest::builder()
                    .set_item(Some(item_to_attributes(item)))
                    .build()
                    .map_err(build_failed)?,
            )
            .build(),
        WriteRequest::Delete(key) => ddb::WriteRequest::builder()
            .delete_request(
                DeleteRequest::builder()
                    .set_key(Some(key_attributes(&key)))
                    .build()
                    .map_err(build_failed)?,
            )
            .build(),
    };
    Ok(request)
}

fn transact_item_to_sdk(table: &str, item: TransactItem) -> BackendResult<TransactWriteItem> {
    let item = match item {
        TransactItem::Put(item) => TransactWriteItem::builder()
            .put(
                ddb::Put::builder()
                    .table_name(table)
                    .set_item(Some(item_to_attributes(item)))
                    .build()
                    .map_err(build_failed)?,
            )
            .build(),
        TransactItem::Update { key, update } => {
            let (names, values) = guarded_bindings(&update);
            TransactWriteItem::builder()
                .update(
                    ddb::Update::builder()
                        .table_name(table)
                        .set_key(Some(key_attributes(&key)))
                        .update_expression(update.expression())
                        .condition_expression(EXISTS_GUARD)
                        .set_expression_attribute_names(Some(names))
                        .set_expression_attribute_values(values)
                        .build()
                        .map_err(build_failed)?,
                )
                .build()
        }
        TransactItem::Delete(key) => TransactWriteItem::builder()
            .delete(
                ddb::Delete::builder()
                    .table_name(table)
                    .set_key(Some(key_attributes(&key)))
                    .build()
                    .map_err(build_failed)?,
            )
            .build(),
    };
    Ok(item)
}

fn key_attributes(key: &KeyPair) -> AttributeMap {
    item_to_attributes(key.to_item())
}

fn key_from_attributes(attributes: AttributeMap) -> BackendResult<KeyPair> {
    KeyPair::from_item(&item_from_attributes(attributes)?)
}

fn start_key_from_attributes(attributes: AttributeMap) -> BackendResult<StartKey> {
    attributes
        .into_iter()
        .map(|(name, value)| match value {
            AttributeValue::S(s) => Ok((name, s)),
            _ => Err(BackendError::MalformedItem(format!(
                "key attribute '{}' is not a string",
                name
            ))),
        })
        .collect()
}

fn values_to_attributes(values: BTreeMap<String, Value>) -> AttributeMap {
    values
        .into_iter()
        .map(|(ph, value)| (ph, to_attribute(value)))
        .collect()
}

pub(crate) fn item_to_attributes(item: Item) -> AttributeMap {
    item.into_iter()
        .map(|(name, value)| (name, to_attribute(value)))
        .collect()
}

pub(crate) fn item_from_attributes(attributes: AttributeMap) -> BackendResult<Item> {
    attributes
        .into_iter()
        .map(|(name, value)| Ok((name, from_attribute(value)?)))
        .collect()
}

pub(crate) fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Boolean(b) => AttributeValue::Bool(b),
        Value::Integer(i) => AttributeValue::N(i.to_string()),
        Value::Float(f) => AttributeValue::N(f.to_string()),
        Value::Text(s) => AttributeValue::S(s),
        Value::List(items) => AttributeValue::L(items.into_iter().map(to_attribute).collect()),
        Value::Map(map) => AttributeValue::M(
            map.into_iter()
                .map(|(k, v)| (k, to_attribute(v)))
                .collect(),
        ),
    }
}

pub(crate) fn from_attribute(value: AttributeValue) -> BackendResult<Value> {
    let value = match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Boolean(b),
        AttributeValue::S(s) => Value::Text(s),
        AttributeValue::N(n) => parse_number(&n)?,
        AttributeValue::Ss(set) => Value::List(set.into_iter().map(Value::Text).collect()),
        AttributeValue::Ns(set) => Value::List(
            set.iter()
                .map(|n| parse_number(n))
                .collect::<BackendResult<Vec<_>>>()?,
        ),
        AttributeValue::L(items) => Value::List(
            items
                .into_iter()
                .map(from_attribute)
                .collect::<BackendResult<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| Ok((k, from_attribute(v)?)))
                .collect::<BackendResult<BTreeMap<_, _>>>()?,
        ),
        other => {
            return Err(BackendError::MalformedItem(format!(
                "unsupported attribute value {:?}",
                other
            )));
        }
    };
    Ok(value)
}

fn parse_number(n: &str) -> BackendResult<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    n.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| BackendError::MalformedItem(format!("'{}' is not a number", n)))
}
