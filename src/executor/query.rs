use super::ExecutionContext;
use super::crud::decode;
use crate::core::{
    ENTITY_TYPE, IndexName, KeyPair, Operation, PARTITION_KEY, Record, Result, SORT_KEY,
    TableError,
};
use crate::expression::{Filter, KeyCondition};
use crate::result::{Consistency, Cursor, Order, QueryPage};
use crate::storage::{QueryInput, StartKey};
use futures::future::try_join_all;
use std::future::Future;
use tracing::{Instrument, Level, event, info_span};

/// A query against the base table or one secondary index.
///
/// ```
/// use unitable::{Filter, IndexName, KeyCondition, QueryRequest};
///
/// let request = QueryRequest::on_index(IndexName::Gsi1, KeyCondition::partition("note#u1"))
///     .filter(Filter::exists("pinned"))
///     .limit(20)
///     .descending();
/// assert_eq!(request.index, IndexName::Gsi1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index: IndexName,
    pub key_condition: KeyCondition,
    pub filter: Option<Filter>,
    /// Attributes to return besides the key attributes and `entityType`.
    pub projection: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub cursor: Option<Cursor>,
    pub order: Order,
    pub consistency: Consistency,
}

impl QueryRequest {
    pub fn new(key_condition: KeyCondition) -> Self {
        Self::on_index(IndexName::Table, key_condition)
    }

    pub fn on_index(index: IndexName, key_condition: KeyCondition) -> Self {
        Self {
            index,
            key_condition,
            filter: None,
            projection: None,
            limit: None,
            cursor: None,
            order: Order::Ascending,
            consistency: Consistency::Eventual,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn project<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Maximum items per page.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after the page that produced `cursor`.
    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn descending(self) -> Self {
        self.order(Order::Descending)
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn strong(self) -> Self {
        self.consistency(Consistency::Strong)
    }

    pub fn validate(&self) -> Result<()> {
        self.key_condition.validate()?;
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        if self.limit == Some(0) {
            return Err(TableError::validation("query limit must be positive"));
        }
        if self.consistency.is_strong() && self.index.is_secondary() {
            return Err(TableError::validation(format!(
                "strong reads are not available on secondary index {}",
                self.index
            )));
        }
        if let Some(projection) = &self.projection
            && projection.iter().any(String::is_empty)
        {
            return Err(TableError::validation("projection names an empty attribute"));
        }
        Ok(())
    }

    fn to_input(&self) -> Result<QueryInput> {
        self.validate()?;
        let exclusive_start_key = self.start_key()?;
        let projection = self.projection.as_ref().map(|attributes| {
            let mut projection: Vec<String> = [PARTITION_KEY, SORT_KEY, ENTITY_TYPE]
                .iter()
                .map(|name| name.to_string())
                .collect();
            for attribute in attributes {
                if !projection.contains(attribute) {
                    projection.push(attribute.clone());
                }
            }
            projection
        });

        Ok(QueryInput {
            index: self.index,
            key_condition: self.key_condition.clone(),
            filter: self.filter.clone(),
            projection,
            limit: self.limit,
            exclusive_start_key,
            scan_forward: self.order == Order::Ascending,
            consistent_read: self.consistency.is_strong(),
        })
    }

    /// Decodes the cursor and checks it can resume the selected index.
    fn start_key(&self) -> Result<Option<StartKey>> {
        let Some(cursor) = &self.cursor else {
            return Ok(None);
        };
        let start = cursor.decode()?;
        let mut required = vec![PARTITION_KEY, SORT_KEY];
        if self.index.is_secondary() {
            required.push(self.index.partition_attribute());
            required.push(self.index.sort_attribute());
        }
        if let Some(missing) = required
            .into_iter()
            .find(|name| start.get(*name).is_none_or(String::is_empty))
        {
            return Err(TableError::validation(format!(
                "cursor cannot resume a query on {}: missing '{}'",
                self.index, missing
            )));
        }
        Ok(Some(start))
    }

    fn target(&self) -> String {
        format!("{}:{}", self.index, self.key_condition.partition)
    }
}

/// One page of records.
pub async fn query(ctx: &ExecutionContext, request: &QueryRequest) -> Result<QueryPage<Record>> {
    let input = request.to_input()?;
    let target = request.target();
    let span = info_span!(
        "table.query",
        index = %request.index,
        partition = %request.key_condition.partition,
        resumed = request.cursor.is_some()
    );
    async {
        let output = ctx
            .backend
            .query(ctx.table_name(), &input)
            .await
            .map_err(|e| {
                event!(Level::ERROR, error = %e, "query failed");
                TableError::internal(Operation::Query, target.clone(), e)
            })?;

        let next_cursor = output
            .last_evaluated_key
            .as_ref()
            .map(Cursor::encode)
            .transpose()?;
        let items = output
            .items
            .into_iter()
            .map(|item| {
                let key = KeyPair::from_item(&item)
                    .map_err(|e| TableError::internal(Operation::Query, target.clone(), e))?;
                decode(Operation::Query, &key, item)
            })
            .collect::<Result<Vec<_>>>()?;

        event!(Level::DEBUG, items = items.len(), more = next_cursor.is_some(), "query page");
        Ok(QueryPage {
            items,
            next_cursor,
            consistency: request.consistency,
        })
    }
    .instrument(span)
    .await
}

/// Every matching record, following cursors until none is left.
pub async fn query_all(ctx: &ExecutionContext, request: &QueryRequest) -> Result<Vec<Record>> {
    let mut request = request.clone();
    let mut records = Vec::new();
    loop {
        let page = query(ctx, &request).await?;
        records.extend(page.items);
        match page.next_cursor {
            Some(cursor) => request.cursor = Some(cursor),
            None => break,
        }
    }
    Ok(records)
}

/// One page passed through an async `mapper`. A single mapper failure fails
/// the whole page.
pub async fn query_mapped<T, F, Fut>(
    ctx: &ExecutionContext,
    request: &QueryRequest,
    mapper: F,
) -> Result<QueryPage<T>>
where
    F: Fn(Record) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let page = query(ctx, request).await?;
    let items = try_join_all(page.items.into_iter().map(&mapper)).await?;
    Ok(QueryPage {
        items,
        next_cursor: page.next_cursor,
        consistency: page.consistency,
    })
}

/// Exhaustive variant of [`query_mapped`].
pub async fn query_all_mapped<T, F, Fut>(
    ctx: &ExecutionContext,
    request: &QueryRequest,
    mapper: F,
) -> Result<Vec<T>>
where
    F: Fn(Record) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut request = request.clone();
    let mut mapped = Vec::new();
    loop {
        let page = query_mapped(ctx, &request, &mapper).await?;
        mapped.extend(page.items);
        match page.next_cursor {
            Some(cursor) => request.cursor = Some(cursor),
            None => break,
        }
    }
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_read_on_index_rejected() {
        let request =
            QueryRequest::on_index(IndexName::Gsi2, KeyCondition::partition("p")).strong();
        assert!(request.validate().unwrap_err().is_validation());
        assert!(QueryRequest::new(KeyCondition::partition("p")).strong().validate().is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let request = QueryRequest::new(KeyCondition::partition("p")).limit(0);
        assert!(request.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_projection_keeps_key_attributes() {
        let request = QueryRequest::new(KeyCondition::partition("p")).project(["title", "sortKey"]);
        let input = request.to_input().unwrap();

        assert_eq!(
            input.projection.unwrap(),
            vec!["partitionKey", "sortKey", "entityType", "title"]
        );
    }

    #[test]
    fn test_descending_scans_backward() {
        let input = QueryRequest::new(KeyCondition::partition("p"))
            .descending()
            .to_input()
            .unwrap();
        assert!(!input.scan_forward);
    }

    #[test]
    fn test_cursor_must_carry_the_index_key() {
        let mut base = StartKey::new();
        base.insert(PARTITION_KEY.to_string(), "note#u1".to_string());
        base.insert(SORT_KEY.to_string(), "note#n1".to_string());
        let cursor = Cursor::encode(&base).unwrap();

        let on_table =
            QueryRequest::new(KeyCondition::partition("note#u1")).cursor(Some(cursor.clone()));
        assert_eq!(on_table.to_input().unwrap().exclusive_start_key, Some(base));

        let on_index = QueryRequest::on_index(IndexName::Gsi1, KeyCondition::partition("note#u1"))
            .cursor(Some(cursor));
        let err = on_index.to_input().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("gsi1partition"));
    }
}
