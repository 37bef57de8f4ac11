use super::engine::{QueryInput, QueryOutput, StartKey};
use crate::core::{
    BackendError, BackendResult, INDEX_SLOTS, IndexName, Item, KeyPair, PARTITION_KEY, SORT_KEY,
    Value,
};
use std::collections::{BTreeMap, BTreeSet};

/// Position of an item inside one secondary index. The base key breaks
/// ties between items sharing an index sort value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexEntry {
    partition: String,
    sort: String,
    key: KeyPair,
}

/// Rows of one table ordered by primary key, plus one ordered set per
/// secondary index slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: BTreeMap<KeyPair, Item>,
    indexes: [BTreeSet<IndexEntry>; INDEX_SLOTS],
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &KeyPair) -> Option<&Item> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &KeyPair) -> bool {
        self.rows.contains_key(key)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Inserts or replaces the item at its key.
    pub fn put(&mut self, item: Item) -> BackendResult<()> {
        let key = KeyPair::from_item(&item)?;
        if let Some(old) = self.rows.remove(&key) {
            self.remove_from_indexes(&key, &old);
        }
        self.update_indexes(&key, &item);
        self.rows.insert(key, item);
        Ok(())
    }

    pub fn delete(&mut self, key: &KeyPair) -> Option<Item> {
        let old = self.rows.remove(key)?;
        self.remove_from_indexes(key, &old);
        Some(old)
    }

    /// Applies resolved update actions to an existing item.
    pub fn update(
        &mut self,
        key: &KeyPair,
        actions: Vec<(String, Option<Value>)>,
    ) -> BackendResult<Item> {
        let Some(old) = self.rows.get(key).cloned() else {
            return Err(BackendError::ConditionFailed(format!(
                "no item exists at '{}'",
                key
            )));
        };

        let mut updated = old.clone();
        for (name, value) in actions {
            if name == PARTITION_KEY || name == SORT_KEY {
                return Err(BackendError::Service(format!(
                    "cannot update key attribute '{}'",
                    name
                )));
            }
            match value {
                Some(value) => {
                    updated.insert(name, value);
                }
                None => {
                    updated.remove(&name);
                }
            }
        }

        self.remove_from_indexes(key, &old);
        self.update_indexes(key, &updated);
        self.rows.insert(key.clone(), updated.clone());
        Ok(updated)
    }

    /// Runs one query page: key condition, direction, start key, filter and
    /// limit, in that order. The filter is applied before the limit counts.
    pub fn query(&self, input: &QueryInput) -> BackendResult<QueryOutput> {
        let mut candidates = self.candidates(input.index, &input.key_condition.partition);
        candidates.retain(|(sort, _)| {
            input
                .key_condition
                .sort
                .as_ref()
                .is_none_or(|cond| cond.matches(sort))
        });
        if !input.scan_forward {
            candidates.reverse();
        }

        if let Some(start) = &input.exclusive_start_key {
            let position = start_position(input.index, start)?;
            candidates.retain(|candidate| {
                if input.scan_forward {
                    *candidate > position
                } else {
                    *candidate < position
                }
            });
        }

        let mut items = Vec::new();
        let mut last_evaluated_key = None;
        for (position, (sort, key)) in candidates.iter().enumerate() {
            let Some(item) = self.rows.get(key) else {
                continue;
            };
            if input.filter.as_ref().is_some_and(|filter| !filter.evaluate(item)) {
                continue;
            }
            items.push(project(item, input.projection.as_deref()));

            let page_full = input.limit.is_some_and(|limit| items.len() >= limit);
            if page_full {
                if position + 1 < candidates.len() {
                    last_evaluated_key = Some(start_key(input.index, item, sort, key));
                }
                break;
            }
        }

        Ok(QueryOutput {
            items,
            last_evaluated_key,
        })
    }

    /// `(sort value, base key)` of every item in one partition, ascending.
    fn candidates(&self, index: IndexName, partition: &str) -> Vec<(String, KeyPair)> {
        match index.slot() {
            None => {
                let from = KeyPair::new(partition, "");
                self.rows
                    .range(from..)
                    .take_while(|(key, _)| key.partition_key == partition)
                    .map(|(key, _)| (key.sort_key.clone(), key.clone()))
                    .collect()
            }
            Some(slot) => {
                let from = IndexEntry {
                    partition: partition.to_string(),
                    sort: String::new(),
                    key: KeyPair::new("", ""),
                };
                self.indexes[slot]
                    .range(from..)
                    .take_while(|entry| entry.partition == partition)
                    .map(|entry| (entry.sort.clone(), entry.key.clone()))
                    .collect()
            }
        }
    }

    fn update_indexes(&mut self, key: &KeyPair, item: &Item) {
        for index in IndexName::SECONDARY {
            if let Some(entry) = index_entry(index, key, item)
                && let Some(slot) = index.slot()
            {
                self.indexes[slot].insert(entry);
            }
        }
    }

    fn remove_from_indexes(&mut self, key: &KeyPair, item: &Item) {
        for index in IndexName::SECONDARY {
            if let Some(entry) = index_entry(index, key, item)
                && let Some(slot) = index.slot()
            {
                self.indexes[slot].remove(&entry);
            }
        }
    }
}

/// An item appears in an index only when both index attributes are text.
fn index_entry(index: IndexName, key: &KeyPair, item: &Item) -> Option<IndexEntry> {
    let partition = item.get(index.partition_attribute())?.as_str()?;
    let sort = item.get(index.sort_attribute())?.as_str()?;
    Some(IndexEntry {
        partition: partition.to_string(),
        sort: sort.to_string(),
        key: key.clone(),
    })
}

fn project(item: &Item, projection: Option<&[String]>) -> Item {
    match projection {
        None => item.clone(),
        Some(attributes) => attributes
            .iter()
            .filter_map(|name| item.get(name).map(|value| (name.clone(), value.clone())))
            .collect(),
    }
}

fn start_key(index: IndexName, item: &Item, sort: &str, key: &KeyPair) -> StartKey {
    let mut start = StartKey::new();
    start.insert(PARTITION_KEY.to_string(), key.partition_key.clone());
    start.insert(SORT_KEY.to_string(), key.sort_key.clone());
    if index.is_secondary()
        && let Some(partition) = item.get(index.partition_attribute()).and_then(Value::as_str)
    {
        start.insert(index.partition_attribute().to_string(), partition.to_string());
        start.insert(index.sort_attribute().to_string(), sort.to_string());
    }
    start
}

fn start_position(index: IndexName, start: &StartKey) -> BackendResult<(String, KeyPair)> {
    let attribute = |name: &str| {
        start.get(name).cloned().ok_or_else(|| {
            BackendError::Service(format!("exclusive start key is missing '{}'", name))
        })
    };
    let key = KeyPair::new(attribute(PARTITION_KEY)?, attribute(SORT_KEY)?);
    let sort = attribute(index.sort_attribute())?;
    Ok((sort, key))
}
