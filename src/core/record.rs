use super::{BackendError, BackendResult, Result, TableError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PARTITION_KEY: &str = "partitionKey";
pub const SORT_KEY: &str = "sortKey";
pub const ENTITY_TYPE: &str = "entityType";

/// Number of secondary indexes a table may carry.
pub const INDEX_SLOTS: usize = 4;

const INDEX_PARTITION_ATTRS: [&str; INDEX_SLOTS] =
    ["gsi1partition", "gsi2partition", "gsi3partition", "gsi4partition"];
const INDEX_SORT_ATTRS: [&str; INDEX_SLOTS] = ["gsi1sort", "gsi2sort", "gsi3sort", "gsi4sort"];
const INDEX_NAMES: [&str; INDEX_SLOTS] = ["gsi1", "gsi2", "gsi3", "gsi4"];

/// A stored item: attribute name to value, reserved attributes included.
pub type Item = BTreeMap<String, Value>;

/// Target of a read: the base table or one of the secondary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexName {
    Table,
    Gsi1,
    Gsi2,
    Gsi3,
    Gsi4,
}

impl IndexName {
    pub const SECONDARY: [IndexName; INDEX_SLOTS] =
        [IndexName::Gsi1, IndexName::Gsi2, IndexName::Gsi3, IndexName::Gsi4];

    /// Zero-based slot of a secondary index, `None` for the base table.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::Table => None,
            Self::Gsi1 => Some(0),
            Self::Gsi2 => Some(1),
            Self::Gsi3 => Some(2),
            Self::Gsi4 => Some(3),
        }
    }

    pub fn is_secondary(&self) -> bool {
        self.slot().is_some()
    }

    /// Backend index name; `None` for the base table.
    pub fn index_name(&self) -> Option<&'static str> {
        self.slot().map(|slot| INDEX_NAMES[slot])
    }

    pub fn partition_attribute(&self) -> &'static str {
        match self.slot() {
            Some(slot) => INDEX_PARTITION_ATTRS[slot],
            None => PARTITION_KEY,
        }
    }

    pub fn sort_attribute(&self) -> &'static str {
        match self.slot() {
            Some(slot) => INDEX_SORT_ATTRS[slot],
            None => SORT_KEY,
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.index_name().unwrap_or("table"))
    }
}

/// True for attribute names owned by the key layout.
pub fn is_reserved_attribute(name: &str) -> bool {
    name == PARTITION_KEY
        || name == SORT_KEY
        || name == ENTITY_TYPE
        || INDEX_PARTITION_ATTRS.contains(&name)
        || INDEX_SORT_ATTRS.contains(&name)
}

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyPair {
    pub partition_key: String,
    pub sort_key: String,
}

impl KeyPair {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(PARTITION_KEY.to_string(), Value::Text(self.partition_key.clone()));
        item.insert(SORT_KEY.to_string(), Value::Text(self.sort_key.clone()));
        item
    }

    pub fn from_item(item: &Item) -> BackendResult<Self> {
        Ok(Self {
            partition_key: text_attribute(item, PARTITION_KEY)?,
            sort_key: text_attribute(item, SORT_KEY)?,
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.partition_key.is_empty() || self.sort_key.is_empty() {
            return Err(TableError::validation(format!(
                "key '{}' has an empty component",
                self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.partition_key, self.sort_key)
    }
}

/// Partition/sort projection of an item into one secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub partition: String,
    pub sort: String,
}

impl IndexKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

/// All keys of one record, as produced by a key scheme.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordKeys {
    pub partition_key: String,
    pub sort_key: String,
    pub indexes: [Option<IndexKey>; INDEX_SLOTS],
}

impl RecordKeys {
    pub fn key_pair(&self) -> KeyPair {
        KeyPair::new(self.partition_key.clone(), self.sort_key.clone())
    }

    pub fn index(&self, index: IndexName) -> Option<&IndexKey> {
        index.slot().and_then(|slot| self.indexes[slot].as_ref())
    }
}

/// A generic row of the shared table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub partition_key: String,
    pub sort_key: String,
    pub entity_type: String,
    pub index_keys: [Option<IndexKey>; INDEX_SLOTS],
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(entity_type: impl Into<String>, keys: RecordKeys) -> Self {
        Self {
            partition_key: keys.partition_key,
            sort_key: keys.sort_key,
            entity_type: entity_type.into(),
            index_keys: keys.indexes,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn key(&self) -> KeyPair {
        KeyPair::new(self.partition_key.clone(), self.sort_key.clone())
    }

    pub fn index_key(&self, index: IndexName) -> Option<&IndexKey> {
        index.slot().and_then(|slot| self.index_keys[slot].as_ref())
    }

    /// Checks the record can be written: non-empty keys and no entity
    /// attribute shadowing a reserved name.
    pub fn validate(&self) -> Result<()> {
        self.key().validate()?;
        if self.entity_type.is_empty() {
            return Err(TableError::validation(format!(
                "record '{}' has no entity type",
                self.key()
            )));
        }
        if let Some(name) = self.attributes.keys().find(|name| is_reserved_attribute(name)) {
            return Err(TableError::validation(format!(
                "attribute '{}' is reserved by the key layout",
                name
            )));
        }
        Ok(())
    }

    pub fn into_item(self) -> Item {
        let mut item = self.attributes;
        item.insert(PARTITION_KEY.to_string(), Value::Text(self.partition_key));
        item.insert(SORT_KEY.to_string(), Value::Text(self.sort_key));
        item.insert(ENTITY_TYPE.to_string(), Value::Text(self.entity_type));
        for (slot, key) in self.index_keys.into_iter().enumerate() {
            if let Some(key) = key {
                item.insert(INDEX_PARTITION_ATTRS[slot].to_string(), Value::Text(key.partition));
                item.insert(INDEX_SORT_ATTRS[slot].to_string(), Value::Text(key.sort));
            }
        }
        item
    }

    pub fn from_item(mut item: Item) -> BackendResult<Self> {
        let partition_key = take_text(&mut item, PARTITION_KEY)?;
        let sort_key = take_text(&mut item, SORT_KEY)?;
        let entity_type = take_text(&mut item, ENTITY_TYPE)?;

        let mut index_keys: [Option<IndexKey>; INDEX_SLOTS] = Default::default();
        for slot in 0..INDEX_SLOTS {
            let paired = matches!(
                (item.get(INDEX_PARTITION_ATTRS[slot]), item.get(INDEX_SORT_ATTRS[slot])),
                (Some(Value::Text(_)), Some(Value::Text(_)))
            );
            if !paired {
                // a lone or non-text half stays visible as a plain attribute
                continue;
            }
            let partition = take_text(&mut item, INDEX_PARTITION_ATTRS[slot])?;
            let sort = take_text(&mut item, INDEX_SORT_ATTRS[slot])?;
            index_keys[slot] = Some(IndexKey { partition, sort });
        }

        Ok(Self {
            partition_key,
            sort_key,
            entity_type,
            index_keys,
            attributes: item,
        })
    }
}

fn text_attribute(item: &Item, name: &str) -> BackendResult<String> {
    match item.get(name) {
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(other) => Err(BackendError::MalformedItem(format!(
            "attribute '{}' must be TEXT, found {}",
            name,
            other.type_name()
        ))),
        None => Err(BackendError::MalformedItem(format!("missing attribute '{}'", name))),
    }
}

fn take_text(item: &mut Item, name: &str) -> BackendResult<String> {
    let value = text_attribute(item, name)?;
    item.remove(name);
    Ok(value)
}
