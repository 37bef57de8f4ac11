//! Patch-to-update compilation.

use super::Placeholders;
use crate::core::{
    BackendError, BackendResult, ENTITY_TYPE, IndexKey, IndexName, PARTITION_KEY, Result, SORT_KEY,
    TableError, Value,
};
use std::collections::BTreeMap;

/// What a patch does to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    /// Write a defined, non-null value.
    Set(Value),
    /// Explicit null: drop the attribute.
    Remove,
}

/// A partial update. Fields not present in the patch are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: BTreeMap<String, PatchValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field. `Value::Null` is treated as an explicit removal.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), PatchValue::Remove);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let entry = if value.is_null() {
            PatchValue::Remove
        } else {
            PatchValue::Set(value)
        };
        self.fields.insert(name.into(), entry);
    }

    /// Writes both attributes of a secondary-index key.
    pub fn set_index(self, index: IndexName, key: IndexKey) -> Self {
        self.set(index.partition_attribute(), key.partition)
            .set(index.sort_attribute(), key.sort)
    }

    /// Drops an item out of a sparse secondary index.
    pub fn remove_index(self, index: IndexName) -> Self {
        self.remove(index.partition_attribute())
            .remove(index.sort_attribute())
    }

    /// Folds `other` into this patch; on conflicts `other` wins.
    pub fn merge(mut self, other: Patch) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Builds a patch from a JSON object: `null` removes, anything else sets.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => {
                let mut patch = Self::new();
                for (name, value) in map {
                    patch.insert(name, Value::from(value));
                }
                Ok(patch)
            }
            other => Err(TableError::validation(format!(
                "patch must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PatchValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PatchValue)> {
        self.fields.iter()
    }

    pub fn compile(&self) -> Result<UpdateStatement> {
        UpdateStatement::compile(self)
    }
}

/// A compiled `SET ... REMOVE ...` update with its placeholder bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    /// `(name placeholder, value placeholder)` pairs, in field order.
    pub set: Vec<(String, String)>,
    /// Name placeholders of removed fields, in field order.
    pub remove: Vec<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
}

impl UpdateStatement {
    pub fn compile(patch: &Patch) -> Result<Self> {
        if patch.is_empty() {
            return Err(TableError::validation("update patch is empty"));
        }

        for index in IndexName::SECONDARY {
            let partition = patch.get(index.partition_attribute());
            let sort = patch.get(index.sort_attribute());
            let paired = match (partition, sort) {
                (None, None) => true,
                (Some(PatchValue::Remove), Some(PatchValue::Remove)) => true,
                (
                    Some(PatchValue::Set(Value::Text(_))),
                    Some(PatchValue::Set(Value::Text(_))),
                ) => true,
                _ => false,
            };
            if !paired {
                return Err(TableError::validation(format!(
                    "{} key attributes must be set as text or removed together",
                    index
                )));
            }
        }

        let mut placeholders = Placeholders::new();
        let mut set = Vec::new();
        let mut remove = Vec::new();

        for (name, change) in patch.iter() {
            if name.is_empty() {
                return Err(TableError::validation("patch field name is empty"));
            }
            if name == PARTITION_KEY || name == SORT_KEY || name == ENTITY_TYPE {
                return Err(TableError::validation(format!(
                    "'{}' is immutable and cannot be patched",
                    name
                )));
            }

            let name_ph = placeholders.name(name);
            match change {
                PatchValue::Set(value) => {
                    let value_ph = placeholders.value(value.clone());
                    set.push((name_ph, value_ph));
                }
                PatchValue::Remove => remove.push(name_ph),
            }
        }

        let (names, values) = placeholders.into_parts();
        Ok(Self {
            set,
            remove,
            names,
            values,
        })
    }

    /// Renders the update expression. An empty clause emits no keyword.
    pub fn expression(&self) -> String {
        let mut clauses = Vec::with_capacity(2);
        if !self.set.is_empty() {
            let assignments: Vec<String> = self
                .set
                .iter()
                .map(|(name, value)| format!("{} = {}", name, value))
                .collect();
            clauses.push(format!("SET {}", assignments.join(", ")));
        }
        if !self.remove.is_empty() {
            clauses.push(format!("REMOVE {}", self.remove.join(", ")));
        }
        clauses.join(" ")
    }

    /// Attribute names written by the SET clause.
    pub fn set_attributes(&self) -> Vec<&str> {
        self.set
            .iter()
            .filter_map(|(name, _)| self.names.get(name).map(String::as_str))
            .collect()
    }

    /// Attribute names dropped by the REMOVE clause.
    pub fn remove_attributes(&self) -> Vec<&str> {
        self.remove
            .iter()
            .filter_map(|name| self.names.get(name).map(String::as_str))
            .collect()
    }

    /// Resolves every placeholder back to `(attribute, new value)`; `None`
    /// means the attribute is removed. Backends that apply updates
    /// themselves go through this.
    pub fn resolve(&self) -> BackendResult<Vec<(String, Option<Value>)>> {
        let lookup_name = |ph: &String| {
            self.names.get(ph).cloned().ok_or_else(|| {
                BackendError::Service(format!("unbound attribute name placeholder {}", ph))
            })
        };

        let mut actions = Vec::with_capacity(self.set.len() + self.remove.len());
        for (name_ph, value_ph) in &self.set {
            let value = self.values.get(value_ph).cloned().ok_or_else(|| {
                BackendError::Service(format!("unbound value placeholder {}", value_ph))
            })?;
            actions.push((lookup_name(name_ph)?, Some(value)));
        }
        for name_ph in &self.remove {
            actions.push((lookup_name(name_ph)?, None));
        }
        Ok(actions)
    }
}
