//! Expression compilation.
//!
//! Every attribute name and value that reaches the store is bound through a
//! placeholder (`#nK` for names, `:vK` for values); nothing is inlined into
//! expression strings, so reserved-word attribute names need no special care.

pub mod condition;
pub mod update;

pub use condition::{Comparator, CompiledQuery, Filter, KeyCondition, SortCondition};
pub use update::{Patch, PatchValue, UpdateStatement};

use crate::core::Value;
use std::collections::{BTreeMap, HashMap};

/// Allocates placeholders for one compiled request.
///
/// A name placeholder is reused when the same attribute is referenced twice;
/// value placeholders are always fresh.
#[derive(Debug, Default, Clone)]
pub struct Placeholders {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
    by_attribute: HashMap<String, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(existing) = self.by_attribute.get(attribute) {
            return existing.clone();
        }
        let placeholder = format!("#n{}", self.by_attribute.len());
        self.by_attribute.insert(attribute.to_string(), placeholder.clone());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    pub fn value(&mut self, value: Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn into_parts(self) -> (BTreeMap<String, String>, BTreeMap<String, Value>) {
        (self.names, self.values)
    }
}
