//! Key conditions, filters and projections for queries.
//!
//! Each condition is kept structured so a backend can either evaluate it
//! directly ([`KeyCondition::matches`], [`Filter::evaluate`]) or ship the
//! placeholder-bound strings produced by [`CompiledQuery::compile`].

use super::Placeholders;
use crate::core::{IndexName, Item, Result, TableError, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Condition on the sort component of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    Eq(String),
    Lt(String),
    Le(String),
    Gt(String),
    Ge(String),
    Between(String, String),
    BeginsWith(String),
}

impl SortCondition {
    pub fn matches(&self, sort: &str) -> bool {
        match self {
            Self::Eq(v) => sort == v,
            Self::Lt(v) => sort < v.as_str(),
            Self::Le(v) => sort <= v.as_str(),
            Self::Gt(v) => sort > v.as_str(),
            Self::Ge(v) => sort >= v.as_str(),
            Self::Between(low, high) => sort >= low.as_str() && sort <= high.as_str(),
            Self::BeginsWith(prefix) => sort.starts_with(prefix.as_str()),
        }
    }

    fn compile(&self, name: &str, ph: &mut Placeholders) -> String {
        let mut bind = |v: &String| ph.value(Value::Text(v.clone()));
        match self {
            Self::Eq(v) => format!("{} = {}", name, bind(v)),
            Self::Lt(v) => format!("{} < {}", name, bind(v)),
            Self::Le(v) => format!("{} <= {}", name, bind(v)),
            Self::Gt(v) => format!("{} > {}", name, bind(v)),
            Self::Ge(v) => format!("{} >= {}", name, bind(v)),
            Self::Between(low, high) => {
                let low = bind(low);
                let high = bind(high);
                format!("{} BETWEEN {} AND {}", name, low, high)
            }
            Self::BeginsWith(prefix) => format!("begins_with({}, {})", name, bind(prefix)),
        }
    }
}

/// Required key condition: partition equality plus an optional sort condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition: String,
    pub sort: Option<SortCondition>,
}

impl KeyCondition {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: SortCondition) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn begins_with(self, prefix: impl Into<String>) -> Self {
        self.with_sort(SortCondition::BeginsWith(prefix.into()))
    }

    pub fn between(self, low: impl Into<String>, high: impl Into<String>) -> Self {
        self.with_sort(SortCondition::Between(low.into(), high.into()))
    }

    pub fn matches(&self, partition: &str, sort: &str) -> bool {
        partition == self.partition && self.sort.as_ref().is_none_or(|cond| cond.matches(sort))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.partition.is_empty() {
            return Err(TableError::validation("key condition needs a partition value"));
        }
        if let Some(SortCondition::Between(low, high)) = &self.sort
            && low > high
        {
            return Err(TableError::validation(format!(
                "BETWEEN bounds are reversed: '{}' > '{}'",
                low, high
            )));
        }
        Ok(())
    }

    fn compile(&self, index: IndexName, ph: &mut Placeholders) -> String {
        let pk = ph.name(index.partition_attribute());
        let pv = ph.value(Value::Text(self.partition.clone()));
        let mut expr = format!("{} = {}", pk, pv);
        if let Some(sort) = &self.sort {
            let sk = ph.name(index.sort_attribute());
            expr.push_str(" AND ");
            expr.push_str(&sort.compile(&sk, ph));
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Post-key-match filter over non-key attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        attribute: String,
        op: Comparator,
        value: Value,
    },
    Between {
        attribute: String,
        low: Value,
        high: Value,
    },
    BeginsWith {
        attribute: String,
        prefix: String,
    },
    Contains {
        attribute: String,
        value: Value,
    },
    Exists(String),
    NotExists(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    fn compare(attribute: impl Into<String>, op: Comparator, value: impl Into<Value>) -> Self {
        Self::Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Eq, value)
    }

    pub fn ne(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Ne, value)
    }

    pub fn lt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Lt, value)
    }

    pub fn le(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Le, value)
    }

    pub fn gt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Gt, value)
    }

    pub fn ge(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Ge, value)
    }

    pub fn between(
        attribute: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::Between {
            attribute: attribute.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::BeginsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        }
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::Exists(attribute.into())
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::NotExists(attribute.into())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates the filter against a stored item. A comparison against a
    /// missing attribute is false, except `<>` which is true.
    pub fn evaluate(&self, item: &Item) -> bool {
        match self {
            Self::Compare {
                attribute,
                op,
                value,
            } => match item.get(attribute) {
                Some(actual) => actual.compare(value).is_some_and(|ord| op.holds(ord)),
                None => *op == Comparator::Ne,
            },
            Self::Between {
                attribute,
                low,
                high,
            } => item.get(attribute).is_some_and(|actual| {
                actual.compare(low).is_some_and(|o| o != Ordering::Less)
                    && actual.compare(high).is_some_and(|o| o != Ordering::Greater)
            }),
            Self::BeginsWith { attribute, prefix } => item
                .get(attribute)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Self::Contains { attribute, value } => {
                item.get(attribute).is_some_and(|actual| actual.contains(value))
            }
            Self::Exists(attribute) => item.contains_key(attribute),
            Self::NotExists(attribute) => !item.contains_key(attribute),
            Self::And(all) => all.iter().all(|f| f.evaluate(item)),
            Self::Or(any) => any.iter().any(|f| f.evaluate(item)),
            Self::Not(inner) => !inner.evaluate(item),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::And(parts) | Self::Or(parts) => {
                if parts.is_empty() {
                    return Err(TableError::validation("AND/OR filter needs at least one operand"));
                }
                parts.iter().try_for_each(Filter::validate)
            }
            Self::Not(inner) => inner.validate(),
            Self::Compare { attribute, .. }
            | Self::Between { attribute, .. }
            | Self::BeginsWith { attribute, .. }
            | Self::Contains { attribute, .. }
            | Self::Exists(attribute)
            | Self::NotExists(attribute) => {
                if attribute.is_empty() {
                    return Err(TableError::validation("filter attribute name is empty"));
                }
                Ok(())
            }
        }
    }

    pub fn compile(&self, ph: &mut Placeholders) -> String {
        match self {
            Self::Compare {
                attribute,
                op,
                value,
            } => {
                let name = ph.name(attribute);
                let value = ph.value(value.clone());
                format!("{} {} {}", name, op.symbol(), value)
            }
            Self::Between {
                attribute,
                low,
                high,
            } => {
                let name = ph.name(attribute);
                let low = ph.value(low.clone());
                let high = ph.value(high.clone());
                format!("{} BETWEEN {} AND {}", name, low, high)
            }
            Self::BeginsWith { attribute, prefix } => {
                let name = ph.name(attribute);
                let value = ph.value(Value::Text(prefix.clone()));
                format!("begins_with({}, {})", name, value)
            }
            Self::Contains { attribute, value } => {
                let name = ph.name(attribute);
                let value = ph.value(value.clone());
                format!("contains({}, {})", name, value)
            }
            Self::Exists(attribute) => format!("attribute_exists({})", ph.name(attribute)),
            Self::NotExists(attribute) => format!("attribute_not_exists({})", ph.name(attribute)),
            Self::And(parts) => join_compiled(parts, " AND ", ph),
            Self::Or(parts) => join_compiled(parts, " OR ", ph),
            Self::Not(inner) => format!("NOT ({})", inner.compile(ph)),
        }
    }
}

fn join_compiled(parts: &[Filter], separator: &str, ph: &mut Placeholders) -> String {
    let compiled: Vec<String> = parts
        .iter()
        .map(|part| format!("({})", part.compile(ph)))
        .collect();
    compiled.join(separator)
}

/// Placeholder-bound strings for one query request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub key_condition: String,
    pub filter: Option<String>,
    pub projection: Option<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
}

impl CompiledQuery {
    pub fn compile(
        index: IndexName,
        key_condition: &KeyCondition,
        filter: Option<&Filter>,
        projection: Option<&[String]>,
    ) -> Self {
        let mut ph = Placeholders::new();
        let key_condition = key_condition.compile(index, &mut ph);
        let filter = filter.map(|f| f.compile(&mut ph));
        let projection = projection.map(|attributes| {
            attributes
                .iter()
                .map(|attribute| ph.name(attribute))
                .collect::<Vec<_>>()
                .join(", ")
        });
        let (names, values) = ph.into_parts();

        Self {
            key_condition,
            filter,
            projection,
            names,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, Value)]) -> Item {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_sort_conditions() {
        assert!(SortCondition::BeginsWith("note#".into()).matches("note#1"));
        assert!(SortCondition::Between("b".into(), "d".into()).matches("c"));
        assert!(!SortCondition::Between("b".into(), "d".into()).matches("e"));
        assert!(SortCondition::Lt("b".into()).matches("a"));
        assert!(SortCondition::Ge("b".into()).matches("b"));
    }

    #[test]
    fn test_key_condition_compiles_with_placeholders() {
        let cond = KeyCondition::partition("user#u1").begins_with("note#");
        let compiled = CompiledQuery::compile(IndexName::Gsi1, &cond, None, None);

        assert_eq!(compiled.key_condition, "#n0 = :v0 AND begins_with(#n1, :v1)");
        assert_eq!(compiled.names["#n0"], "gsi1partition");
        assert_eq!(compiled.names["#n1"], "gsi1sort");
        assert_eq!(compiled.values[":v1"], Value::from("note#"));
    }

    #[test]
    fn test_filter_and_projection_share_allocator() {
        let cond = KeyCondition::partition("chat#p1");
        let filter = Filter::eq("status", "unread").and(Filter::exists("body"));
        let projection = vec!["status".to_string(), "body".to_string()];
        let compiled =
            CompiledQuery::compile(IndexName::Table, &cond, Some(&filter), Some(&projection));

        assert_eq!(compiled.filter.as_deref(), Some("(#n1 = :v1) AND (attribute_exists(#n2))"));
        assert_eq!(compiled.projection.as_deref(), Some("#n1, #n2"));
    }

    #[test]
    fn test_filter_evaluation() {
        let it = item(&[
            ("status", "read".into()),
            ("count", 3.into()),
            ("tags", Value::List(vec!["a".into()])),
        ]);

        assert!(Filter::eq("status", "read").evaluate(&it));
        assert!(Filter::between("count", 1, 5).evaluate(&it));
        assert!(Filter::contains("tags", "a").evaluate(&it));
        assert!(Filter::not_exists("missing").evaluate(&it));
        assert!(Filter::ne("missing", 1).evaluate(&it));
        assert!(!Filter::gt("missing", 1).evaluate(&it));
        assert!(Filter::eq("status", "x").or(Filter::lt("count", 4)).evaluate(&it));
        assert!(!Filter::eq("status", "read").negate().evaluate(&it));
    }

    #[test]
    fn test_validation() {
        assert!(Filter::And(vec![]).validate().unwrap_err().is_validation());
        assert!(KeyCondition::partition("").validate().is_err());
        assert!(KeyCondition::partition("p").between("z", "a").validate().is_err());
        assert!(KeyCondition::partition("p").between("a", "z").validate().is_ok());
    }
}
