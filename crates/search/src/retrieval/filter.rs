//! Metadata filtering applied during the similarity scan

use std::collections::BTreeMap;

use convorag_common::errors::AppError;
use convorag_common::models::Metadata;
use serde_json::Value;

/// Accepted values for one metadata key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Exact match
    One(String),
    /// Match any of the listed values
    AnyOf(Vec<String>),
}

impl FilterValue {
    fn accepts(&self, value: &str) -> bool {
        match self {
            FilterValue::One(expected) => expected == value,
            FilterValue::AnyOf(options) => options.iter().any(|o| o == value),
        }
    }
}

/// Conjunction of per-key constraints over chunk metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    constraints: BTreeMap<String, FilterValue>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), FilterValue::One(value.into()));
        self
    }

    /// Require `key` to be one of `values`
    pub fn any_of<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.constraints.insert(key.into(), FilterValue::AnyOf(values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Every constrained key must be present and accepted
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.constraints.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .map(|actual| expected.accepts(actual))
                .unwrap_or(false)
        })
    }
}

/// Build a filter from request JSON. Scalars compare by their string form,
/// arrays of scalars mean "any of".
impl TryFrom<serde_json::Map<String, Value>> for MetadataFilter {
    type Error = AppError;

    fn try_from(map: serde_json::Map<String, Value>) -> Result<Self, Self::Error> {
        let mut filter = MetadataFilter::new();
        for (key, value) in map {
            let constraint = match value {
                Value::Array(items) => FilterValue::AnyOf(
                    items
                        .into_iter()
                        .map(|item| scalar(&key, item))
                        .collect::<Result<_, _>>()?,
                ),
                other => FilterValue::One(scalar(&key, other)?),
            };
            filter.constraints.insert(key, constraint);
        }
        Ok(filter)
    }
}

fn scalar(key: &str, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(AppError::Validation {
            message: format!("filter_metadata.{} must be a string, number, boolean or a list of them", key),
            field: Some("filter_metadata".to_string()),
        }),
    }
}
