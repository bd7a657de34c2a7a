//! Declarative `has` / `dont_have` label predicates.
//!
//! Configuration files write label values as plain YAML scalars, so a value
//! may arrive as a string, a boolean or a number. Everything is compared in
//! its string form against the labels reported by the alerting backend.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// A single expected label value.
///
/// A YAML `null` is kept as an absent value: it never equals a real label,
/// so it fails a `has` check and always passes a `dont_have` check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LabelValue(Option<String>);

impl LabelValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Exact string equality against the label actually present on a rule.
    pub fn matches(&self, actual: Option<&str>) -> bool {
        match (self.0.as_deref(), actual) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<bool> for LabelValue {
    fn from(value: bool) -> Self {
        Self::new(value.to_string())
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => f.write_str(v),
            None => f.write_str("null"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabelValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Null(()),
}

impl<'de> Deserialize<'de> for LabelValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawLabelValue::deserialize(deserializer)?;
        Ok(match raw {
            RawLabelValue::Bool(b) => Self::new(b.to_string()),
            RawLabelValue::Int(n) => Self::new(n.to_string()),
            RawLabelValue::UInt(n) => Self::new(n.to_string()),
            RawLabelValue::Float(n) => Self::new(n.to_string()),
            RawLabelValue::Text(s) => Self::new(s),
            RawLabelValue::Null(()) => Self::null(),
        })
    }
}

/// Positive / negative label matcher.
///
/// A label map satisfies the predicate iff every `has` entry is present with
/// an equal value and no `dont_have` entry is present with an equal value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPredicate {
    pub has: IndexMap<String, LabelValue>,
    pub dont_have: IndexMap<String, LabelValue>,
}

impl LabelPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_has(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.has.insert(key.into(), value.into());
        self
    }

    pub fn with_dont_have(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.dont_have.insert(key.into(), value.into());
        self
    }

    /// Whether the predicate constrains nothing (matches every label map).
    pub fn is_empty(&self) -> bool {
        self.has.is_empty() && self.dont_have.is_empty()
    }

    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        let has_all = self
            .has
            .iter()
            .all(|(key, expected)| expected.matches(labels.get(key).map(String::as_str)));
        if !has_all {
            return false;
        }

        !self
            .dont_have
            .iter()
            .any(|(key, forbidden)| forbidden.matches(labels.get(key).map(String::as_str)))
    }

    /// Render as a Grafana alert-list `labelFilter` value (`k=v,k!=v`).
    ///
    /// Keys and values are URL-encoded; null values are skipped.
    pub fn to_label_filter(&self) -> String {
        let positive = self
            .has
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))));
        let negative = self
            .dont_have
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| format!("{}!={}", urlencoding::encode(k), urlencoding::encode(v))));
        positive.chain(negative).collect::<Vec<_>>().join(",")
    }
}
