use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attributes a node advertises when its channel attaches (`os`, `cores`, `zone`, ...).
pub type NodeAttributes = BTreeMap<String, String>;

/// Predicate over [`NodeAttributes`] restricting which nodes may run a job.
///
/// Numeric rules parse the attribute as a number; a missing or non-numeric
/// attribute never satisfies them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule")]
pub enum ExecutionPolicy {
    Equal { key: String, value: String },
    Exists { key: String },
    AtLeast { key: String, value: i64 },
    AtMost { key: String, value: i64 },
    Not { policy: Box<ExecutionPolicy> },
    All { policies: Vec<ExecutionPolicy> },
    Any { policies: Vec<ExecutionPolicy> },
}

impl ExecutionPolicy {
    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equal {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self::Exists { key: key.into() }
    }

    pub fn at_least(key: impl Into<String>, value: i64) -> Self {
        Self::AtLeast {
            key: key.into(),
            value,
        }
    }

    pub fn at_most(key: impl Into<String>, value: i64) -> Self {
        Self::AtMost {
            key: key.into(),
            value,
        }
    }

    pub fn negate(self) -> Self {
        Self::Not {
            policy: Box::new(self),
        }
    }

    pub fn all(policies: impl IntoIterator<Item = ExecutionPolicy>) -> Self {
        Self::All {
            policies: policies.into_iter().collect(),
        }
    }

    pub fn any(policies: impl IntoIterator<Item = ExecutionPolicy>) -> Self {
        Self::Any {
            policies: policies.into_iter().collect(),
        }
    }

    pub fn matches(&self, node: &NodeAttributes) -> bool {
        match self {
            Self::Equal { key, value } => node.get(key).is_some_and(|v| v == value),
            Self::Exists { key } => node.contains_key(key),
            Self::AtLeast { key, value } => number(node, key).is_some_and(|v| v >= *value as f64),
            Self::AtMost { key, value } => number(node, key).is_some_and(|v| v <= *value as f64),
            Self::Not { policy } => !policy.matches(node),
            Self::All { policies } => policies.iter().all(|p| p.matches(node)),
            Self::Any { policies } => policies.iter().any(|p| p.matches(node)),
        }
    }
}

fn number(node: &NodeAttributes, key: &str) -> Option<f64> {
    node.get(key)?.trim().parse::<f64>().ok()
}
