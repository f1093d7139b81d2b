//! Records returned by host retrievals

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One retrieved row, attribute name to value
pub type Record = Map<String, Value>;

/// Result set of a retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCollection {
    /// Retrieved rows in host order
    #[serde(default)]
    pub entities: Vec<Record>,
}

impl EntityCollection {
    /// Create from rows
    #[inline]
    #[must_use]
    pub fn new(entities: Vec<Record>) -> Self {
        Self { entities }
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no rows were returned
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Record> for EntityCollection {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Read an attribute as a string
///
/// Strings are returned as-is, numbers and booleans are stringified,
/// null and missing attributes are absent.
#[must_use]
pub fn read_string(record: &Record, attribute: &str) -> Option<String> {
    match record.get(attribute)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
