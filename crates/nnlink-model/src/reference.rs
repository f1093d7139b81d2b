//! Record references

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one record by entity type and id
///
/// Immutable value, constructed fresh per operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    /// Entity logical name
    pub entity_type: String,
    /// Record id
    pub id: String,
}

impl EntityReference {
    /// Create new reference
    #[inline]
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity_type, self.id)
    }
}
