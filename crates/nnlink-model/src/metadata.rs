//! Host entity metadata
//!
//! Field names follow the host's PascalCase payload so metadata can be
//! deserialized as delivered.

use serde::{Deserialize, Serialize};

/// Metadata for one entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityMetadata {
    /// Entity logical name
    #[serde(default)]
    pub logical_name: Option<String>,
    /// Id attribute
    #[serde(default)]
    pub primary_id_attribute: Option<String>,
    /// Designated display attribute
    #[serde(default)]
    pub primary_name_attribute: Option<String>,
    /// Many-to-many relationship descriptors
    #[serde(default)]
    pub many_to_many_relationships: Vec<ManyToManyRelationship>,
}

impl EntityMetadata {
    /// Create metadata for an entity
    #[must_use]
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: Some(logical_name.into()),
            ..Self::default()
        }
    }

    /// With display attribute
    #[must_use]
    pub fn with_primary_name(mut self, attribute: impl Into<String>) -> Self {
        self.primary_name_attribute = Some(attribute.into());
        self
    }

    /// With a many-to-many descriptor
    #[must_use]
    pub fn with_relationship(mut self, relationship: ManyToManyRelationship) -> Self {
        self.many_to_many_relationships.push(relationship);
        self
    }
}

/// Many-to-many relationship descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManyToManyRelationship {
    /// Relationship schema name
    #[serde(default)]
    pub schema_name: Option<String>,
    /// First side entity
    #[serde(default)]
    pub entity1_logical_name: Option<String>,
    /// Second side entity
    #[serde(default)]
    pub entity2_logical_name: Option<String>,
    /// Navigation property on the first side
    #[serde(default)]
    pub entity1_navigation_property_name: Option<String>,
    /// Navigation property on the second side
    #[serde(default)]
    pub entity2_navigation_property_name: Option<String>,
    /// Junction entity storing association rows
    #[serde(default)]
    pub intersect_entity_name: Option<String>,
}

impl ManyToManyRelationship {
    /// Create descriptor with schema name and intersect entity
    #[must_use]
    pub fn new(schema_name: impl Into<String>, intersect_entity_name: impl Into<String>) -> Self {
        Self {
            schema_name: Some(schema_name.into()),
            intersect_entity_name: Some(intersect_entity_name.into()),
            ..Self::default()
        }
    }

    /// With both side entities
    #[must_use]
    pub fn between(mut self, entity1: impl Into<String>, entity2: impl Into<String>) -> Self {
        self.entity1_logical_name = Some(entity1.into());
        self.entity2_logical_name = Some(entity2.into());
        self
    }

    /// With both navigation properties
    #[must_use]
    pub fn with_navigation(mut self, entity1: impl Into<String>, entity2: impl Into<String>) -> Self {
        self.entity1_navigation_property_name = Some(entity1.into());
        self.entity2_navigation_property_name = Some(entity2.into());
        self
    }

    /// Side opposite `entity`, when both sides are known
    #[must_use]
    pub fn other_side(&self, entity: &str) -> Option<&str> {
        let first = self.entity1_logical_name.as_deref()?;
        let second = self.entity2_logical_name.as_deref()?;
        if first.eq_ignore_ascii_case(entity) {
            Some(second)
        } else if second.eq_ignore_ascii_case(entity) {
            Some(first)
        } else {
            None
        }
    }
}
