//! Control parameters and the per-activation relationship setting
//!
//! Hosts hand over raw named string parameters. [`ControlParameters`]
//! normalizes them (empty means absent) and [`RelationshipConfig`] is the
//! setting built from them plus the primary record context.

use crate::error::ModelError;
use crate::reference::EntityReference;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Raw named parameters supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlParameters {
    /// Display attribute of the target entity
    #[serde(default, rename = "primaryfieldname", deserialize_with = "non_empty")]
    pub primary_field_name: Option<String>,
    /// Relationship schema name or navigation property name
    #[serde(default, rename = "relationshipname", deserialize_with = "non_empty")]
    pub relationship_name: Option<String>,
    /// Intersect entity override
    #[serde(default, rename = "relationshipentityname", deserialize_with = "non_empty")]
    pub relationship_entity_name: Option<String>,
    /// Target entity logical name
    #[serde(default, rename = "targetentityname", deserialize_with = "non_empty")]
    pub target_entity_name: Option<String>,
    /// Custom fetch expression for the selectable universe
    #[serde(default, rename = "targetentityfilter", deserialize_with = "non_empty")]
    pub target_entity_filter: Option<String>,
    /// Boolean-as-string diagnostics toggle
    #[serde(default, rename = "enableLogging", deserialize_with = "non_empty")]
    pub enable_logging: Option<String>,
}

impl ControlParameters {
    /// Parameter name for the display attribute
    pub const PRIMARY_FIELD_NAME: &'static str = "primaryfieldname";
    /// Parameter name for the relationship
    pub const RELATIONSHIP_NAME: &'static str = "relationshipname";
    /// Parameter name for the intersect entity override
    pub const RELATIONSHIP_ENTITY_NAME: &'static str = "relationshipentityname";
    /// Parameter name for the target entity
    pub const TARGET_ENTITY_NAME: &'static str = "targetentityname";
    /// Parameter name for the custom universe filter
    pub const TARGET_ENTITY_FILTER: &'static str = "targetentityfilter";
    /// Parameter name for the diagnostics toggle
    pub const ENABLE_LOGGING: &'static str = "enableLogging";

    /// Create empty parameter set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the host's raw name/value map
    #[must_use]
    pub fn from_raw(raw: &HashMap<String, String>) -> Self {
        let get = |name: &str| raw.get(name).and_then(|v| normalize(v));
        Self {
            primary_field_name: get(Self::PRIMARY_FIELD_NAME),
            relationship_name: get(Self::RELATIONSHIP_NAME),
            relationship_entity_name: get(Self::RELATIONSHIP_ENTITY_NAME),
            target_entity_name: get(Self::TARGET_ENTITY_NAME),
            target_entity_filter: get(Self::TARGET_ENTITY_FILTER),
            enable_logging: get(Self::ENABLE_LOGGING),
        }
    }

    /// Whether verbose diagnostics were requested
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.enable_logging
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// With relationship name
    #[must_use]
    pub fn with_relationship(mut self, name: impl Into<String>) -> Self {
        self.relationship_name = normalize(&name.into());
        self
    }

    /// With target entity
    #[must_use]
    pub fn with_target_entity(mut self, name: impl Into<String>) -> Self {
        self.target_entity_name = normalize(&name.into());
        self
    }

    /// With display attribute
    #[must_use]
    pub fn with_primary_field(mut self, name: impl Into<String>) -> Self {
        self.primary_field_name = normalize(&name.into());
        self
    }

    /// With intersect entity override
    #[must_use]
    pub fn with_relationship_entity(mut self, name: impl Into<String>) -> Self {
        self.relationship_entity_name = normalize(&name.into());
        self
    }

    /// With custom universe filter
    #[must_use]
    pub fn with_target_filter(mut self, fetch: impl Into<String>) -> Self {
        self.target_entity_filter = normalize(&fetch.into());
        self
    }

    /// With diagnostics toggle
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = Some(enabled.to_string());
        self
    }
}

fn normalize(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(normalize))
}

/// Host context for one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContext {
    /// Primary entity logical name
    pub entity_type_name: String,
    /// Primary record id; absent until the record is created
    #[serde(default, deserialize_with = "non_empty")]
    pub entity_id: Option<String>,
    /// Named configuration parameters
    #[serde(default)]
    pub parameters: ControlParameters,
    /// Whether the host renders the control read-only
    #[serde(default)]
    pub is_control_disabled: bool,
}

impl RecordContext {
    /// Create context for a primary record
    #[must_use]
    pub fn new(entity_type_name: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type_name: entity_type_name.into(),
            entity_id: normalize(&entity_id.into()),
            parameters: ControlParameters::default(),
            is_control_disabled: false,
        }
    }

    /// With parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: ControlParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// With disabled flag
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.is_control_disabled = disabled;
        self
    }

    /// Whether the primary record exists yet
    #[inline]
    #[must_use]
    pub fn has_record(&self) -> bool {
        self.entity_id.is_some()
    }
}

/// Relationship setting for one activation
///
/// `primary_field_name` and `relationship_entity_name` may start absent and
/// are filled in once by resolution, before any retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipConfig {
    /// Primary entity logical name
    pub primary_entity_name: String,
    /// Primary record id
    pub primary_entity_id: String,
    /// Display attribute of the target entity
    pub primary_field_name: Option<String>,
    /// Relationship identifier as configured
    pub relationship_name: Option<String>,
    /// Intersect (junction) entity
    pub relationship_entity_name: Option<String>,
    /// Target entity logical name
    pub target_entity_name: String,
    /// Custom fetch expression for the selectable universe
    pub target_entity_filter: Option<String>,
}

impl RelationshipConfig {
    /// Build the setting from a refresh context
    ///
    /// # Errors
    /// - `ModelError::MissingRecordId` if the primary record does not exist
    /// - `ModelError::MissingParameter` if no target entity is configured
    pub fn from_context(ctx: &RecordContext) -> Result<Self, ModelError> {
        let primary_entity_id = ctx.entity_id.clone().ok_or(ModelError::MissingRecordId)?;
        let params = &ctx.parameters;
        let target_entity_name = params
            .target_entity_name
            .clone()
            .ok_or(ModelError::MissingParameter(ControlParameters::TARGET_ENTITY_NAME))?;

        Ok(Self {
            primary_entity_name: ctx.entity_type_name.clone(),
            primary_entity_id,
            primary_field_name: params.primary_field_name.clone(),
            relationship_name: params.relationship_name.clone(),
            relationship_entity_name: params.relationship_entity_name.clone(),
            target_entity_name,
            target_entity_filter: params.target_entity_filter.clone(),
        })
    }

    /// Reference to the primary record
    #[must_use]
    pub fn primary_reference(&self) -> EntityReference {
        EntityReference::new(&self.primary_entity_name, &self.primary_entity_id)
    }

    /// Reference to a target record
    #[must_use]
    pub fn target_reference(&self, key: &str) -> EntityReference {
        EntityReference::new(&self.target_entity_name, key)
    }

    /// Id attribute of the primary entity (`<primary>id`)
    #[must_use]
    pub fn primary_id_attribute(&self) -> String {
        format!("{}id", self.primary_entity_name)
    }

    /// Id attribute of the target entity (`<target>id`)
    #[must_use]
    pub fn target_id_attribute(&self) -> String {
        format!("{}id", self.target_entity_name)
    }
}
