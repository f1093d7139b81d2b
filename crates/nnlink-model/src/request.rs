//! Generic associate/disassociate requests

use crate::reference::EntityReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operation type code the host assigns to CRUD-style requests
pub const CRUD_OPERATION_TYPE: u8 = 2;

/// Kind of relationship operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Bind records over a relationship
    Associate,
    /// Unbind records
    Disassociate,
}

impl OperationKind {
    /// Host operation name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Associate => "Associate",
            Self::Disassociate => "Disassociate",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request metadata as the host's execute facility expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    /// Always unbound
    pub bound_parameter: Option<String>,
    /// No typed parameters
    pub parameter_types: BTreeMap<String, String>,
    /// CRUD operation type code
    pub operation_type: u8,
    /// `"Associate"` or `"Disassociate"`
    pub operation_name: String,
}

/// Relationship operation against the host
///
/// `target` is the primary record in both variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operationName")]
pub enum AssociationRequest {
    /// Associate related records with the target
    Associate {
        /// Relationship identifier
        relationship: String,
        /// Primary record
        target: EntityReference,
        /// Records to bind
        #[serde(rename = "relatedEntities")]
        related_entities: Vec<EntityReference>,
    },
    /// Disassociate one related record from the target
    Disassociate {
        /// Relationship identifier
        relationship: String,
        /// Primary record
        target: EntityReference,
        /// Record to unbind
        #[serde(rename = "relatedEntityId")]
        related_entity_id: String,
    },
}

impl AssociationRequest {
    /// Build associate request for one related record
    #[must_use]
    pub fn associate(
        relationship: impl Into<String>,
        target: EntityReference,
        related: EntityReference,
    ) -> Self {
        Self::Associate {
            relationship: relationship.into(),
            target,
            related_entities: vec![related],
        }
    }

    /// Build disassociate request for one related record
    #[must_use]
    pub fn disassociate(
        relationship: impl Into<String>,
        target: EntityReference,
        related: &EntityReference,
    ) -> Self {
        Self::Disassociate {
            relationship: relationship.into(),
            target,
            related_entity_id: related.id.clone(),
        }
    }

    /// Operation kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Associate { .. } => OperationKind::Associate,
            Self::Disassociate { .. } => OperationKind::Disassociate,
        }
    }

    /// Host operation name
    #[inline]
    #[must_use]
    pub fn operation_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Relationship identifier
    #[inline]
    #[must_use]
    pub fn relationship(&self) -> &str {
        match self {
            Self::Associate { relationship, .. } | Self::Disassociate { relationship, .. } => {
                relationship
            }
        }
    }

    /// Primary record
    #[inline]
    #[must_use]
    pub fn target(&self) -> &EntityReference {
        match self {
            Self::Associate { target, .. } | Self::Disassociate { target, .. } => target,
        }
    }

    /// Request metadata for the host's execute facility
    #[must_use]
    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            bound_parameter: None,
            parameter_types: BTreeMap::new(),
            operation_type: CRUD_OPERATION_TYPE,
            operation_name: self.operation_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn associate_payload_shape() {
        let req = AssociationRequest::associate(
            "contact_account",
            EntityReference::new("account", "a-1"),
            EntityReference::new("contact", "c-1"),
        );

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "operationName": "Associate",
                "relationship": "contact_account",
                "target": {"entityType": "account", "id": "a-1"},
                "relatedEntities": [{"entityType": "contact", "id": "c-1"}]
            })
        );
    }

    #[test]
    fn disassociate_carries_only_related_id() {
        let related = EntityReference::new("contact", "c-1");
        let req = AssociationRequest::disassociate(
            "contact_account",
            EntityReference::new("account", "a-1"),
            &related,
        );

        assert_eq!(req.kind(), OperationKind::Disassociate);
        assert_eq!(
            serde_json::to_value(&req).unwrap()["relatedEntityId"],
            json!("c-1")
        );
    }

    #[test]
    fn metadata_is_crud_unbound() {
        let req = AssociationRequest::associate(
            "r",
            EntityReference::new("account", "a"),
            EntityReference::new("contact", "c"),
        );
        let meta = req.metadata();
        assert_eq!(meta.operation_type, 2);
        assert_eq!(meta.operation_name, "Associate");
        assert!(meta.bound_parameter.is_none());
        assert!(meta.parameter_types.is_empty());
    }
}
