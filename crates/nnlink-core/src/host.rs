//! Host collaborator traits
//!
//! The control never talks to a record store directly. Everything it needs
//! from the surrounding host comes through these seams:
//! - metadata lookup
//! - query execution
//! - the generic associate/disassociate operation
//! - the "output changed" notification
//! - the external multi-select rendering capability

use crate::error::HostError;
use crate::query::FetchExpression;
use crate::widget::ViewModel;
use nnlink_model::{AssociationRequest, EntityCollection, EntityMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Entity metadata lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch metadata for an entity type
    async fn entity_metadata(&self, entity: &str) -> Result<EntityMetadata, HostError>;
}

/// Query execution
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordQuery: Send + Sync {
    /// Retrieve rows of `entity` matching `query`
    async fn retrieve_multiple(
        &self,
        entity: &str,
        query: &FetchExpression,
    ) -> Result<EntityCollection, HostError>;
}

/// Generic relationship operation
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RelationshipExecutor: Send + Sync {
    /// Execute an associate or disassociate request
    async fn execute(&self, request: &AssociationRequest) -> Result<(), HostError>;
}

/// Values the control exposes to the host's field binding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlOutputs {
    /// Mirrored label
    pub bound_field: String,
}

/// "Output changed" notification
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink: Send + Sync {
    /// Called whenever the mirrored label is recomputed
    fn output_changed(&self, outputs: &ControlOutputs);
}

/// External multi-select rendering capability
#[cfg_attr(test, mockall::automock)]
pub trait MultiSelectView: Send + Sync {
    /// Replace the rendered content
    fn render(&self, view: &ViewModel);
}

/// The set of collaborators one control is wired to
#[derive(Clone)]
pub struct HostServices {
    /// Metadata lookup
    pub metadata: Arc<dyn MetadataSource>,
    /// Query execution
    pub query: Arc<dyn RecordQuery>,
    /// Relationship operations
    pub executor: Arc<dyn RelationshipExecutor>,
    /// Output notification
    pub output: Arc<dyn OutputSink>,
    /// Render target
    pub view: Arc<dyn MultiSelectView>,
}

impl HostServices {
    /// Wire every seam to one host object
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: MetadataSource + RecordQuery + RelationshipExecutor + OutputSink + MultiSelectView + 'static,
    {
        Self {
            metadata: host.clone(),
            query: host.clone(),
            executor: host.clone(),
            output: host.clone(),
            view: host,
        }
    }
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
