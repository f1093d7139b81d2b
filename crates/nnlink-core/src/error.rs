//! Error types for the association engine
//!
//! Mirrors the failure taxonomy of the control:
//! - Resolution misses are not errors (reported through `Resolution`)
//! - Retrieval failures abort the refresh that hit them
//! - Association failures are absorbed by the synchronizer
//! - A missing primary record is a state, not an error

use nnlink_model::{ModelError, OperationKind};

/// Failure reported by a host collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Entity type unknown to the host
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Caller lacks privileges for the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Host rejected the query
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// Transport or service failure
    #[error("host unavailable: {0}")]
    Unavailable(String),

    /// Host rejected a relationship operation
    #[error("{kind} rejected: {message}")]
    OperationRejected {
        /// Operation that failed
        kind: OperationKind,
        /// Host message
        message: String,
    },
}

/// Errors building fetch expressions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Entity or attribute name is not a logical name
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Intersect entity was never resolved
    #[error("intersect entity is not resolved for relationship '{relationship}'")]
    UnresolvedIntersectEntity {
        /// Configured relationship name (empty when none)
        relationship: String,
    },

    /// Expression could not be written
    #[error("failed to write fetch expression: {0}")]
    Render(String),
}

/// Errors retrieving options or the associated subset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    /// Query could not be built
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Host retrieval failed
    #[error("retrieval from '{entity}' failed: {source}")]
    Host {
        /// Entity queried
        entity: String,
        /// Underlying host failure
        #[source]
        source: HostError,
    },
}

impl RetrievalError {
    /// Create host retrieval error
    #[inline]
    pub fn host(entity: impl Into<String>, source: HostError) -> Self {
        Self::Host {
            entity: entity.into(),
            source,
        }
    }

    /// Whether the refresh can continue with an empty selection
    ///
    /// Only an unresolved intersect entity qualifies.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Query(QueryError::UnresolvedIntersectEntity { .. }))
    }
}

/// Errors from the selection synchronizer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Key is not in the option universe
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// No relationship is configured to operate on
    #[error("no relationship configured")]
    NoRelationship,
}

/// Errors surfaced by the control
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// Setting could not be built
    #[error("configuration error: {0}")]
    Config(#[from] ModelError),

    /// Retrieval failed for this refresh
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Toggle rejected
    #[error("toggle rejected: {0}")]
    Sync(#[from] SyncError),
}

impl ControlError {
    /// Whether the error aborted a refresh
    #[inline]
    #[must_use]
    pub fn is_fatal_for_refresh(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Retrieval(_))
    }
}
