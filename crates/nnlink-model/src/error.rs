//! Error types for the association model

/// Errors building model values from host input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Primary record has no id yet
    #[error("primary record has not been created")]
    MissingRecordId,

    /// Required named parameter missing
    #[error("missing required parameter: '{0}'")]
    MissingParameter(&'static str),

    /// Host payload could not be interpreted
    #[error("invalid host payload: {0}")]
    InvalidPayload(String),
}

impl ModelError {
    /// Whether this is the expected "record not created" state rather than a fault
    #[inline]
    #[must_use]
    pub fn is_missing_record(&self) -> bool {
        matches!(self, Self::MissingRecordId)
    }
}
