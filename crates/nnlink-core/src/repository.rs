//! Option retrieval
//!
//! Two retrievals per refresh: the universe of selectable target records and
//! the keys currently associated with the primary record. Either failing
//! fails the refresh; partial results are never synthesized.

use crate::error::RetrievalError;
use crate::host::RecordQuery;
use crate::query::{selected_query, universe_query, FetchExpression};
use crate::telemetry::Diagnostics;
use nnlink_model::{read_string, EntityCollection, RelationshipConfig, SelectOption, SelectionState};
use std::cmp::Ordering;

/// Executes option retrievals against the host
pub struct OptionRepository<'a> {
    query: &'a dyn RecordQuery,
    diagnostics: Diagnostics,
}

impl<'a> OptionRepository<'a> {
    /// Create repository over a query facility
    #[inline]
    #[must_use]
    pub fn new(query: &'a dyn RecordQuery, diagnostics: Diagnostics) -> Self {
        Self { query, diagnostics }
    }

    /// Every selectable option, sorted by text
    ///
    /// # Errors
    /// - `RetrievalError::Query` if the query cannot be built
    /// - `RetrievalError::Host` if the host retrieval fails
    pub async fn fetch_universe(
        &self,
        config: &RelationshipConfig,
    ) -> Result<Vec<SelectOption>, RetrievalError> {
        let expression = universe_query(config)?;
        self.diagnostics.log("Fetch (all options)", &expression);

        let rows = self.retrieve(&config.target_entity_name, &expression).await?;

        let key_attribute = config.target_id_attribute();
        let mut options: Vec<SelectOption> = rows
            .entities
            .iter()
            .filter_map(|row| {
                let Some(key) = read_string(row, &key_attribute) else {
                    tracing::debug!(attribute = %key_attribute, "skipping record without id");
                    return None;
                };
                let text = config
                    .primary_field_name
                    .as_deref()
                    .and_then(|field| read_string(row, field));
                Some(SelectOption { key, text })
            })
            .collect();

        sort_options(&mut options);
        Ok(options)
    }

    /// Keys associated with the primary record
    ///
    /// # Errors
    /// - `RetrievalError::Query` if the intersect entity is unresolved
    /// - `RetrievalError::Host` if the host retrieval fails
    pub async fn fetch_selected(
        &self,
        config: &RelationshipConfig,
    ) -> Result<SelectionState, RetrievalError> {
        let expression = selected_query(config)?;
        self.diagnostics.log("Fetch (selected options)", &expression);

        let intersect = config.relationship_entity_name.as_deref().unwrap_or_default();
        let rows = self.retrieve(intersect, &expression).await?;

        let key_attribute = config.target_id_attribute();
        Ok(rows
            .entities
            .iter()
            .filter_map(|row| read_string(row, &key_attribute))
            .collect())
    }

    async fn retrieve(
        &self,
        entity: &str,
        expression: &FetchExpression,
    ) -> Result<EntityCollection, RetrievalError> {
        self.query
            .retrieve_multiple(entity, expression)
            .await
            .map_err(|e| RetrievalError::host(entity, e))
    }
}

/// Sort ascending by text, stable, absent text last
pub fn sort_options(options: &mut [SelectOption]) {
    options.sort_by(|a, b| compare_text(a.text.as_deref(), b.text.as_deref()));
}

fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
