//! Testing utilities for NN Link
//!
//! Shared host double, fixtures, and helpers:
//! - [`InMemoryHost`] backs every host seam with in-memory state
//! - [`CallGate`] parks one retrieval or relationship operation until the test releases it
//! - [`fixtures`] builds the account/contact setup most tests start from

#![allow(missing_docs)]

use nnlink_core::{
    ControlOutputs, FetchExpression, HostError, HostServices, MetadataSource, MultiSelectView,
    OutputSink, RecordQuery, RelationshipExecutor, RelationshipMatcher, ViewModel,
};
use nnlink_model::{
    read_string, AssociationRequest, EntityCollection, EntityMetadata, EntityReference,
    ManyToManyRelationship, OperationKind, Record,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

pub mod fixtures;

/// Host operation an injected failure applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "on", content = "entity", rename_all = "snake_case")]
pub enum FailureTarget {
    /// Metadata lookup of an entity
    Metadata(String),
    /// Retrieval from an entity
    Retrieve(String),
    /// Any associate request
    Associate,
    /// Any disassociate request
    Disassociate,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    target: FailureTarget,
    error: HostError,
    once: bool,
}

/// One call the host received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Metadata(String),
    Retrieve {
        entity: String,
        expression: FetchExpression,
    },
    Execute(AssociationRequest),
}

/// Association row between two records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub intersect: String,
    pub left: EntityReference,
    pub right: EntityReference,
}

impl Link {
    fn row(&self) -> Record {
        let mut row = Record::new();
        row.insert(format!("{}id", self.left.entity_type), Value::String(self.left.id.clone()));
        row.insert(format!("{}id", self.right.entity_type), Value::String(self.right.id.clone()));
        row
    }

    fn joins(&self, a: &EntityReference, b_id: &str) -> bool {
        (self.left == *a && self.right.id == b_id) || (self.right == *a && self.left.id == b_id)
    }
}

/// Parks one host call until released
#[derive(Debug, Clone, Default)]
pub struct CallGate {
    parked: Arc<Notify>,
    release: Arc<Notify>,
}

impl CallGate {
    /// Resolves once a call is parked at the gate
    pub async fn parked(&self) {
        self.parked.notified().await;
    }

    /// Let the parked call continue
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn park(&self) {
        self.parked.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug, Default)]
struct HostState {
    metadata: HashMap<String, EntityMetadata>,
    records: HashMap<String, Vec<Record>>,
    links: Vec<Link>,
    canned: HashMap<String, Vec<Record>>,
    failures: Vec<InjectedFailure>,
    calls: Vec<HostCall>,
    views: Vec<ViewModel>,
    outputs: Vec<ControlOutputs>,
}

impl HostState {
    fn take_failure(&mut self, target: &FailureTarget) -> Option<HostError> {
        let index = self.failures.iter().position(|f| f.target == *target)?;
        let failure = if self.failures[index].once {
            self.failures.remove(index)
        } else {
            self.failures[index].clone()
        };
        Some(failure.error)
    }

    fn descriptors(&self) -> Vec<ManyToManyRelationship> {
        let mut all: Vec<ManyToManyRelationship> = Vec::new();
        for meta in self.metadata.values() {
            for descriptor in &meta.many_to_many_relationships {
                if !all.contains(descriptor) {
                    all.push(descriptor.clone());
                }
            }
        }
        all
    }

    fn descriptor_for(&self, relationship: &str, primary_entity: &str) -> Option<ManyToManyRelationship> {
        let all = self.descriptors();
        RelationshipMatcher::tiers(relationship, primary_entity)
            .into_iter()
            .find_map(|matcher| matcher.find(&all).map(|(d, _)| d.clone()))
    }

    fn is_intersect(&self, entity: &str) -> bool {
        self.links.iter().any(|l| l.intersect == entity)
            || self
                .descriptors()
                .iter()
                .any(|d| d.intersect_entity_name.as_deref() == Some(entity))
    }

    fn rows(&self, entity: &str) -> Result<Vec<Record>, HostError> {
        let mut rows = self.records.get(entity).cloned().unwrap_or_default();
        if self.is_intersect(entity) {
            rows.extend(self.links.iter().filter(|l| l.intersect == entity).map(Link::row));
        } else if !self.records.contains_key(entity) {
            return Err(HostError::EntityNotFound(entity.to_string()));
        }
        Ok(rows)
    }

    fn execute(&mut self, request: &AssociationRequest) -> Result<(), HostError> {
        let kind = request.kind();
        let reject = |message: String| HostError::OperationRejected { kind, message };

        let primary = request.target().clone();
        let descriptor = self
            .descriptor_for(request.relationship(), &primary.entity_type)
            .ok_or_else(|| reject(format!("unknown relationship '{}'", request.relationship())))?;
        let intersect = descriptor
            .intersect_entity_name
            .clone()
            .ok_or_else(|| reject("relationship has no intersect entity".into()))?;

        match request {
            AssociationRequest::Associate { related_entities, .. } => {
                for related in related_entities {
                    if self.links.iter().any(|l| l.intersect == intersect && l.joins(&primary, &related.id)) {
                        return Err(reject(format!("{primary} is already associated with {related}")));
                    }
                }
                for related in related_entities {
                    self.links.push(Link {
                        intersect: intersect.clone(),
                        left: primary.clone(),
                        right: related.clone(),
                    });
                }
                Ok(())
            }
            AssociationRequest::Disassociate { related_entity_id, .. } => {
                let position = self
                    .links
                    .iter()
                    .position(|l| l.intersect == intersect && l.joins(&primary, related_entity_id))
                    .ok_or_else(|| reject(format!("{primary} is not associated with '{related_entity_id}'")))?;
                self.links.remove(position);
                Ok(())
            }
        }
    }
}

/// Host double backing every seam with in-memory state
///
/// Association rows are derived from links, so retrieving an intersect
/// entity always reflects associate/disassociate requests already executed.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
    query_gate: Mutex<Option<CallGate>>,
    execute_gate: Mutex<Option<CallGate>>,
}

impl InMemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_metadata(self, metadata: EntityMetadata) -> Self {
        if let Some(name) = metadata.logical_name.clone() {
            self.state.lock().metadata.insert(name, metadata);
        }
        self
    }

    /// Register an entity with no rows yet
    #[must_use]
    pub fn with_entity(self, entity: &str) -> Self {
        self.state.lock().records.entry(entity.to_string()).or_default();
        self
    }

    /// Add a row; non-object values are skipped
    #[must_use]
    pub fn with_record(self, entity: &str, row: Value) -> Self {
        match row {
            Value::Object(row) => self.state.lock().records.entry(entity.to_string()).or_default().push(row),
            other => tracing::warn!(entity, value = %other, "ignoring non-object record"),
        }
        self
    }

    #[must_use]
    pub fn with_association(self, intersect: &str, left: EntityReference, right: EntityReference) -> Self {
        self.state.lock().links.push(Link {
            intersect: intersect.to_string(),
            left,
            right,
        });
        self
    }

    /// Rows returned for an exact verbatim expression
    #[must_use]
    pub fn with_verbatim_result(self, expression: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect();
        self.state.lock().canned.insert(expression.to_string(), rows);
        self
    }

    /// Wire all seams to this host
    #[must_use]
    pub fn services(self: &Arc<Self>) -> HostServices {
        HostServices::from_host(Arc::clone(self))
    }

    /// Fail the next matching call only
    pub fn fail_once(&self, target: FailureTarget, error: HostError) {
        self.inject(target, error, true);
    }

    /// Fail every matching call until cleared
    pub fn fail_always(&self, target: FailureTarget, error: HostError) {
        self.inject(target, error, false);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Park the next retrieval at a gate
    #[must_use]
    pub fn gate_next_query(&self) -> CallGate {
        let gate = CallGate::default();
        *self.query_gate.lock() = Some(gate.clone());
        gate
    }

    /// Park the next associate/disassociate at a gate
    ///
    /// The call is recorded before it parks; injected failures apply on release.
    #[must_use]
    pub fn gate_next_execute(&self) -> CallGate {
        let gate = CallGate::default();
        *self.execute_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    /// Executed relationship requests, in order
    pub fn requests(&self) -> Vec<AssociationRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Execute(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Entities whose metadata was looked up, in order
    pub fn metadata_lookups(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Metadata(entity) => Some(entity.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn views(&self) -> Vec<ViewModel> {
        self.state.lock().views.clone()
    }

    pub fn last_view(&self) -> Option<ViewModel> {
        self.state.lock().views.last().cloned()
    }

    /// Every label notified through the output sink
    pub fn outputs(&self) -> Vec<String> {
        self.state.lock().outputs.iter().map(|o| o.bound_field.clone()).collect()
    }

    pub fn last_output(&self) -> Option<String> {
        self.state.lock().outputs.last().map(|o| o.bound_field.clone())
    }

    /// Ids linked to `primary` through `intersect`, sorted
    pub fn associated_ids(&self, intersect: &str, primary: &EntityReference) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state
            .lock()
            .links
            .iter()
            .filter(|l| l.intersect == intersect)
            .filter_map(|l| {
                if l.left == *primary {
                    Some(l.right.id.clone())
                } else if l.right == *primary {
                    Some(l.left.id.clone())
                } else {
                    None
                }
            })
            .collect();
        ids.sort();
        ids
    }

    fn inject(&self, target: FailureTarget, error: HostError, once: bool) {
        self.state.lock().failures.push(InjectedFailure { target, error, once });
    }
}

#[async_trait::async_trait]
impl MetadataSource for InMemoryHost {
    async fn entity_metadata(&self, entity: &str) -> Result<EntityMetadata, HostError> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::Metadata(entity.to_string()));
        if let Some(error) = state.take_failure(&FailureTarget::Metadata(entity.to_string())) {
            return Err(error);
        }
        state
            .metadata
            .get(entity)
            .cloned()
            .ok_or_else(|| HostError::EntityNotFound(entity.to_string()))
    }
}

#[async_trait::async_trait]
impl RecordQuery for InMemoryHost {
    async fn retrieve_multiple(
        &self,
        entity: &str,
        query: &FetchExpression,
    ) -> Result<EntityCollection, HostError> {
        self.state.lock().calls.push(HostCall::Retrieve {
            entity: entity.to_string(),
            expression: query.clone(),
        });

        let gate = self.query_gate.lock().take();
        if let Some(gate) = gate {
            gate.park().await;
        }

        let mut state = self.state.lock();
        if let Some(error) = state.take_failure(&FailureTarget::Retrieve(entity.to_string())) {
            return Err(error);
        }

        match query {
            FetchExpression::Verbatim(text) => match state.canned.get(text) {
                Some(rows) => Ok(EntityCollection::new(rows.clone())),
                None => state.rows(entity).map(EntityCollection::new),
            },
            FetchExpression::Structured(fetch) => {
                let rows = state.rows(&fetch.entity)?;
                Ok(rows
                    .into_iter()
                    .filter(|row| {
                        fetch
                            .conditions
                            .iter()
                            .all(|c| c.matches(read_string(row, &c.attribute).as_deref()))
                    })
                    .collect())
            }
        }
    }
}

#[async_trait::async_trait]
impl RelationshipExecutor for InMemoryHost {
    async fn execute(&self, request: &AssociationRequest) -> Result<(), HostError> {
        self.state.lock().calls.push(HostCall::Execute(request.clone()));

        let gate = self.execute_gate.lock().take();
        if let Some(gate) = gate {
            gate.park().await;
        }

        let mut state = self.state.lock();

        let target = match request.kind() {
            OperationKind::Associate => FailureTarget::Associate,
            OperationKind::Disassociate => FailureTarget::Disassociate,
        };
        if let Some(error) = state.take_failure(&target) {
            return Err(error);
        }
        state.execute(request)
    }
}

impl OutputSink for InMemoryHost {
    fn output_changed(&self, outputs: &ControlOutputs) {
        self.state.lock().outputs.push(outputs.clone());
    }
}

impl MultiSelectView for InMemoryHost {
    fn render(&self, view: &ViewModel) {
        self.state.lock().views.push(view.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{account_contact_host, primary, INTERSECT, RELATIONSHIP};
    use nnlink_core::{Condition, FetchQuery};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn intersect_rows_follow_links() {
        let host = account_contact_host();
        let query = FetchExpression::Structured(
            FetchQuery::new(INTERSECT)
                .unwrap()
                .filter(Condition::eq("accountid", "a-1").unwrap()),
        );

        let rows = host.retrieve_multiple(INTERSECT, &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(read_string(&rows.entities[0], "contactid").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn associate_then_disassociate() {
        let host = account_contact_host();
        let related = EntityReference::new("contact", "1");

        host.execute(&AssociationRequest::associate(RELATIONSHIP, primary(), related.clone()))
            .await
            .unwrap();
        assert_eq!(host.associated_ids(INTERSECT, &primary()), vec!["1", "2"]);

        let duplicate = host
            .execute(&AssociationRequest::associate(RELATIONSHIP, primary(), related.clone()))
            .await;
        assert!(matches!(duplicate, Err(HostError::OperationRejected { .. })));

        host.execute(&AssociationRequest::disassociate(RELATIONSHIP, primary(), &related))
            .await
            .unwrap();
        assert_eq!(host.associated_ids(INTERSECT, &primary()), vec!["2"]);

        let missing = host
            .execute(&AssociationRequest::disassociate(RELATIONSHIP, primary(), &related))
            .await;
        assert!(matches!(missing, Err(HostError::OperationRejected { .. })));
    }

    #[tokio::test]
    async fn gated_execute_applies_after_release() {
        let host = account_contact_host();
        let gate = host.gate_next_execute();
        let request = AssociationRequest::associate(RELATIONSHIP, primary(), EntityReference::new("contact", "1"));

        let (result, ()) = tokio::join!(host.execute(&request), async {
            gate.parked().await;
            assert_eq!(host.requests(), vec![request.clone()]);
            assert_eq!(host.associated_ids(INTERSECT, &primary()), vec!["2"]);
            gate.release();
        });

        assert!(result.is_ok());
        assert_eq!(host.associated_ids(INTERSECT, &primary()), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let host = account_contact_host();
        host.fail_once(FailureTarget::Metadata("contact".into()), HostError::Unavailable("down".into()));

        assert!(host.entity_metadata("contact").await.is_err());
        assert!(host.entity_metadata("contact").await.is_ok());
        assert_eq!(host.metadata_lookups(), vec!["contact", "contact"]);
    }

    #[tokio::test]
    async fn unknown_entity_not_found() {
        let host = InMemoryHost::new();
        let query = FetchExpression::Structured(FetchQuery::new("lead").unwrap());
        assert_eq!(
            host.retrieve_multiple("lead", &query).await.unwrap_err(),
            HostError::EntityNotFound("lead".into())
        );
    }

    #[tokio::test]
    async fn verbatim_uses_canned_rows() {
        let host = account_contact_host()
            .with_verbatim_result("<fetch custom/>", vec![serde_json::json!({"contactid": "9"})]);
        let rows = host
            .retrieve_multiple("contact", &FetchExpression::Verbatim("<fetch custom/>".into()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
