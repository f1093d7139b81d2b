//! Selection synchronization
//!
//! [`SelectionSynchronizer`] owns the in-memory selection for one activation
//! and keeps it consistent with the host's association store:
//!
//! 1. `begin_toggle` applies the change optimistically and hands back the
//!    request to dispatch
//! 2. the caller awaits the host operation via [`dispatch`]
//! 3. `complete` records the outcome and applies the [`FailurePolicy`]
//!
//! Each key carries a sequence number so an outcome that arrives after a
//! newer toggle of the same key is recognized as superseded.

use crate::error::{HostError, SyncError};
use crate::host::RelationshipExecutor;
use crate::label::labels_for_options;
use crate::telemetry::Diagnostics;
use nnlink_model::{AssociationRequest, EntityReference, RelationshipConfig, SelectOption, SelectionState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do with the local selection when a host operation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Revert the key's membership and re-derive the label
    #[default]
    Rollback,
    /// Keep the optimistic state and mark the key failed
    KeepOptimistic,
}

/// Confirmation state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Local and remote agree
    Confirmed,
    /// Host operation in flight
    Pending,
    /// Host operation failed and the optimistic state was kept
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct KeyState {
    status: SyncStatus,
    seq: u64,
}

/// A toggle applied locally and awaiting the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToggle {
    /// Option key
    pub key: String,
    /// Selected after the toggle
    pub selected: bool,
    /// Per-synchronizer sequence number
    pub seq: u64,
    /// Request to dispatch
    pub request: AssociationRequest,
}

/// Result of recording a host outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Host confirmed the change
    Confirmed,
    /// Host failed; membership reverted
    RolledBack,
    /// Host failed; optimistic state kept
    MarkedFailed,
    /// A newer toggle of the same key owns the state
    Superseded,
}

impl Completion {
    /// Whether the selection changed as a result
    #[inline]
    #[must_use]
    pub fn changed_selection(self) -> bool {
        matches!(self, Self::RolledBack)
    }
}

/// Selection state for one activation
#[derive(Debug, Clone)]
pub struct SelectionSynchronizer {
    relationship: Option<String>,
    primary: EntityReference,
    target_entity: String,
    universe: Vec<SelectOption>,
    selection: SelectionState,
    keys: BTreeMap<String, KeyState>,
    next_seq: u64,
    policy: FailurePolicy,
}

impl SelectionSynchronizer {
    /// Create synchronizer over a fetched universe and selection
    ///
    /// Selected keys outside the universe are dropped.
    #[must_use]
    pub fn new(
        config: &RelationshipConfig,
        universe: Vec<SelectOption>,
        mut selection: SelectionState,
        policy: FailurePolicy,
    ) -> Self {
        let dropped = selection.retain_known(&universe);
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "associated keys outside the option universe ignored");
        }

        Self {
            relationship: config.relationship_name.clone(),
            primary: config.primary_reference(),
            target_entity: config.target_entity_name.clone(),
            universe,
            selection,
            keys: BTreeMap::new(),
            next_seq: 0,
            policy,
        }
    }

    /// Apply a toggle locally
    ///
    /// Returns `None` when the option is already in the requested state.
    ///
    /// # Errors
    /// - `SyncError::UnknownOption` if `key` is not in the universe
    /// - `SyncError::NoRelationship` if no relationship is configured
    pub fn begin_toggle(&mut self, key: &str, selected: bool) -> Result<Option<PendingToggle>, SyncError> {
        if !self.universe.iter().any(|o| o.key == key) {
            return Err(SyncError::UnknownOption(key.to_string()));
        }
        let relationship = self.relationship.clone().ok_or(SyncError::NoRelationship)?;

        if self.selection.contains(key) == selected {
            return Ok(None);
        }

        let related = EntityReference::new(&self.target_entity, key);
        let request = if selected {
            self.selection.insert(key);
            AssociationRequest::associate(relationship, self.primary.clone(), related)
        } else {
            self.selection.remove(key);
            AssociationRequest::disassociate(relationship, self.primary.clone(), &related)
        };

        self.next_seq += 1;
        let seq = self.next_seq;
        self.keys.insert(
            key.to_string(),
            KeyState {
                status: SyncStatus::Pending,
                seq,
            },
        );

        Ok(Some(PendingToggle {
            key: key.to_string(),
            selected,
            seq,
            request,
        }))
    }

    /// Record the host outcome of a toggle
    pub fn complete(&mut self, pending: &PendingToggle, outcome: Result<(), &HostError>) -> Completion {
        let Some(state) = self.keys.get_mut(&pending.key) else {
            return Completion::Superseded;
        };
        if state.seq != pending.seq {
            return Completion::Superseded;
        }

        match (outcome, self.policy) {
            (Ok(()), _) => {
                state.status = SyncStatus::Confirmed;
                Completion::Confirmed
            }
            (Err(_), FailurePolicy::Rollback) => {
                state.status = SyncStatus::Confirmed;
                if pending.selected {
                    self.selection.remove(&pending.key);
                } else {
                    self.selection.insert(pending.key.clone());
                }
                Completion::RolledBack
            }
            (Err(_), FailurePolicy::KeepOptimistic) => {
                state.status = SyncStatus::Failed;
                Completion::MarkedFailed
            }
        }
    }

    /// Mirrored label of the current selection
    #[must_use]
    pub fn label(&self) -> String {
        labels_for_options(&self.universe, &self.selection)
    }

    /// Current selection
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Option universe
    #[inline]
    #[must_use]
    pub fn universe(&self) -> &[SelectOption] {
        &self.universe
    }

    /// Confirmation state of a key; `Confirmed` for keys never toggled
    #[must_use]
    pub fn status(&self, key: &str) -> SyncStatus {
        self.keys.get(key).map_or(SyncStatus::Confirmed, |s| s.status)
    }

    /// Whether any host operation is in flight
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.keys.values().any(|s| s.status == SyncStatus::Pending)
    }

    /// Whether toggles can be issued at all
    #[inline]
    #[must_use]
    pub fn accepts_toggles(&self) -> bool {
        self.relationship.is_some()
    }
}

/// Send a pending toggle to the host
///
/// # Errors
/// The host's failure, after logging it
pub async fn dispatch(
    executor: &dyn RelationshipExecutor,
    pending: &PendingToggle,
    diagnostics: Diagnostics,
) -> Result<(), HostError> {
    let kind = pending.request.kind();
    diagnostics.log(&format!("{kind} request"), &pending.request);

    executor.execute(&pending.request).await.map_err(|e| {
        tracing::warn!(operation = %kind, key = %pending.key, error = %e, "relationship operation failed");
        e
    })
}
