//! Association control
//!
//! Drives one embedded multi-select through its activation lifecycle:
//!
//! ```text
//! Uninitialized ──refresh (no id)──▶ NoRecord
//!       │                               │
//!       └──────refresh (id)──▶ Loaded ◀─┘
//!                               │  ▲
//!                               └──┘ refresh re-runs the whole pipeline
//! ```
//!
//! A refresh runs settings → resolution → retrieval → label → render, in that
//! order. Every refresh takes a generation token; only the chain whose token
//! is still the latest when it finishes may commit. Superseded chains are
//! discarded without rendering or notifying.
//!
//! Host callbacks (`render`, `output_changed`) run with the state lock held
//! so the latest generation is always the last to render. They must not call
//! back into the control.

use crate::error::ControlError;
use crate::host::{ControlOutputs, HostServices};
use crate::repository::OptionRepository;
use crate::resolver::{RelationshipResolver, ResolutionReport};
use crate::sync::{dispatch, Completion, FailurePolicy, SelectionSynchronizer, SyncStatus};
use crate::telemetry::Diagnostics;
use crate::widget::{MultiSelectAdapter, ToggleEvent, ViewModel, DEFAULT_PLACEHOLDER, NO_RECORD_MESSAGE};
use nnlink_model::{RecordContext, RelationshipConfig, SelectOption, SelectionState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Control configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlOptions {
    /// Handling of failed associate/disassociate operations
    pub failure_policy: FailurePolicy,
    /// Multi-select placeholder
    pub placeholder: String,
    /// Message shown while the primary record does not exist
    pub no_record_message: String,
}

impl ControlOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With failure policy
    #[inline]
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// With placeholder
    #[inline]
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// With no-record message
    #[inline]
    #[must_use]
    pub fn with_no_record_message(mut self, message: impl Into<String>) -> Self {
        self.no_record_message = message.into();
        self
    }
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            no_record_message: NO_RECORD_MESSAGE.to_string(),
        }
    }
}

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlPhase {
    /// Never refreshed, or destroyed
    Uninitialized,
    /// Primary record not created yet
    NoRecord,
    /// Options and selection loaded
    Loaded,
    /// Last refresh failed during retrieval
    Failed,
}

/// Result of a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Placeholder shown
    NoRecord,
    /// Options rendered with this label
    Loaded {
        /// Mirrored label
        label: String,
    },
    /// A newer refresh started before this one finished
    Superseded,
}

/// Why a toggle had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No options loaded
    NotLoaded,
    /// Control is read-only
    Disabled,
    /// Option already in the requested state
    NoTransition,
}

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Nothing sent to the host
    Ignored(IgnoreReason),
    /// Host operation attempted
    Applied(Completion),
}

struct Loaded {
    generation: u64,
    config: RelationshipConfig,
    report: ResolutionReport,
    sync: SelectionSynchronizer,
    adapter: MultiSelectAdapter,
    disabled: bool,
    diagnostics: Diagnostics,
}

impl Loaded {
    fn view(&self, options: &ControlOptions) -> ViewModel {
        ViewModel::multi_select(
            self.sync.universe(),
            self.sync.selection(),
            &options.placeholder,
            self.disabled,
        )
    }
}

enum ControlState {
    Uninitialized,
    NoRecord,
    Loaded(Box<Loaded>),
    Failed,
}

struct Inner {
    state: ControlState,
    mirror: String,
}

/// One embedded association control
pub struct AssociationControl {
    host: HostServices,
    options: ControlOptions,
    generation: AtomicU64,
    inner: Mutex<Inner>,
}

impl AssociationControl {
    /// Create control wired to host services
    #[must_use]
    pub fn new(host: HostServices, options: ControlOptions) -> Self {
        Self {
            host,
            options,
            generation: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                state: ControlState::Uninitialized,
                mirror: String::new(),
            }),
        }
    }

    /// First activation
    ///
    /// # Errors
    /// See [`AssociationControl::refresh`]
    pub async fn init(&self, ctx: RecordContext) -> Result<RefreshOutcome, ControlError> {
        tracing::debug!(entity = %ctx.entity_type_name, "init");
        self.refresh(ctx).await
    }

    /// Host-triggered update
    ///
    /// # Errors
    /// See [`AssociationControl::refresh`]
    pub async fn update_view(&self, ctx: RecordContext) -> Result<RefreshOutcome, ControlError> {
        tracing::debug!(entity = %ctx.entity_type_name, "update view");
        self.refresh(ctx).await
    }

    /// Re-run the whole pipeline for `ctx`
    ///
    /// Discards the previous selection, including optimistic changes the
    /// host has not confirmed.
    ///
    /// # Errors
    /// - `ControlError::Config` if the setting cannot be built
    /// - `ControlError::Retrieval` if a retrieval fails
    ///
    /// A superseded refresh reports `Ok(RefreshOutcome::Superseded)` even if it failed.
    pub async fn refresh(&self, ctx: RecordContext) -> Result<RefreshOutcome, ControlError> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let diagnostics = Diagnostics::new(ctx.parameters.logging_enabled());

        if !ctx.has_record() {
            let mut inner = self.inner.lock();
            if !self.is_current(token) {
                return Ok(RefreshOutcome::Superseded);
            }
            inner.state = ControlState::NoRecord;
            self.host.view.render(&ViewModel::Placeholder {
                message: self.options.no_record_message.clone(),
            });
            if !inner.mirror.is_empty() {
                inner.mirror.clear();
                self.host.output.output_changed(&ControlOutputs::default());
            }
            return Ok(RefreshOutcome::NoRecord);
        }

        let mut config = match RelationshipConfig::from_context(&ctx) {
            Ok(config) => config,
            Err(e) => return self.fail(token, e.into()),
        };
        diagnostics.log("Settings (raw)", &config);

        let report = RelationshipResolver::new(self.host.metadata.as_ref(), diagnostics)
            .resolve(&mut config)
            .await;
        diagnostics.log("Settings (resolved)", &config);

        let repository = OptionRepository::new(self.host.query.as_ref(), diagnostics);
        let universe = match repository.fetch_universe(&config).await {
            Ok(universe) => universe,
            Err(e) => return self.fail(token, e.into()),
        };
        let selected = match repository.fetch_selected(&config).await {
            Ok(selected) => selected,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "showing empty selection");
                SelectionState::new()
            }
            Err(e) => return self.fail(token, e.into()),
        };

        let sync = SelectionSynchronizer::new(&config, universe, selected, self.options.failure_policy);
        if !sync.accepts_toggles() {
            tracing::warn!(target_entity = %config.target_entity_name, "no relationship resolved, control is display only");
        }
        let adapter = MultiSelectAdapter::new(sync.universe(), sync.selection());
        let label = sync.label();
        let loaded = Loaded {
            generation: token,
            config,
            report,
            sync,
            adapter,
            disabled: ctx.is_control_disabled,
            diagnostics,
        };

        let mut inner = self.inner.lock();
        if !self.is_current(token) {
            tracing::debug!(token, "refresh superseded, discarding results");
            return Ok(RefreshOutcome::Superseded);
        }
        if let ControlState::Loaded(previous) = &inner.state {
            if previous.sync.has_pending() {
                tracing::debug!(token, "discarding unconfirmed toggles of the previous load");
            }
        }
        let view = loaded.view(&self.options);
        inner.state = ControlState::Loaded(Box::new(loaded));
        inner.mirror.clone_from(&label);
        self.publish(&view, &label);

        Ok(RefreshOutcome::Loaded { label })
    }

    /// Apply a toggle event from the widget
    ///
    /// The local selection, render and mirrored label change before the host
    /// operation is awaited. A failed operation is absorbed according to the
    /// configured [`FailurePolicy`].
    ///
    /// # Errors
    /// `ControlError::Sync` for unknown options or when no relationship is configured
    pub async fn handle_toggle(&self, event: ToggleEvent) -> Result<ToggleOutcome, ControlError> {
        let (pending, token, diagnostics) = {
            let mut guard = self.inner.lock();
            let Inner { state, mirror } = &mut *guard;
            let ControlState::Loaded(loaded) = state else {
                return Ok(ToggleOutcome::Ignored(IgnoreReason::NotLoaded));
            };
            if loaded.disabled {
                return Ok(ToggleOutcome::Ignored(IgnoreReason::Disabled));
            }

            let begun = loaded.sync.begin_toggle(&event.key, event.selected);
            let shown = loaded.sync.selection().contains(&event.key);
            loaded.adapter.set(&event.key, shown);

            let Some(pending) = begun? else {
                return Ok(ToggleOutcome::Ignored(IgnoreReason::NoTransition));
            };

            *mirror = loaded.sync.label();
            self.publish(&loaded.view(&self.options), mirror);
            (pending, loaded.generation, loaded.diagnostics)
        };

        let outcome = dispatch(self.host.executor.as_ref(), &pending, diagnostics).await;

        let mut guard = self.inner.lock();
        let Inner { state, mirror } = &mut *guard;
        let loaded = match state {
            ControlState::Loaded(loaded) if loaded.generation == token => loaded,
            _ => {
                tracing::debug!(key = %pending.key, "toggle outcome arrived after refresh, ignored");
                return Ok(ToggleOutcome::Applied(Completion::Superseded));
            }
        };

        let completion = loaded.sync.complete(&pending, outcome.as_ref().map(|_| ()));
        if completion.changed_selection() {
            let shown = loaded.sync.selection().contains(&pending.key);
            loaded.adapter.set(&pending.key, shown);
            *mirror = loaded.sync.label();
            self.publish(&loaded.view(&self.options), mirror);
        }

        Ok(ToggleOutcome::Applied(completion))
    }

    /// Toggle one option by key
    ///
    /// # Errors
    /// See [`AssociationControl::handle_toggle`]
    pub async fn toggle(&self, key: &str, selected: bool) -> Result<ToggleOutcome, ControlError> {
        self.handle_toggle(ToggleEvent {
            key: key.to_string(),
            selected,
        })
        .await
    }

    /// Widget reports one option's selected flag
    ///
    /// Only genuine transitions reach [`AssociationControl::handle_toggle`].
    ///
    /// # Errors
    /// See [`AssociationControl::handle_toggle`]
    pub async fn on_item_changed(&self, key: &str, selected: bool) -> Result<ToggleOutcome, ControlError> {
        let event = {
            let mut guard = self.inner.lock();
            match &mut guard.state {
                ControlState::Loaded(loaded) => loaded.adapter.on_item_changed(key, selected),
                _ => return Ok(ToggleOutcome::Ignored(IgnoreReason::NotLoaded)),
            }
        };
        match event {
            Some(event) => self.handle_toggle(event).await,
            None => Ok(ToggleOutcome::Ignored(IgnoreReason::NoTransition)),
        }
    }

    /// Widget reports its whole selection
    ///
    /// Every changed option is toggled; host operations run concurrently with
    /// no ordering between them.
    pub async fn on_selection_changed(&self, keys: &[String]) -> Vec<Result<ToggleOutcome, ControlError>> {
        let events = {
            let mut guard = self.inner.lock();
            match &mut guard.state {
                ControlState::Loaded(loaded) => loaded.adapter.diff_snapshot(keys.iter().map(String::as_str)),
                _ => Vec::new(),
            }
        };
        futures::future::join_all(events.into_iter().map(|event| self.handle_toggle(event))).await
    }

    /// Outputs for the host's field binding
    #[must_use]
    pub fn get_outputs(&self) -> ControlOutputs {
        ControlOutputs {
            bound_field: self.inner.lock().mirror.clone(),
        }
    }

    /// Tear down; in-flight chains are discarded when they finish
    pub fn destroy(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.state = ControlState::Uninitialized;
        inner.mirror.clear();
        self.host.view.render(&ViewModel::Empty);
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn state(&self) -> ControlPhase {
        match self.inner.lock().state {
            ControlState::Uninitialized => ControlPhase::Uninitialized,
            ControlState::NoRecord => ControlPhase::NoRecord,
            ControlState::Loaded(_) => ControlPhase::Loaded,
            ControlState::Failed => ControlPhase::Failed,
        }
    }

    /// Current selection, when loaded
    #[must_use]
    pub fn selection(&self) -> Option<SelectionState> {
        self.with_loaded(|l| l.sync.selection().clone())
    }

    /// Option universe, when loaded
    #[must_use]
    pub fn universe(&self) -> Option<Vec<SelectOption>> {
        self.with_loaded(|l| l.sync.universe().to_vec())
    }

    /// Resolved setting, when loaded
    #[must_use]
    pub fn config(&self) -> Option<RelationshipConfig> {
        self.with_loaded(|l| l.config.clone())
    }

    /// Resolution outcome of the loaded activation
    #[must_use]
    pub fn resolution(&self) -> Option<ResolutionReport> {
        self.with_loaded(|l| l.report.clone())
    }

    /// Confirmation state of an option, when loaded
    #[must_use]
    pub fn status(&self, key: &str) -> Option<SyncStatus> {
        self.with_loaded(|l| l.sync.status(key))
    }

    fn with_loaded<T>(&self, f: impl FnOnce(&Loaded) -> T) -> Option<T> {
        match &self.inner.lock().state {
            ControlState::Loaded(loaded) => Some(f(loaded)),
            _ => None,
        }
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    fn fail(&self, token: u64, error: ControlError) -> Result<RefreshOutcome, ControlError> {
        let mut inner = self.inner.lock();
        if !self.is_current(token) {
            tracing::debug!(token, error = %error, "superseded refresh failed");
            return Ok(RefreshOutcome::Superseded);
        }
        tracing::error!(error = %error, "refresh failed");
        inner.state = ControlState::Failed;
        self.host.view.render(&ViewModel::Empty);
        Err(error)
    }

    fn publish(&self, view: &ViewModel, label: &str) {
        self.host.view.render(view);
        self.host.output.output_changed(&ControlOutputs {
            bound_field: label.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HostError, RetrievalError};
    use crate::host::{
        MockMetadataSource, MockMultiSelectView, MockOutputSink, MockRecordQuery, MockRelationshipExecutor,
    };
    use crate::query::FetchExpression;
    use nnlink_model::{AssociationRequest, ControlParameters, EntityCollection, ModelError, OperationKind};
    use parking_lot::Mutex as PlMutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn params() -> ControlParameters {
        ControlParameters::new()
            .with_target_entity("contact")
            .with_primary_field("fullname")
            .with_relationship("contact_account")
            .with_relationship_entity("accountcontact")
    }

    fn query() -> MockRecordQuery {
        let mut query = MockRecordQuery::new();
        query.expect_retrieve_multiple().returning(|entity, _: &FetchExpression| {
            let rows = match entity {
                "contact" => vec![
                    json!({"contactid": "2", "fullname": "Beta"}),
                    json!({"contactid": "1", "fullname": "Alpha"}),
                ],
                _ => vec![json!({"accountid": "a-1", "contactid": "2"})],
            };
            Ok(rows.into_iter().filter_map(|v| v.as_object().cloned()).collect())
        });
        query
    }

    struct Recorder {
        views: Arc<PlMutex<Vec<ViewModel>>>,
        outputs: Arc<PlMutex<Vec<String>>>,
    }

    fn services(query: MockRecordQuery, executor: MockRelationshipExecutor) -> (HostServices, Recorder) {
        let mut metadata = MockMetadataSource::new();
        metadata.expect_entity_metadata().never();

        let views = Arc::new(PlMutex::new(Vec::new()));
        let outputs = Arc::new(PlMutex::new(Vec::new()));

        let mut view = MockMultiSelectView::new();
        let sink = views.clone();
        view.expect_render().returning(move |v| sink.lock().push(v.clone()));

        let mut output = MockOutputSink::new();
        let sink = outputs.clone();
        output
            .expect_output_changed()
            .returning(move |o| sink.lock().push(o.bound_field.clone()));

        let host = HostServices {
            metadata: Arc::new(metadata),
            query: Arc::new(query),
            executor: Arc::new(executor),
            output: Arc::new(output),
            view: Arc::new(view),
        };
        (host, Recorder { views, outputs })
    }

    fn ctx() -> RecordContext {
        RecordContext::new("account", "a-1").with_parameters(params())
    }

    #[tokio::test]
    async fn missing_record_shows_placeholder() {
        let mut query = MockRecordQuery::new();
        query.expect_retrieve_multiple().never();
        let (host, recorder) = services(query, MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());

        let outcome = control.init(RecordContext::new("account", "").with_parameters(params())).await;

        assert_eq!(outcome, Ok(RefreshOutcome::NoRecord));
        assert_eq!(control.state(), ControlPhase::NoRecord);
        assert_eq!(
            recorder.views.lock().as_slice(),
            &[ViewModel::Placeholder {
                message: NO_RECORD_MESSAGE.to_string()
            }]
        );
        assert!(recorder.outputs.lock().is_empty());
        assert_eq!(control.get_outputs().bound_field, "");
    }

    #[tokio::test]
    async fn missing_target_entity_is_config_error() {
        let mut query = MockRecordQuery::new();
        query.expect_retrieve_multiple().never();
        let (host, recorder) = services(query, MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());

        let err = control
            .init(RecordContext::new("account", "a-1").with_parameters(ControlParameters::new()))
            .await
            .unwrap_err();

        assert_eq!(err, ControlError::Config(ModelError::MissingParameter("targetentityname")));
        assert_eq!(control.state(), ControlPhase::Failed);
        assert_eq!(recorder.views.lock().as_slice(), &[ViewModel::Empty]);
    }

    #[tokio::test]
    async fn refresh_loads_and_mirrors_label() {
        let (host, recorder) = services(query(), MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());

        let outcome = control.init(ctx()).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Loaded { label: "Beta".into() });
        assert_eq!(control.state(), ControlPhase::Loaded);
        assert_eq!(control.get_outputs().bound_field, "Beta");
        assert_eq!(recorder.outputs.lock().as_slice(), &["Beta".to_string()]);
        assert_eq!(recorder.views.lock()[0].selected_keys(), vec!["2"]);
        assert!(control.resolution().is_some_and(|r| r.has_intersect()));
    }

    #[tokio::test]
    async fn toggle_associates_and_updates_label() {
        let mut executor = MockRelationshipExecutor::new();
        executor
            .expect_execute()
            .withf(|req: &AssociationRequest| req.kind() == OperationKind::Associate)
            .times(1)
            .returning(|_| Ok(()));
        let (host, recorder) = services(query(), executor);
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();

        let outcome = control.handle_toggle(ToggleEvent::select("1")).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Applied(Completion::Confirmed));
        assert_eq!(control.get_outputs().bound_field, "Alpha, Beta");
        assert_eq!(control.status("1"), Some(SyncStatus::Confirmed));
        assert_eq!(
            recorder.outputs.lock().as_slice(),
            &["Beta".to_string(), "Alpha, Beta".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back() {
        let mut executor = MockRelationshipExecutor::new();
        executor.expect_execute().times(1).returning(|_| {
            Err(HostError::OperationRejected {
                kind: OperationKind::Disassociate,
                message: "locked".into(),
            })
        });
        let (host, recorder) = services(query(), executor);
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();

        let outcome = control.handle_toggle(ToggleEvent::deselect("2")).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Applied(Completion::RolledBack));
        assert_eq!(control.selection(), Some(SelectionState::from_keys(["2"])));
        assert_eq!(
            recorder.outputs.lock().as_slice(),
            &["Beta".to_string(), String::new(), "Beta".to_string()]
        );
        let last = recorder.views.lock().last().cloned().unwrap();
        assert_eq!(last.selected_keys(), vec!["2"]);
    }

    #[tokio::test]
    async fn keep_optimistic_policy_marks_failed() {
        let mut executor = MockRelationshipExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Err(HostError::Unavailable("offline".into())));
        let (host, _) = services(query(), executor);
        let control = AssociationControl::new(
            host,
            ControlOptions::new().with_failure_policy(FailurePolicy::KeepOptimistic),
        );
        control.init(ctx()).await.unwrap();

        let outcome = control.toggle("1", true).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Applied(Completion::MarkedFailed));
        assert_eq!(control.status("1"), Some(SyncStatus::Failed));
        assert_eq!(control.get_outputs().bound_field, "Alpha, Beta");
    }

    #[tokio::test]
    async fn disabled_control_ignores_toggles() {
        let mut executor = MockRelationshipExecutor::new();
        executor.expect_execute().never();
        let (host, recorder) = services(query(), executor);
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx().with_disabled(true)).await.unwrap();

        let outcome = control.on_item_changed("1", true).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Ignored(IgnoreReason::Disabled));
        assert!(matches!(
            recorder.views.lock()[0],
            ViewModel::MultiSelect { disabled: true, .. }
        ));
    }

    #[tokio::test]
    async fn repeated_item_change_is_not_a_transition() {
        let mut executor = MockRelationshipExecutor::new();
        executor.expect_execute().never();
        let (host, _) = services(query(), executor);
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();

        let outcome = control.on_item_changed("2", true).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Ignored(IgnoreReason::NoTransition));
    }

    #[tokio::test]
    async fn toggle_before_load_is_ignored() {
        let (host, _) = services(MockRecordQuery::new(), MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());

        let outcome = control.handle_toggle(ToggleEvent::select("1")).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Ignored(IgnoreReason::NotLoaded));
    }

    #[tokio::test]
    async fn unknown_option_is_rejected() {
        let (host, _) = services(query(), MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();

        let err = control.handle_toggle(ToggleEvent::select("9")).await.unwrap_err();

        assert_eq!(err, ControlError::Sync(crate::error::SyncError::UnknownOption("9".into())));
    }

    #[tokio::test]
    async fn retrieval_failure_renders_empty_and_keeps_label() {
        let mut query = MockRecordQuery::new();
        let mut calls = 0;
        query.expect_retrieve_multiple().returning(move |_, _| {
            calls += 1;
            if calls <= 2 {
                Ok(EntityCollection::new(vec![json!({"contactid": "1", "fullname": "Alpha"})
                    .as_object()
                    .cloned()
                    .unwrap()]))
            } else {
                Err(HostError::Unavailable("offline".into()))
            }
        });
        let (host, recorder) = services(query, MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();
        assert_eq!(control.get_outputs().bound_field, "Alpha");

        let err = control.update_view(ctx()).await.unwrap_err();

        assert!(matches!(err, ControlError::Retrieval(RetrievalError::Host { .. })));
        assert_eq!(control.state(), ControlPhase::Failed);
        assert_eq!(control.get_outputs().bound_field, "Alpha");
        assert_eq!(recorder.views.lock().last(), Some(&ViewModel::Empty));
    }

    #[tokio::test]
    async fn snapshot_toggles_every_changed_option() {
        let mut executor = MockRelationshipExecutor::new();
        executor.expect_execute().times(2).returning(|_| Ok(()));
        let (host, _) = services(query(), executor);
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();

        let results = control.on_selection_changed(&["1".to_string()]).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Ok(ToggleOutcome::Applied(Completion::Confirmed)))));
        assert_eq!(control.selection(), Some(SelectionState::from_keys(["1"])));
        assert_eq!(control.get_outputs().bound_field, "Alpha");
    }

    #[tokio::test]
    async fn destroy_clears_view() {
        let (host, recorder) = services(query(), MockRelationshipExecutor::new());
        let control = AssociationControl::new(host, ControlOptions::default());
        control.init(ctx()).await.unwrap();

        control.destroy();

        assert_eq!(control.state(), ControlPhase::Uninitialized);
        assert_eq!(recorder.views.lock().last(), Some(&ViewModel::Empty));
        assert_eq!(control.selection(), None);
        assert_eq!(control.get_outputs().bound_field, "");
    }

    #[test]
    fn options_default_placeholder() {
        let options = ControlOptions::default();
        assert_eq!(options.placeholder, "---");
        assert_eq!(options.failure_policy, FailurePolicy::Rollback);
        assert_eq!(options.with_placeholder("Pick").placeholder, "Pick");
    }
}
