//! Scenario files
//!
//! A scenario describes a host (metadata, records, associations, injected
//! failures) and a sequence of steps driven against one control. YAML and
//! JSON are both accepted; the format follows the file extension.

use nnlink_core::{ControlPhase, FailurePolicy, HostError};
use nnlink_model::{ControlParameters, EntityMetadata, EntityReference, OperationKind, RecordContext};
use nnlink_test_utils::{FailureTarget, InMemoryHost};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Errors loading a scenario
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Scenario path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error
    #[error("invalid YAML scenario: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON scenario: {0}")]
    Json(#[from] serde_json::Error),

    /// Parsed but unusable
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// The primary record a scenario runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Primary entity logical name
    pub entity: String,
    /// Record id; absent or empty for an unsaved record
    #[serde(default)]
    pub id: Option<String>,
    /// Read-only control
    #[serde(default)]
    pub disabled: bool,
}

/// Seeded association row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioAssociation {
    /// Intersect entity holding the row
    pub intersect: String,
    /// One side
    pub left: EntityReference,
    /// Other side
    pub right: EntityReference,
}

/// Canned rows for a custom filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerbatimResult {
    /// Exact expression text
    pub expression: String,
    /// Rows returned
    pub rows: Vec<Value>,
}

/// Injected host failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFailure {
    /// Operation that fails
    pub target: FailureTarget,
    /// Host message
    #[serde(default = "default_failure_message")]
    pub message: String,
    /// Fail only the first matching call
    #[serde(default = "default_once")]
    pub once: bool,
}

fn default_failure_message() -> String {
    "injected failure".to_string()
}

fn default_once() -> bool {
    true
}

impl ScenarioFailure {
    /// Host error this failure produces
    #[must_use]
    pub fn error(&self) -> HostError {
        match self.target {
            FailureTarget::Associate => HostError::OperationRejected {
                kind: OperationKind::Associate,
                message: self.message.clone(),
            },
            FailureTarget::Disassociate => HostError::OperationRejected {
                kind: OperationKind::Disassociate,
                message: self.message.clone(),
            },
            FailureTarget::Metadata(_) | FailureTarget::Retrieve(_) => HostError::Unavailable(self.message.clone()),
        }
    }
}

/// One scripted interaction or assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Run the refresh pipeline
    Refresh,
    /// Tear the control down
    Destroy,
    /// Widget reports one item changed
    Toggle {
        /// Option key
        key: String,
        /// New flag
        selected: bool,
    },
    /// Widget reports its whole selection
    SelectSnapshot {
        /// Selected keys
        keys: Vec<String>,
    },
    /// Inject a failure mid-run
    Fail {
        /// Failure to inject
        failure: ScenarioFailure,
    },
    /// Mirrored label must equal
    ExpectLabel {
        /// Expected label
        label: String,
    },
    /// Control phase must equal
    ExpectPhase {
        /// Expected phase
        phase: ControlPhase,
    },
    /// Selection must equal, in any order
    ExpectSelection {
        /// Expected keys
        keys: Vec<String>,
    },
}

impl Step {
    /// Whether this step only asserts
    #[must_use]
    pub fn is_expectation(&self) -> bool {
        matches!(
            self,
            Self::ExpectLabel { .. } | Self::ExpectPhase { .. } | Self::ExpectSelection { .. }
        )
    }
}

/// A complete scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name
    pub name: String,
    /// Primary record
    pub record: ScenarioRecord,
    /// Control parameters, keyed as the host delivers them
    #[serde(default)]
    pub parameters: ControlParameters,
    /// Failure handling; the command line may override it
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Entity metadata, in host payload form
    #[serde(default)]
    pub metadata: Vec<EntityMetadata>,
    /// Rows per entity
    #[serde(default)]
    pub records: BTreeMap<String, Vec<Value>>,
    /// Seeded association rows
    #[serde(default)]
    pub associations: Vec<ScenarioAssociation>,
    /// Canned results for custom filters
    #[serde(default)]
    pub verbatim: Vec<VerbatimResult>,
    /// Failures armed before the first step
    #[serde(default)]
    pub failures: Vec<ScenarioFailure>,
    /// Steps, in order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load and validate a scenario file
    ///
    /// # Errors
    /// - `ScenarioError::Io` if the file cannot be read
    /// - `ScenarioError::Yaml` / `ScenarioError::Json` on parse errors
    /// - `ScenarioError::Invalid` if validation fails
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let scenario = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_yaml(&text)?
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse YAML text
    ///
    /// # Errors
    /// `ScenarioError::Yaml` on parse errors
    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse JSON text
    ///
    /// # Errors
    /// `ScenarioError::Json` on parse errors
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Structural checks beyond parsing
    ///
    /// # Errors
    /// `ScenarioError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.record.entity.trim().is_empty() {
            return Err(ScenarioError::Invalid("record.entity is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::Invalid("no steps".into()));
        }
        if !self.steps.iter().any(|s| matches!(s, Step::Refresh)) {
            return Err(ScenarioError::Invalid("no refresh step".into()));
        }
        if let Some((entity, _)) = self
            .records
            .iter()
            .find(|(_, rows)| rows.iter().any(|r| !r.is_object()))
        {
            return Err(ScenarioError::Invalid(format!("records of '{entity}' must be objects")));
        }
        Ok(())
    }

    /// Refresh context for the scenario's record
    #[must_use]
    pub fn context(&self) -> RecordContext {
        RecordContext::new(&self.record.entity, self.record.id.clone().unwrap_or_default())
            .with_parameters(self.parameters.clone())
            .with_disabled(self.record.disabled)
    }

    /// Host seeded with everything but the step failures
    #[must_use]
    pub fn build_host(&self) -> InMemoryHost {
        let mut host = InMemoryHost::new();
        for metadata in &self.metadata {
            host = host.with_metadata(metadata.clone());
        }
        for (entity, rows) in &self.records {
            host = host.with_entity(entity);
            for row in rows {
                host = host.with_record(entity, row.clone());
            }
        }
        for association in &self.associations {
            host = host.with_association(&association.intersect, association.left.clone(), association.right.clone());
        }
        for canned in &self.verbatim {
            host = host.with_verbatim_result(&canned.expression, canned.rows.clone());
        }
        for failure in &self.failures {
            arm(&host, failure);
        }
        host
    }
}

/// Inject a scenario failure into a host
pub fn arm(host: &InMemoryHost, failure: &ScenarioFailure) {
    if failure.once {
        host.fail_once(failure.target.clone(), failure.error());
    } else {
        host.fail_always(failure.target.clone(), failure.error());
    }
}
