//! Scenario execution
//!
//! Drives one [`AssociationControl`] wired to an [`InMemoryHost`] through
//! the scenario steps and records what happened after each.

use crate::scenario::{arm, Scenario, Step};
use nnlink_core::{AssociationControl, ControlOptions, ControlPhase, FailurePolicy, ToggleOutcome};
use nnlink_model::SelectionState;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Position in the scenario, starting at 1
    pub index: usize,
    /// Step kind
    pub step: String,
    /// What the control reported
    pub outcome: String,
    /// Mirrored label after the step
    pub label: String,
    /// False only for a failed expectation
    pub passed: bool,
}

/// Result of a scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimReport {
    /// Scenario name
    pub scenario: String,
    /// Effective failure policy
    pub policy: FailurePolicy,
    /// Per-step results
    pub steps: Vec<StepReport>,
    /// Final mirrored label
    pub final_label: String,
    /// Final phase
    pub final_phase: ControlPhase,
    /// Relationship requests the host received
    pub requests: usize,
    /// Renders the host received
    pub renders: usize,
}

impl SimReport {
    /// Whether every expectation held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed)
    }

    /// Failed expectations
    #[must_use]
    pub fn failures(&self) -> Vec<&StepReport> {
        self.steps.iter().filter(|s| !s.passed).collect()
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Scenario: {}", self.scenario);
        let _ = writeln!(out, "Policy: {:?}", self.policy);
        let _ = writeln!(out);
        for step in &self.steps {
            let mark = if step.passed { "ok" } else { "FAIL" };
            let _ = writeln!(
                out,
                "  [{mark:>4}] {:>2}. {:<16} {} | label: {:?}",
                step.index, step.step, step.outcome, step.label
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Final phase: {:?}", self.final_phase);
        let _ = writeln!(out, "Final label: {:?}", self.final_label);
        let _ = writeln!(out, "Requests: {}", self.requests);
        let _ = writeln!(out, "Renders: {}", self.renders);
        let _ = writeln!(out, "Status: {}", if self.passed() { "PASSED" } else { "FAILED" });
        out
    }
}

/// Run a scenario to completion
///
/// Control errors are reported as step outcomes; only expectations fail a run.
pub async fn run_scenario(scenario: &Scenario, policy: Option<FailurePolicy>) -> SimReport {
    let policy = policy.unwrap_or(scenario.policy);
    let host = Arc::new(scenario.build_host());
    let control = AssociationControl::new(
        host.services(),
        ControlOptions::new().with_failure_policy(policy),
    );

    tracing::info!(scenario = %scenario.name, ?policy, steps = scenario.steps.len(), "running scenario");

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (i, step) in scenario.steps.iter().enumerate() {
        let (outcome, passed) = match step {
            Step::Refresh => (
                match control.refresh(scenario.context()).await {
                    Ok(outcome) => format!("{outcome:?}"),
                    Err(e) => format!("error: {e}"),
                },
                true,
            ),
            Step::Destroy => {
                control.destroy();
                ("destroyed".to_string(), true)
            }
            Step::Toggle { key, selected } => (
                describe_toggle(control.on_item_changed(key, *selected).await),
                true,
            ),
            Step::SelectSnapshot { keys } => {
                let results = control.on_selection_changed(keys).await;
                let parts: Vec<String> = results.into_iter().map(describe_toggle).collect();
                (format!("[{}]", parts.join(", ")), true)
            }
            Step::Fail { failure } => {
                arm(&host, failure);
                (format!("armed {:?}", failure.target), true)
            }
            Step::ExpectLabel { label } => {
                let actual = control.get_outputs().bound_field;
                expectation(&actual == label, format!("expected label {label:?}, got {actual:?}"))
            }
            Step::ExpectPhase { phase } => {
                let actual = control.state();
                expectation(actual == *phase, format!("expected phase {phase:?}, got {actual:?}"))
            }
            Step::ExpectSelection { keys } => {
                let expected: SelectionState = keys.iter().map(String::as_str).collect();
                let actual = control.selection().unwrap_or_default();
                expectation(
                    actual == expected,
                    format!("expected selection {:?}, got {:?}", expected.iter().collect::<Vec<_>>(), actual.iter().collect::<Vec<_>>()),
                )
            }
        };

        if !passed {
            tracing::warn!(step = i + 1, %outcome, "expectation failed");
        }
        steps.push(StepReport {
            index: i + 1,
            step: step_name(step).to_string(),
            outcome,
            label: control.get_outputs().bound_field,
            passed,
        });
    }

    SimReport {
        scenario: scenario.name.clone(),
        policy,
        steps,
        final_label: control.get_outputs().bound_field,
        final_phase: control.state(),
        requests: host.requests().len(),
        renders: host.views().len(),
    }
}

fn expectation(held: bool, message: String) -> (String, bool) {
    if held {
        ("held".to_string(), true)
    } else {
        (message, false)
    }
}

fn describe_toggle(result: Result<ToggleOutcome, nnlink_core::ControlError>) -> String {
    match result {
        Ok(ToggleOutcome::Applied(completion)) => format!("{completion:?}"),
        Ok(ToggleOutcome::Ignored(reason)) => format!("ignored ({reason:?})"),
        Err(e) => format!("error: {e}"),
    }
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::Refresh => "refresh",
        Step::Destroy => "destroy",
        Step::Toggle { .. } => "toggle",
        Step::SelectSnapshot { .. } => "select_snapshot",
        Step::Fail { .. } => "fail",
        Step::ExpectLabel { .. } => "expect_label",
        Step::ExpectPhase { .. } => "expect_phase",
        Step::ExpectSelection { .. } => "expect_selection",
    }
}
