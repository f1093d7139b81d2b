//! NN Link Simulator
//!
//! Runs scripted scenarios against an association control wired to the
//! in-memory host:
//! - [`Scenario`]: host seed data plus steps, loaded from YAML or JSON
//! - [`run_scenario`]: executes the steps and produces a [`SimReport`]

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, SimReport, StepReport};
pub use scenario::{Scenario, ScenarioError, ScenarioFailure, Step};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
