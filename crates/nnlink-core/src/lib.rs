//! NN Link Core - many-to-many association control engine
//!
//! Lets a user pick which target records are associated with one primary
//! record through an N:N relationship:
//! - Resolves the display attribute and intersect entity from host metadata
//! - Retrieves the selectable universe and the current selection
//! - Synthesizes the mirrored label bound to the host field
//! - Translates toggles into associate/disassociate operations
//! - Guards refreshes with a generation counter so stale results never render
//!
//! The host is reached only through the traits in [`host`].
//!
//! # Example
//!
//! ```rust,ignore
//! use nnlink_core::{AssociationControl, ControlOptions, HostServices};
//! use nnlink_model::{ControlParameters, RecordContext};
//!
//! # async fn example(host: HostServices) -> Result<(), Box<dyn std::error::Error>> {
//! let control = AssociationControl::new(host, ControlOptions::default());
//!
//! let ctx = RecordContext::new("account", "a-1").with_parameters(
//!     ControlParameters::new()
//!         .with_target_entity("contact")
//!         .with_relationship("contact_account"),
//! );
//! control.init(ctx).await?;
//! control.toggle("c-1", true).await?;
//!
//! println!("bound field: {}", control.get_outputs().bound_field);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

// Core modules
pub mod control;
pub mod error;
pub mod host;
pub mod label;
pub mod query;
pub mod repository;
pub mod resolver;
pub mod sync;
pub mod telemetry;
pub mod widget;

// Re-exports for convenience
pub use control::{
    AssociationControl, ControlOptions, ControlPhase, IgnoreReason, RefreshOutcome, ToggleOutcome,
};
pub use error::{ControlError, HostError, QueryError, RetrievalError, SyncError};
pub use host::{
    ControlOutputs, HostServices, MetadataSource, MultiSelectView, OutputSink, RecordQuery,
    RelationshipExecutor,
};
pub use label::{labels_for_options, LABEL_SEPARATOR};
pub use query::{Condition, ConditionOperator, FetchExpression, FetchQuery};
pub use repository::OptionRepository;
pub use resolver::{
    DisplayAttribute, IntersectResolution, MatchedBy, MetadataSide, RelationshipMatch,
    RelationshipMatcher, RelationshipResolver, ResolutionReport,
};
pub use sync::{Completion, FailurePolicy, PendingToggle, SelectionSynchronizer, SyncStatus};
pub use telemetry::{init_tracing, Diagnostics};
pub use widget::{MultiSelectAdapter, ToggleEvent, ViewModel, ViewOption};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding an association control
    pub use crate::{
        AssociationControl, ControlError, ControlOptions, ControlOutputs, ControlPhase,
        FailurePolicy, HostError, HostServices, MetadataSource, MultiSelectView, OutputSink,
        RecordQuery, RefreshOutcome, RelationshipExecutor, ToggleEvent, ToggleOutcome, ViewModel,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
