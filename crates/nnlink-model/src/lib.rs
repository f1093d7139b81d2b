//! NN Link Model
//!
//! Plain data types shared by the association engine and its hosts:
//! - **EntityReference**: one record, by entity type and id
//! - **SelectOption / SelectionState**: the selectable universe and the associated subset
//! - **RelationshipConfig**: the per-activation setting, filled in by resolution
//! - **EntityMetadata**: host metadata with many-to-many relationship descriptors
//! - **AssociationRequest**: the generic associate/disassociate operation
//!
//! Nothing in this crate performs I/O.
//!
//! # Example
//!
//! ```rust
//! use nnlink_model::{SelectOption, SelectionState};
//!
//! let universe = vec![SelectOption::new("1", "Alpha"), SelectOption::new("2", "Beta")];
//! let mut selection = SelectionState::from_keys(["2"]);
//! selection.insert("1");
//!
//! assert!(selection.contains("1"));
//! assert_eq!(universe.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod metadata;
pub mod option;
pub mod record;
pub mod reference;
pub mod request;

// Re-exports for convenience
pub use config::{ControlParameters, RecordContext, RelationshipConfig};
pub use error::ModelError;
pub use metadata::{EntityMetadata, ManyToManyRelationship};
pub use option::{SelectOption, SelectionState};
pub use record::{read_string, EntityCollection, Record};
pub use reference::EntityReference;
pub use request::{AssociationRequest, OperationKind, RequestMetadata};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the association model
    pub use crate::{
        AssociationRequest, ControlParameters, EntityCollection, EntityMetadata, EntityReference,
        ManyToManyRelationship, OperationKind, RecordContext, RelationshipConfig, SelectOption,
        SelectionState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
