//! Account/contact fixtures
//!
//! One account (`a-1`) and two contacts, `1` "Alpha" and `2` "Beta", with
//! the account associated to Beta through `accountcontact`.

use crate::InMemoryHost;
use nnlink_model::{
    ControlParameters, EntityMetadata, EntityReference, ManyToManyRelationship, RecordContext,
};
use serde_json::json;

pub const PRIMARY_ID: &str = "a-1";
pub const RELATIONSHIP: &str = "accountcontact_association";
pub const INTERSECT: &str = "accountcontact";

pub fn primary() -> EntityReference {
    EntityReference::new("account", PRIMARY_ID)
}

pub fn contact(id: &str) -> EntityReference {
    EntityReference::new("contact", id)
}

pub fn relationship() -> ManyToManyRelationship {
    ManyToManyRelationship::new(RELATIONSHIP, INTERSECT)
        .between("account", "contact")
        .with_navigation("account_contacts", "contact_accounts")
}

pub fn account_metadata() -> EntityMetadata {
    EntityMetadata::new("account")
        .with_primary_name("name")
        .with_relationship(relationship())
}

pub fn contact_metadata() -> EntityMetadata {
    EntityMetadata::new("contact")
        .with_primary_name("fullname")
        .with_relationship(relationship())
}

/// Host with metadata, both contacts, and the Beta association
pub fn account_contact_host() -> InMemoryHost {
    InMemoryHost::new()
        .with_metadata(account_metadata())
        .with_metadata(contact_metadata())
        .with_record("account", json!({"accountid": PRIMARY_ID, "name": "Contoso"}))
        .with_record("contact", json!({"contactid": "2", "fullname": "Beta"}))
        .with_record("contact", json!({"contactid": "1", "fullname": "Alpha"}))
        .with_association(INTERSECT, primary(), contact("2"))
}

/// Minimal parameters; display attribute and intersect come from metadata
pub fn params() -> ControlParameters {
    ControlParameters::new()
        .with_target_entity("contact")
        .with_relationship(RELATIONSHIP)
}

pub fn context() -> RecordContext {
    RecordContext::new("account", PRIMARY_ID).with_parameters(params())
}

/// Context of a record that has not been saved yet
pub fn unsaved_context() -> RecordContext {
    RecordContext::new("account", "").with_parameters(params())
}
