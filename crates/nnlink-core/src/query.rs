//! Structured fetch expressions
//!
//! Filters are typed attribute/operator/value triples. Identifiers are
//! validated as logical names and values are escaped when the expression is
//! written, so configuration values never splice raw text into a query.
//!
//! The custom universe filter is the one exception: it is host-authored
//! configuration and passes through verbatim.

use crate::error::QueryError;
use nnlink_model::RelationshipConfig;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Attribute is null
    Null,
    /// Attribute is not null
    NotNull,
}

impl ConditionOperator {
    /// Operator token in the fetch expression
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Null => "null",
            Self::NotNull => "not-null",
        }
    }

    /// Whether the operator compares against a value
    #[inline]
    #[must_use]
    pub fn takes_value(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

/// One filter condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Attribute logical name
    pub attribute: String,
    /// Operator
    pub operator: ConditionOperator,
    /// Compared value, for operators that take one
    pub value: Option<String>,
}

impl Condition {
    /// `attribute eq value`
    ///
    /// # Errors
    /// `QueryError::InvalidIdentifier` if `attribute` is not a logical name
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Result<Self, QueryError> {
        Self::new(attribute, ConditionOperator::Eq, Some(value.into()))
    }

    /// `attribute ne value`
    ///
    /// # Errors
    /// `QueryError::InvalidIdentifier` if `attribute` is not a logical name
    pub fn ne(attribute: impl Into<String>, value: impl Into<String>) -> Result<Self, QueryError> {
        Self::new(attribute, ConditionOperator::Ne, Some(value.into()))
    }

    /// `attribute null`
    ///
    /// # Errors
    /// `QueryError::InvalidIdentifier` if `attribute` is not a logical name
    pub fn null(attribute: impl Into<String>) -> Result<Self, QueryError> {
        Self::new(attribute, ConditionOperator::Null, None)
    }

    /// `attribute not-null`
    ///
    /// # Errors
    /// `QueryError::InvalidIdentifier` if `attribute` is not a logical name
    pub fn not_null(attribute: impl Into<String>) -> Result<Self, QueryError> {
        Self::new(attribute, ConditionOperator::NotNull, None)
    }

    fn new(
        attribute: impl Into<String>,
        operator: ConditionOperator,
        value: Option<String>,
    ) -> Result<Self, QueryError> {
        let attribute = attribute.into();
        validate_identifier(&attribute)?;
        Ok(Self {
            attribute,
            operator,
            value: if operator.takes_value() { value } else { None },
        })
    }

    /// Whether a row value satisfies this condition
    #[must_use]
    pub fn matches(&self, actual: Option<&str>) -> bool {
        match self.operator {
            ConditionOperator::Eq => actual.is_some() && actual == self.value.as_deref(),
            ConditionOperator::Ne => actual != self.value.as_deref(),
            ConditionOperator::Null => actual.is_none(),
            ConditionOperator::NotNull => actual.is_some(),
        }
    }
}

/// Retrieval of one entity with an `and` filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchQuery {
    /// Entity logical name
    pub entity: String,
    /// Conditions, all of which must hold
    pub conditions: Vec<Condition>,
}

impl FetchQuery {
    /// Unfiltered query over `entity`
    ///
    /// # Errors
    /// `QueryError::InvalidIdentifier` if `entity` is not a logical name
    pub fn new(entity: impl Into<String>) -> Result<Self, QueryError> {
        let entity = entity.into();
        validate_identifier(&entity)?;
        Ok(Self {
            entity,
            conditions: Vec::new(),
        })
    }

    /// Add condition
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    fn write(&self) -> Result<String, QueryError> {
        let mut writer = Writer::new(Vec::new());

        writer
            .write_event(Event::Start(BytesStart::new("fetch")))
            .map_err(render_error)?;

        let mut entity = BytesStart::new("entity");
        entity.push_attribute(("name", self.entity.as_str()));

        if self.conditions.is_empty() {
            writer.write_event(Event::Empty(entity)).map_err(render_error)?;
        } else {
            writer.write_event(Event::Start(entity)).map_err(render_error)?;
            writer
                .write_event(Event::Start(BytesStart::new("filter")))
                .map_err(render_error)?;
            for condition in &self.conditions {
                let mut element = BytesStart::new("condition");
                element.push_attribute(("attribute", condition.attribute.as_str()));
                element.push_attribute(("operator", condition.operator.as_str()));
                if let Some(value) = &condition.value {
                    element.push_attribute(("value", value.as_str()));
                }
                writer.write_event(Event::Empty(element)).map_err(render_error)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("filter")))
                .map_err(render_error)?;
            writer
                .write_event(Event::End(BytesEnd::new("entity")))
                .map_err(render_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("fetch")))
            .map_err(render_error)?;

        String::from_utf8(writer.into_inner()).map_err(render_error)
    }
}

fn render_error(e: impl fmt::Display) -> QueryError {
    QueryError::Render(e.to_string())
}

/// Query handed to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchExpression {
    /// Built from typed conditions
    Structured(FetchQuery),
    /// Host-authored expression passed through unchanged
    Verbatim(String),
}

impl FetchExpression {
    /// Structured query, when this is one
    #[inline]
    #[must_use]
    pub fn as_structured(&self) -> Option<&FetchQuery> {
        match self {
            Self::Structured(query) => Some(query),
            Self::Verbatim(_) => None,
        }
    }

    /// Text form for hosts that execute fetch expressions as strings
    ///
    /// # Errors
    /// `QueryError::Render` if the writer fails
    pub fn to_fetch_xml(&self) -> Result<String, QueryError> {
        match self {
            Self::Structured(query) => query.write(),
            Self::Verbatim(text) => Ok(text.clone()),
        }
    }
}

impl fmt::Display for FetchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_fetch_xml() {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<unrenderable: {e}>"),
        }
    }
}

/// Query for every selectable target record
///
/// The configured custom filter wins when present.
///
/// # Errors
/// `QueryError::InvalidIdentifier` if the target entity is not a logical name
pub fn universe_query(config: &RelationshipConfig) -> Result<FetchExpression, QueryError> {
    if let Some(custom) = &config.target_entity_filter {
        return Ok(FetchExpression::Verbatim(custom.clone()));
    }
    Ok(FetchExpression::Structured(FetchQuery::new(
        &config.target_entity_name,
    )?))
}

/// Query for the intersect rows of the primary record
///
/// # Errors
/// - `QueryError::UnresolvedIntersectEntity` if resolution found no intersect entity
/// - `QueryError::InvalidIdentifier` for malformed entity names
pub fn selected_query(config: &RelationshipConfig) -> Result<FetchExpression, QueryError> {
    let intersect = config.relationship_entity_name.as_deref().ok_or_else(|| {
        QueryError::UnresolvedIntersectEntity {
            relationship: config.relationship_name.clone().unwrap_or_default(),
        }
    })?;

    let query = FetchQuery::new(intersect)?.filter(Condition::eq(
        config.primary_id_attribute(),
        &config.primary_entity_id,
    )?);
    Ok(FetchExpression::Structured(query))
}

/// Check that `name` is a logical name: non-empty ASCII alphanumerics and `_`
///
/// # Errors
/// `QueryError::InvalidIdentifier` otherwise
pub fn validate_identifier(name: &str) -> Result<(), QueryError> {
    let valid = !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnlink_model::{ControlParameters, RecordContext};

    fn config(params: ControlParameters) -> RelationshipConfig {
        let ctx = RecordContext::new("account", "a-1").with_parameters(params.with_target_entity("contact"));
        RelationshipConfig::from_context(&ctx).unwrap()
    }

    #[test]
    fn universe_query_unfiltered() {
        let expr = universe_query(&config(ControlParameters::new())).unwrap();
        assert_eq!(
            expr.to_fetch_xml().unwrap(),
            r#"<fetch><entity name="contact"/></fetch>"#
        );
    }

    #[test]
    fn universe_query_uses_custom_filter_verbatim() {
        let custom = r#"<fetch><entity name="contact"><filter><condition attribute="statecode" operator="eq" value="0" /></filter></entity></fetch>"#;
        let expr = universe_query(&config(ControlParameters::new().with_target_filter(custom))).unwrap();
        assert_eq!(expr, FetchExpression::Verbatim(custom.to_string()));
        assert_eq!(expr.to_fetch_xml().unwrap(), custom);
    }

    #[test]
    fn selected_query_filters_on_primary_id() {
        let expr = selected_query(&config(
            ControlParameters::new().with_relationship_entity("accountcontact"),
        ))
        .unwrap();

        let query = expr.as_structured().unwrap();
        assert_eq!(query.entity, "accountcontact");
        assert_eq!(query.conditions, vec![Condition::eq("accountid", "a-1").unwrap()]);

        let xml = expr.to_fetch_xml().unwrap();
        assert!(xml.contains(r#"<entity name="accountcontact">"#));
        assert!(xml.contains(r#"attribute="accountid""#));
        assert!(xml.contains(r#"operator="eq""#));
        assert!(xml.contains(r#"value="a-1""#));
    }

    #[test]
    fn selected_query_requires_intersect() {
        let err = selected_query(&config(ControlParameters::new().with_relationship("rel"))).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnresolvedIntersectEntity {
                relationship: "rel".into()
            }
        );
    }

    #[test]
    fn values_are_escaped() {
        let query = FetchQuery::new("contact")
            .unwrap()
            .filter(Condition::eq("fullname", r#"a" or "1"="1 <x>"#).unwrap());
        let xml = FetchExpression::Structured(query).to_fetch_xml().unwrap();

        assert!(xml.contains("&quot;"));
        assert!(xml.contains("&lt;x&gt;"));
        assert!(!xml.contains(r#"a" or"#));
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(FetchQuery::new("new_contact2").is_ok());
        assert!(matches!(
            FetchQuery::new(r#"contact" /><entity name="x"#),
            Err(QueryError::InvalidIdentifier(_))
        ));
        assert!(FetchQuery::new("").is_err());
        assert!(Condition::eq("bad attr", "v").is_err());
    }

    #[test]
    fn null_operators_drop_value() {
        let cond = Condition::null("parentid").unwrap();
        assert_eq!(cond.value, None);
        assert!(cond.matches(None));
        assert!(!cond.matches(Some("x")));
        assert!(Condition::not_null("parentid").unwrap().matches(Some("x")));
    }

    #[test]
    fn eq_and_ne_matching() {
        let eq = Condition::eq("a", "1").unwrap();
        assert!(eq.matches(Some("1")));
        assert!(!eq.matches(Some("2")));
        assert!(!eq.matches(None));

        let ne = Condition::ne("a", "1").unwrap();
        assert!(ne.matches(Some("2")));
        assert!(ne.matches(None));
        assert!(!ne.matches(Some("1")));
    }
}
