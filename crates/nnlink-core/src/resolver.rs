//! Relationship resolution
//!
//! Fills in the parts of a [`RelationshipConfig`] the host left out:
//! - the target entity's display attribute
//! - the intersect entity behind the configured relationship name
//!
//! The relationship name may be a schema name, either side's navigation
//! property, or a navigation property that was mistaken for a schema name.
//! Each interpretation is a [`RelationshipMatcher`] tier, tried in order,
//! each tier searching primary metadata before target metadata.
//!
//! Nothing here is fatal. Lookup failures and misses are logged and reported
//! through [`ResolutionReport`]; retrieval decides what a miss means.

use crate::host::MetadataSource;
use crate::telemetry::Diagnostics;
use nnlink_model::{EntityMetadata, ManyToManyRelationship, RelationshipConfig};
use std::fmt;

/// One interpretation of the configured relationship name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipMatcher {
    /// Schema name or either navigation property, case-insensitive
    Direct(String),
    /// Schema name only, after stripping a trailing `_<primary entity>`
    SuffixStripped(String),
}

impl RelationshipMatcher {
    /// Ordered tiers for a relationship name
    #[must_use]
    pub fn tiers(relationship_name: &str, primary_entity_name: &str) -> Vec<Self> {
        let mut tiers = vec![Self::Direct(relationship_name.to_string())];

        let suffix = format!("_{primary_entity_name}").to_ascii_lowercase();
        let lower = relationship_name.to_ascii_lowercase();
        if lower.ends_with(&suffix) {
            let stripped = &relationship_name[..relationship_name.len() - suffix.len()];
            if !stripped.is_empty() {
                tiers.push(Self::SuffixStripped(stripped.to_string()));
            }
        }

        tiers
    }

    /// First descriptor this tier accepts, in list order
    #[must_use]
    pub fn find<'a>(
        &self,
        descriptors: &'a [ManyToManyRelationship],
    ) -> Option<(&'a ManyToManyRelationship, MatchedBy)> {
        descriptors
            .iter()
            .find_map(|d| self.match_descriptor(d).map(|by| (d, by)))
    }

    fn match_descriptor(&self, descriptor: &ManyToManyRelationship) -> Option<MatchedBy> {
        let same = |field: &Option<String>, name: &str| {
            field.as_deref().is_some_and(|f| f.eq_ignore_ascii_case(name))
        };

        match self {
            Self::Direct(name) => {
                if same(&descriptor.schema_name, name) {
                    Some(MatchedBy::SchemaName)
                } else if same(&descriptor.entity1_navigation_property_name, name) {
                    Some(MatchedBy::Entity1NavigationProperty)
                } else if same(&descriptor.entity2_navigation_property_name, name) {
                    Some(MatchedBy::Entity2NavigationProperty)
                } else {
                    None
                }
            }
            Self::SuffixStripped(name) => {
                same(&descriptor.schema_name, name).then_some(MatchedBy::SchemaName)
            }
        }
    }
}

impl fmt::Display for RelationshipMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(name) => write!(f, "direct '{name}'"),
            Self::SuffixStripped(name) => write!(f, "suffix-stripped '{name}'"),
        }
    }
}

/// Descriptor field that matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    /// `SchemaName`
    SchemaName,
    /// `Entity1NavigationPropertyName`
    Entity1NavigationProperty,
    /// `Entity2NavigationPropertyName`
    Entity2NavigationProperty,
}

/// Whose metadata held the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSide {
    /// Primary entity metadata
    Primary,
    /// Target entity metadata
    Target,
}

/// A matched descriptor and how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipMatch {
    /// Matched descriptor
    pub descriptor: ManyToManyRelationship,
    /// Field that matched
    pub matched_by: MatchedBy,
    /// Tier that matched
    pub matcher: RelationshipMatcher,
    /// Metadata the descriptor came from
    pub side: MetadataSide,
}

/// How the display attribute was determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayAttribute {
    /// Supplied by configuration
    Configured,
    /// Taken from target metadata
    FromMetadata,
    /// Lookup failed or metadata names none
    Unresolved,
}

/// How the intersect entity was determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntersectResolution {
    /// Supplied by configuration
    Configured,
    /// No relationship configured; nothing to resolve
    NoRelationship,
    /// Found through metadata
    Matched(RelationshipMatch),
    /// No usable descriptor; carries a match that lacked an intersect entity
    Unresolved(Option<RelationshipMatch>),
}

/// Outcome of one resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Display attribute outcome
    pub display_attribute: DisplayAttribute,
    /// Intersect entity outcome
    pub intersect: IntersectResolution,
}

impl ResolutionReport {
    /// Whether an intersect entity is available after resolution
    #[must_use]
    pub fn has_intersect(&self) -> bool {
        matches!(
            self.intersect,
            IntersectResolution::Configured | IntersectResolution::Matched(_)
        )
    }
}

/// Metadata fetched during one resolution
///
/// Each entity is fetched at most once per resolution; nothing outlives it.
#[derive(Default)]
struct FetchedMetadata {
    primary: Option<Option<EntityMetadata>>,
    target: Option<Option<EntityMetadata>>,
}

/// Resolves display attribute and intersect entity from host metadata
pub struct RelationshipResolver<'a> {
    metadata: &'a dyn MetadataSource,
    diagnostics: Diagnostics,
}

impl<'a> RelationshipResolver<'a> {
    /// Create resolver over a metadata source
    #[inline]
    #[must_use]
    pub fn new(metadata: &'a dyn MetadataSource, diagnostics: Diagnostics) -> Self {
        Self {
            metadata,
            diagnostics,
        }
    }

    /// Fill in the missing parts of `config`
    ///
    /// Runs once per activation, before any retrieval.
    pub async fn resolve(&self, config: &mut RelationshipConfig) -> ResolutionReport {
        let mut fetched = FetchedMetadata::default();

        let display_attribute = if config.primary_field_name.is_some() {
            DisplayAttribute::Configured
        } else {
            let target = self.target_metadata(config, &mut fetched).await;
            match target.and_then(|m| m.primary_name_attribute.clone()) {
                Some(attribute) => {
                    config.primary_field_name = Some(attribute);
                    DisplayAttribute::FromMetadata
                }
                None => DisplayAttribute::Unresolved,
            }
        };

        let intersect = if config.relationship_entity_name.is_some() {
            IntersectResolution::Configured
        } else if let Some(name) = config.relationship_name.clone() {
            self.resolve_intersect(config, &name, &mut fetched).await
        } else {
            IntersectResolution::NoRelationship
        };

        if let IntersectResolution::Unresolved(_) = &intersect {
            tracing::warn!(
                relationship = config.relationship_name.as_deref().unwrap_or_default(),
                primary = %config.primary_entity_name,
                target = %config.target_entity_name,
                "could not resolve intersect entity from metadata; consider setting 'relationshipentityname' explicitly"
            );
        }

        ResolutionReport {
            display_attribute,
            intersect,
        }
    }

    async fn resolve_intersect(
        &self,
        config: &mut RelationshipConfig,
        relationship_name: &str,
        fetched: &mut FetchedMetadata,
    ) -> IntersectResolution {
        let primary = self.primary_metadata(config, fetched).await.cloned();
        let target = self.target_metadata(config, fetched).await.cloned();

        let sides = [
            (MetadataSide::Primary, primary.as_ref()),
            (MetadataSide::Target, target.as_ref()),
        ];

        let found = RelationshipMatcher::tiers(relationship_name, &config.primary_entity_name)
            .into_iter()
            .find_map(|matcher| {
                sides.iter().find_map(|(side, meta)| {
                    let descriptors = meta.map(|m| m.many_to_many_relationships.as_slice())?;
                    matcher.find(descriptors).map(|(descriptor, matched_by)| RelationshipMatch {
                        descriptor: descriptor.clone(),
                        matched_by,
                        matcher: matcher.clone(),
                        side: *side,
                    })
                })
            });

        match found {
            Some(found) => match found.descriptor.intersect_entity_name.clone() {
                Some(intersect) => {
                    self.diagnostics.log("Relationship matched", &found);
                    config.relationship_entity_name = Some(intersect);
                    IntersectResolution::Matched(found)
                }
                None => IntersectResolution::Unresolved(Some(found)),
            },
            None => IntersectResolution::Unresolved(None),
        }
    }

    async fn primary_metadata<'f>(
        &self,
        config: &RelationshipConfig,
        fetched: &'f mut FetchedMetadata,
    ) -> Option<&'f EntityMetadata> {
        if fetched.primary.is_none() {
            fetched.primary = Some(self.lookup(&config.primary_entity_name).await);
        }
        fetched.primary.as_ref().and_then(Option::as_ref)
    }

    async fn target_metadata<'f>(
        &self,
        config: &RelationshipConfig,
        fetched: &'f mut FetchedMetadata,
    ) -> Option<&'f EntityMetadata> {
        if fetched.target.is_none() {
            fetched.target = Some(self.lookup(&config.target_entity_name).await);
        }
        fetched.target.as_ref().and_then(Option::as_ref)
    }

    async fn lookup(&self, entity: &str) -> Option<EntityMetadata> {
        match self.metadata.entity_metadata(entity).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(entity, error = %e, "metadata lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::MockMetadataSource;
    use nnlink_model::{ControlParameters, RecordContext};
    use proptest::prelude::*;

    fn config(params: ControlParameters) -> RelationshipConfig {
        let ctx = RecordContext::new("account", "a-1").with_parameters(params.with_target_entity("contact"));
        RelationshipConfig::from_context(&ctx).unwrap()
    }

    fn account_meta(relationships: Vec<ManyToManyRelationship>) -> EntityMetadata {
        EntityMetadata {
            many_to_many_relationships: relationships,
            ..EntityMetadata::new("account").with_primary_name("name")
        }
    }

    fn contact_meta(relationships: Vec<ManyToManyRelationship>) -> EntityMetadata {
        EntityMetadata {
            many_to_many_relationships: relationships,
            ..EntityMetadata::new("contact").with_primary_name("fullname")
        }
    }

    fn mock(primary: EntityMetadata, target: EntityMetadata) -> MockMetadataSource {
        let mut source = MockMetadataSource::new();
        source
            .expect_entity_metadata()
            .withf(|entity: &str| entity == "account")
            .returning(move |_| Ok(primary.clone()));
        source
            .expect_entity_metadata()
            .withf(|entity: &str| entity == "contact")
            .returning(move |_| Ok(target.clone()));
        source
    }

    #[test]
    fn tiers_without_suffix() {
        let tiers = RelationshipMatcher::tiers("new_rel", "account");
        assert_eq!(tiers, vec![RelationshipMatcher::Direct("new_rel".into())]);
    }

    #[test]
    fn tiers_with_suffix_case_insensitive() {
        let tiers = RelationshipMatcher::tiers("Contact_Account", "account");
        assert_eq!(
            tiers,
            vec![
                RelationshipMatcher::Direct("Contact_Account".into()),
                RelationshipMatcher::SuffixStripped("Contact".into()),
            ]
        );
    }

    #[test]
    fn tiers_skip_empty_remainder() {
        assert_eq!(RelationshipMatcher::tiers("_account", "account").len(), 1);
    }

    #[test]
    fn direct_matches_navigation_properties() {
        let descriptors = vec![
            ManyToManyRelationship::new("other", "x"),
            ManyToManyRelationship::new("rel", "rel_intersect").with_navigation("nav_one", "NAV_TWO"),
        ];

        let (found, by) = RelationshipMatcher::Direct("nav_two".into()).find(&descriptors).unwrap();
        assert_eq!(found.intersect_entity_name.as_deref(), Some("rel_intersect"));
        assert_eq!(by, MatchedBy::Entity2NavigationProperty);

        let (_, by) = RelationshipMatcher::Direct("Nav_One".into()).find(&descriptors).unwrap();
        assert_eq!(by, MatchedBy::Entity1NavigationProperty);
    }

    #[test]
    fn suffix_stripped_ignores_navigation_properties() {
        let descriptors = vec![ManyToManyRelationship::new("x", "y").with_navigation("contact", "contact")];
        assert!(RelationshipMatcher::SuffixStripped("contact".into()).find(&descriptors).is_none());
    }

    #[tokio::test]
    async fn schema_match_any_case() {
        let source = mock(
            account_meta(vec![ManyToManyRelationship::new("new_Account_Contact", "new_account_contact")]),
            contact_meta(vec![]),
        );
        let mut cfg = config(ControlParameters::new().with_relationship("NEW_ACCOUNT_CONTACT"));

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert!(report.has_intersect());
        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("new_account_contact"));
        assert_eq!(cfg.primary_field_name.as_deref(), Some("fullname"));
        assert_eq!(report.display_attribute, DisplayAttribute::FromMetadata);
    }

    #[tokio::test]
    async fn primary_metadata_searched_first() {
        let source = mock(
            account_meta(vec![ManyToManyRelationship::new("rel", "from_primary")]),
            contact_meta(vec![ManyToManyRelationship::new("rel", "from_target")]),
        );
        let mut cfg = config(ControlParameters::new().with_relationship("rel"));

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("from_primary"));
        match report.intersect {
            IntersectResolution::Matched(found) => assert_eq!(found.side, MetadataSide::Primary),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn falls_back_to_target_metadata() {
        let source = mock(
            account_meta(vec![]),
            contact_meta(vec![ManyToManyRelationship::new("rel", "from_target")]),
        );
        let mut cfg = config(ControlParameters::new().with_relationship("rel"));

        RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("from_target"));
    }

    #[tokio::test]
    async fn suffix_fallback_resolves_schema_guess() {
        let source = mock(
            account_meta(vec![ManyToManyRelationship::new("contact", "contact_intersect")]),
            contact_meta(vec![]),
        );
        let mut cfg = config(ControlParameters::new().with_relationship("contact_account"));

        let report = RelationshipResolver::new(&source, Diagnostics::new(true))
            .resolve(&mut cfg)
            .await;

        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("contact_intersect"));
        match report.intersect {
            IntersectResolution::Matched(found) => {
                assert_eq!(found.matcher, RelationshipMatcher::SuffixStripped("contact".into()));
                assert_eq!(found.matched_by, MatchedBy::SchemaName);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn direct_tier_beats_suffix_tier_across_sides() {
        let source = mock(
            account_meta(vec![ManyToManyRelationship::new("new_target", "stripped")]),
            contact_meta(vec![ManyToManyRelationship::new("new_target_account", "direct")]),
        );
        let mut cfg = config(ControlParameters::new().with_relationship("new_target_account"));

        RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("direct"));
    }

    #[tokio::test]
    async fn miss_leaves_intersect_unset() {
        let source = mock(account_meta(vec![]), contact_meta(vec![]));
        let mut cfg = config(ControlParameters::new().with_relationship("nothing"));

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(report.intersect, IntersectResolution::Unresolved(None));
        assert_eq!(cfg.relationship_entity_name, None);
    }

    #[tokio::test]
    async fn match_without_intersect_name_is_unresolved() {
        let descriptor = ManyToManyRelationship {
            schema_name: Some("rel".into()),
            ..ManyToManyRelationship::default()
        };
        let source = mock(account_meta(vec![descriptor]), contact_meta(vec![]));
        let mut cfg = config(ControlParameters::new().with_relationship("rel"));

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert!(matches!(report.intersect, IntersectResolution::Unresolved(Some(_))));
        assert_eq!(cfg.relationship_entity_name, None);
    }

    #[tokio::test]
    async fn no_relationship_is_noop() {
        let mut source = MockMetadataSource::new();
        source.expect_entity_metadata().never();
        let mut cfg = config(ControlParameters::new().with_primary_field("fullname"));

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(report.display_attribute, DisplayAttribute::Configured);
        assert_eq!(report.intersect, IntersectResolution::NoRelationship);
    }

    #[tokio::test]
    async fn configured_intersect_skips_lookup() {
        let mut source = MockMetadataSource::new();
        source.expect_entity_metadata().never();
        let mut cfg = config(
            ControlParameters::new()
                .with_primary_field("fullname")
                .with_relationship("rel")
                .with_relationship_entity("explicit"),
        );

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(report.intersect, IntersectResolution::Configured);
        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn target_metadata_fetched_once() {
        let mut source = MockMetadataSource::new();
        source
            .expect_entity_metadata()
            .withf(|entity: &str| entity == "contact")
            .times(1)
            .returning(|_| Ok(contact_meta(vec![ManyToManyRelationship::new("rel", "i")])));
        source
            .expect_entity_metadata()
            .withf(|entity: &str| entity == "account")
            .times(1)
            .returning(|_| Ok(account_meta(vec![])));
        let mut cfg = config(ControlParameters::new().with_relationship("rel"));

        RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(cfg.relationship_entity_name.as_deref(), Some("i"));
    }

    #[tokio::test]
    async fn lookup_failure_is_not_fatal() {
        let mut source = MockMetadataSource::new();
        source
            .expect_entity_metadata()
            .returning(|e| Err(HostError::EntityNotFound(e.to_string())));
        let mut cfg = config(ControlParameters::new().with_relationship("rel"));

        let report = RelationshipResolver::new(&source, Diagnostics::default())
            .resolve(&mut cfg)
            .await;

        assert_eq!(report.display_attribute, DisplayAttribute::Unresolved);
        assert_eq!(cfg.primary_field_name, None);
        assert!(!report.has_intersect());
    }

    proptest! {
        #[test]
        fn prop_schema_match_ignores_case(
            name in "[a-z_]{1,16}",
            flips in prop::collection::vec(any::<bool>(), 16)
        ) {
            let cased: String = name
                .chars()
                .zip(flips.iter().cycle())
                .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
                .collect();
            let descriptors = vec![ManyToManyRelationship::new(cased, "intersect")];

            let found = RelationshipMatcher::Direct(name).find(&descriptors);
            prop_assert!(found.is_some());
            prop_assert_eq!(found.unwrap().1, MatchedBy::SchemaName);
        }
    }
}
