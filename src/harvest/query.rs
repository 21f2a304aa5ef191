//! Query construction.
//!
//! Translates a planned (values, field, entity) triple into a
//! provider-ready [`QueryDescriptor`]. Construction is a pure dispatch
//! table keyed by field and entity, so unsupported combinations are
//! enumerable; no network activity happens here.

use crate::harvest::planner::PlannedQuery;
use crate::models::{EntityKind, FieldKind, SearchRequest};

/// Values inside one batch are joined into a provider OR-disjunction.
pub const DISJUNCTION_SEPARATOR: &str = "|";

/// A query construction rule did not match.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported query: field {field} on entity {entity}")]
pub struct UnsupportedQuery {
    pub field: FieldKind,
    pub entity: EntityKind,
}

/// One exact-match filter on a (possibly nested, dot-separated)
/// provider attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub attribute: String,
    pub value: String,
}

impl FilterClause {
    fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// How the provider should execute a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySpec {
    /// Direct single-record lookup by provider-native ID
    Get { id: String },
    /// Exact-match filter query (paginated)
    Filter { clauses: Vec<FilterClause> },
    /// Full-text search, optionally narrowed by filter clauses (paginated)
    Search {
        text: String,
        clauses: Vec<FilterClause>,
    },
}

/// A fully-built, ready-to-execute query unit. The originating field
/// rides along so retrieval failures stay attributable to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub entity: EntityKind,
    pub field: FieldKind,
    pub spec: QuerySpec,
}

/// Provider attribute path for an exact-match filter, or `None` when no
/// construction rule matches the (field, entity) pair.
///
/// The irregular cases are organization and source identifiers, whose
/// provider filter sits under a different attribute depending on the
/// entity: a work is filtered through its associated institutions, an
/// author through the institution inside its affiliations.
fn filter_attribute(field: FieldKind, entity: EntityKind) -> Option<&'static str> {
    match field {
        FieldKind::Id | FieldKind::ProviderId => Some("openalex_id"),
        FieldKind::Doi => Some("doi"),
        FieldKind::Pmid => Some("pmid"),
        FieldKind::Orcid => Some("orcid"),
        FieldKind::Ror => match entity {
            EntityKind::Work => Some("institutions.ror"),
            EntityKind::Author => Some("affiliations.institution.ror"),
            EntityKind::Publisher | EntityKind::Institution | EntityKind::Funder => Some("ror"),
            _ => None,
        },
        FieldKind::Issn => match entity {
            EntityKind::Work => Some("locations.source.issn"),
            EntityKind::Source => Some("issn"),
            _ => None,
        },
        // free text goes through the search endpoint, not a filter
        FieldKind::Name => None,
        // fallback: the field's raw name doubles as the attribute; a
        // provider-side rejection surfaces as a per-descriptor failure
        other => Some(other.as_str()),
    }
}

/// Attribute path for a nested filter request attached to a primary
/// lookup. Same table as the primary rule, except free-text narrows via
/// the provider's searchable display-name attribute.
fn nested_attribute(field: FieldKind, entity: EntityKind) -> Option<&'static str> {
    match field {
        FieldKind::Name => Some("display_name.search"),
        other => filter_attribute(other, entity),
    }
}

fn nested_clauses(
    filters: &[SearchRequest],
    entity: EntityKind,
) -> Result<Vec<FilterClause>, UnsupportedQuery> {
    filters
        .iter()
        .map(|f| {
            nested_attribute(f.field(), entity)
                .map(|attr| FilterClause::new(attr, f.value()))
                .ok_or(UnsupportedQuery {
                    field: f.field(),
                    entity,
                })
        })
        .collect()
}

/// Build a descriptor for one planned query.
pub fn build(planned: &PlannedQuery) -> Result<QueryDescriptor, UnsupportedQuery> {
    let entity = planned.entity;
    let field = planned.field;
    let extra = nested_clauses(&planned.filters, entity)?;

    // free-text search dispatches to the search endpoint
    if field == FieldKind::Name {
        let text = planned.values.join(" ");
        return Ok(QueryDescriptor {
            entity,
            field,
            spec: QuerySpec::Search {
                text,
                clauses: extra,
            },
        });
    }

    // a lone unfiltered provider-native ID collapses to a direct lookup
    if matches!(field, FieldKind::Id | FieldKind::ProviderId)
        && planned.values.len() == 1
        && extra.is_empty()
    {
        return Ok(QueryDescriptor {
            entity,
            field,
            spec: QuerySpec::Get {
                id: planned.values[0].clone(),
            },
        });
    }

    let attribute =
        filter_attribute(field, entity).ok_or(UnsupportedQuery { field, entity })?;
    let mut clauses = vec![FilterClause::new(
        attribute,
        planned.values.join(DISJUNCTION_SEPARATOR),
    )];
    clauses.extend(extra);

    Ok(QueryDescriptor {
        entity,
        field,
        spec: QuerySpec::Filter { clauses },
    })
}
