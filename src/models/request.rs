//! Typed search request model.
//!
//! A [`SearchRequest`] pairs a raw lookup value with the field it
//! represents (DOI, ORCID, ROR, ...) and the entity category it should
//! resolve to. Field and entity are always enum members: requests built
//! from raw strings are resolved case-insensitively at construction and
//! never change afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised while constructing or normalizing search requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The field string does not name any known field kind
    #[error("invalid field kind: {0}")]
    InvalidFieldKind(String),

    /// The entity string does not name any known entity kind
    #[error("invalid entity kind: {0}")]
    InvalidEntityKind(String),

    /// A request value must be a non-empty string
    #[error("search value must not be empty")]
    EmptyValue,

    /// One `add` call mixed bare strings, raw parts, and typed requests
    #[error("inconsistent request shapes in a single add call")]
    InconsistentRequestShape,
}

/// What a search value represents.
///
/// Covers provider-native IDs, cross-provider persistent identifiers,
/// free-text names, and secondary filter fields. `as_str` yields the
/// provider attribute name used by the fallback query-construction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Provider-native entity ID
    Id,
    /// Explicit provider-ID spelling (same filter as `Id`)
    ProviderId,
    Doi,
    Orcid,
    Ror,
    Isbn,
    Issn,
    Pmid,
    /// Free-text name, dispatched to the provider's search endpoint
    Name,
    PublicationYear,
    PublicationDate,
    Publisher,
    OpenAccess,
    Type,
}

impl FieldKind {
    /// Provider attribute name for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Id => "id",
            FieldKind::ProviderId => "provider_id",
            FieldKind::Doi => "doi",
            FieldKind::Orcid => "orcid",
            FieldKind::Ror => "ror",
            FieldKind::Isbn => "isbn",
            FieldKind::Issn => "issn",
            FieldKind::Pmid => "pmid",
            FieldKind::Name => "name",
            FieldKind::PublicationYear => "publication_year",
            FieldKind::PublicationDate => "publication_date",
            FieldKind::Publisher => "publisher",
            FieldKind::OpenAccess => "open_access",
            FieldKind::Type => "type",
        }
    }

    /// Whether values of this field may be combined into one
    /// OR-disjunction query, bounded by the configured batch cap.
    pub fn is_batchable(&self) -> bool {
        matches!(
            self,
            FieldKind::Id
                | FieldKind::ProviderId
                | FieldKind::Doi
                | FieldKind::Orcid
                | FieldKind::Ror
        )
    }
}

impl FromStr for FieldKind {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(FieldKind::Id),
            "provider_id" | "openalex_id" => Ok(FieldKind::ProviderId),
            "doi" => Ok(FieldKind::Doi),
            "orcid" => Ok(FieldKind::Orcid),
            "ror" => Ok(FieldKind::Ror),
            "isbn" => Ok(FieldKind::Isbn),
            "issn" => Ok(FieldKind::Issn),
            "pmid" => Ok(FieldKind::Pmid),
            "name" => Ok(FieldKind::Name),
            "publication_year" => Ok(FieldKind::PublicationYear),
            "publication_date" => Ok(FieldKind::PublicationDate),
            "publisher" => Ok(FieldKind::Publisher),
            "open_access" => Ok(FieldKind::OpenAccess),
            "type" => Ok(FieldKind::Type),
            other => Err(RequestError::InvalidFieldKind(other.to_string())),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of retrievable scholarly object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Work,
    Dataset,
    Software,
    Author,
    Source,
    Publisher,
    Institution,
    Funder,
    Topic,
    Subfield,
    Field,
    Domain,
    Project,
    Grant,
    License,
    Journal,
}

impl EntityKind {
    /// Singular entity name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Work => "work",
            EntityKind::Dataset => "dataset",
            EntityKind::Software => "software",
            EntityKind::Author => "author",
            EntityKind::Source => "source",
            EntityKind::Publisher => "publisher",
            EntityKind::Institution => "institution",
            EntityKind::Funder => "funder",
            EntityKind::Topic => "topic",
            EntityKind::Subfield => "subfield",
            EntityKind::Field => "field",
            EntityKind::Domain => "domain",
            EntityKind::Project => "project",
            EntityKind::Grant => "grant",
            EntityKind::License => "license",
            EntityKind::Journal => "journal",
        }
    }

    /// Result-store bucket name (plural form).
    pub fn bucket(&self) -> &'static str {
        match self {
            EntityKind::Work => "works",
            EntityKind::Dataset => "datasets",
            EntityKind::Software => "software",
            EntityKind::Author => "authors",
            EntityKind::Source => "sources",
            EntityKind::Publisher => "publishers",
            EntityKind::Institution => "institutions",
            EntityKind::Funder => "funders",
            EntityKind::Topic => "topics",
            EntityKind::Subfield => "subfields",
            EntityKind::Field => "fields",
            EntityKind::Domain => "domains",
            EntityKind::Project => "projects",
            EntityKind::Grant => "grants",
            EntityKind::License => "licenses",
            EntityKind::Journal => "journals",
        }
    }
}

impl FromStr for EntityKind {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // publication-shaped aliases all resolve to Work
            "work" | "article" | "publication" | "preprint" | "book" | "chapter"
            | "conference_proceeding" => Ok(EntityKind::Work),
            "dataset" => Ok(EntityKind::Dataset),
            "software" => Ok(EntityKind::Software),
            "author" => Ok(EntityKind::Author),
            "source" => Ok(EntityKind::Source),
            "publisher" => Ok(EntityKind::Publisher),
            "institution" => Ok(EntityKind::Institution),
            "funder" => Ok(EntityKind::Funder),
            "topic" => Ok(EntityKind::Topic),
            "subfield" => Ok(EntityKind::Subfield),
            "field" => Ok(EntityKind::Field),
            "domain" => Ok(EntityKind::Domain),
            "project" => Ok(EntityKind::Project),
            "grant" => Ok(EntityKind::Grant),
            "license" => Ok(EntityKind::License),
            "journal" => Ok(EntityKind::Journal),
            other => Err(RequestError::InvalidEntityKind(other.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed lookup request: a value, the field it represents, the
/// entity it should resolve to, and optional nested filter requests
/// narrowing the primary lookup.
///
/// Nested filters are structurally identical requests but are never
/// dispatched as top-level queries; the query builder appends them as
/// extra filter clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchRequest {
    value: String,
    field: FieldKind,
    entity: EntityKind,
    #[serde(default)]
    filters: Vec<SearchRequest>,
}

impl SearchRequest {
    /// Create a request from fully-typed components.
    pub fn new(
        value: impl Into<String>,
        field: FieldKind,
        entity: EntityKind,
    ) -> Result<Self, RequestError> {
        let value = value.into();
        if value.is_empty() {
            return Err(RequestError::EmptyValue);
        }
        Ok(Self {
            value,
            field,
            entity,
            filters: Vec::new(),
        })
    }

    /// Create a request from raw field/entity strings, matched
    /// case-insensitively against the enumerated kinds.
    pub fn parse(
        value: impl Into<String>,
        field: &str,
        entity: &str,
    ) -> Result<Self, RequestError> {
        Self::new(value, field.parse()?, entity.parse()?)
    }

    /// Attach a nested filter request narrowing this lookup.
    pub fn with_filter(mut self, filter: SearchRequest) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn field(&self) -> FieldKind {
        self.field
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn filters(&self) -> &[SearchRequest] {
        &self.filters
    }
}

/// External input shapes accepted by a request collection.
///
/// Adapter between loosely-typed caller input and the typed
/// [`SearchRequest`]; the rest of the crate only ever sees the typed
/// form. All items in one `add` call must use the same variant.
#[derive(Debug, Clone)]
pub enum RequestInput {
    /// Bare value, defaulted to the harvester's default field/entity
    Value(String),
    /// Raw string parts, resolved case-insensitively
    Parts {
        value: String,
        field: String,
        entity: String,
    },
    /// Fully-typed request, taken as-is
    Typed(SearchRequest),
}

impl RequestInput {
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            RequestInput::Value(_) => "value",
            RequestInput::Parts { .. } => "parts",
            RequestInput::Typed(_) => "typed",
        }
    }
}

impl From<&str> for RequestInput {
    fn from(value: &str) -> Self {
        RequestInput::Value(value.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(value: String) -> Self {
        RequestInput::Value(value)
    }
}

impl From<SearchRequest> for RequestInput {
    fn from(request: SearchRequest) -> Self {
        RequestInput::Typed(request)
    }
}
