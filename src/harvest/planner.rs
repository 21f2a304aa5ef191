//! Query planning.
//!
//! Groups pending requests by (entity, field), validates the pair
//! against the provider's capability set, and partitions batchable
//! identifier groups into chunks no larger than the configured batch
//! cap. Unsupported slices degrade to diagnostics, never errors.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::models::{EntityKind, FieldKind, SearchRequest};
use crate::providers::Provider;

/// One planned provider query: a deduplicated value batch for a single
/// (entity, field) pair, plus any nested filters carried over from the
/// originating request.
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub entity: EntityKind,
    pub field: FieldKind,
    pub values: Vec<String>,
    pub filters: Vec<SearchRequest>,
}

/// Why a slice of the harvest produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Entity outside the provider's capability set
    UnsupportedEntity,
    /// Field not accepted by the provider for searching
    UnsupportedField,
    /// No query construction rule matched the (field, entity) pair
    UnsupportedQuery,
    /// The provider call failed after the client's own retries
    ProviderFailure,
    /// The descriptor exceeded its timeout budget
    Timeout,
}

/// A planning- or retrieval-level gap, reported alongside the result
/// store so callers can tell "nothing matched" apart from "this slice
/// was skipped or failed".
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub entity: EntityKind,
    pub field: Option<FieldKind>,
    pub detail: String,
}

impl Diagnostic {
    pub(crate) fn new(
        kind: DiagnosticKind,
        entity: EntityKind,
        field: Option<FieldKind>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity,
            field,
            detail: detail.into(),
        }
    }
}

/// Plan the pending requests into provider query batches.
///
/// Requests carrying nested filters are planned individually (their
/// filter clauses differ per request, so they cannot share a batch).
/// Within a surviving (entity, field) group, values are deduplicated in
/// first-seen order; batchable fields are chunked to `batch_size`,
/// non-batchable fields yield one planned query per value.
pub fn plan(
    requests: &[SearchRequest],
    provider: &dyn Provider,
    batch_size: usize,
) -> (Vec<PlannedQuery>, Vec<Diagnostic>) {
    let mut planned = Vec::new();
    let mut diagnostics = Vec::new();

    let mut groups: HashMap<(EntityKind, FieldKind), Vec<String>> = HashMap::new();
    let mut group_order: Vec<(EntityKind, FieldKind)> = Vec::new();
    // skips are per (entity, field) group, not per request
    let mut skipped: HashSet<(DiagnosticKind, EntityKind, FieldKind)> = HashSet::new();

    for request in requests {
        let entity = request.entity();
        let field = request.field();

        if provider.entity_endpoint(entity).is_none() {
            if skipped.insert((DiagnosticKind::UnsupportedEntity, entity, field)) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnsupportedEntity,
                    entity,
                    Some(field),
                    format!("{} does not expose {} entities", provider.id(), entity),
                ));
            }
            continue;
        }
        if !provider.supported_fields().contains(&field) {
            if skipped.insert((DiagnosticKind::UnsupportedField, entity, field)) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnsupportedField,
                    entity,
                    Some(field),
                    format!("{} does not accept {} as a search field", provider.id(), field),
                ));
            }
            continue;
        }

        if !request.filters().is_empty() {
            planned.push(PlannedQuery {
                entity,
                field,
                values: vec![request.value().to_string()],
                filters: request.filters().to_vec(),
            });
            continue;
        }

        let key = (entity, field);
        if !groups.contains_key(&key) {
            group_order.push(key);
        }
        groups
            .entry(key)
            .or_default()
            .push(request.value().to_string());
    }

    for key in group_order {
        let (entity, field) = key;
        let Some(raw) = groups.remove(&key) else {
            continue;
        };

        let mut seen = HashSet::new();
        let values: Vec<String> = raw.into_iter().filter(|v| seen.insert(v.clone())).collect();

        if field.is_batchable() {
            for chunk in values.chunks(batch_size.max(1)) {
                planned.push(PlannedQuery {
                    entity,
                    field,
                    values: chunk.to_vec(),
                    filters: Vec::new(),
                });
            }
        } else {
            for value in values {
                planned.push(PlannedQuery {
                    entity,
                    field,
                    values: vec![value],
                    filters: Vec::new(),
                });
            }
        }
    }

    debug!(
        queries = planned.len(),
        skipped = diagnostics.len(),
        "planned provider queries"
    );
    (planned, diagnostics)
}
