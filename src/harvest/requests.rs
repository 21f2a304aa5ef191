//! Pending request collection.
//!
//! Normalizes the three accepted caller input shapes into typed
//! [`SearchRequest`]s and deduplicates them against requests already
//! held. Purely in-memory; adding requests never touches the network.

use tracing::debug;

use crate::models::{EntityKind, FieldKind, RequestError, RequestInput, SearchRequest};

/// Mutable set of pending search requests for one harvester.
///
/// Constructed fresh per harvester instance; never shared.
#[derive(Debug, Clone)]
pub struct RequestCollection {
    pending: Vec<SearchRequest>,
    default_field: FieldKind,
    default_entity: EntityKind,
}

impl RequestCollection {
    /// Create an empty collection with the defaults applied to bare
    /// value strings.
    pub fn new(default_field: FieldKind, default_entity: EntityKind) -> Self {
        Self {
            pending: Vec::new(),
            default_field,
            default_entity,
        }
    }

    /// Add requests, normalizing whichever input shape the caller used.
    ///
    /// All items in one call must share a shape; mixing bare values,
    /// raw parts, and typed requests fails with
    /// [`RequestError::InconsistentRequestShape`] and leaves the
    /// collection untouched. Duplicates of already-held requests are
    /// dropped. Returns the number of requests actually appended.
    pub fn add(&mut self, inputs: Vec<RequestInput>) -> Result<usize, RequestError> {
        let Some(first) = inputs.first() else {
            return Ok(0);
        };
        let shape = first.shape();
        if inputs.iter().any(|input| input.shape() != shape) {
            return Err(RequestError::InconsistentRequestShape);
        }

        // normalize everything before mutating, so a bad item in the
        // middle of the batch cannot leave a partial add behind
        let mut normalized = Vec::with_capacity(inputs.len());
        for input in inputs {
            normalized.push(match input {
                RequestInput::Value(value) => {
                    SearchRequest::new(value, self.default_field, self.default_entity)?
                }
                RequestInput::Parts {
                    value,
                    field,
                    entity,
                } => SearchRequest::parse(value, &field, &entity)?,
                RequestInput::Typed(request) => request,
            });
        }

        let mut added = 0;
        for request in normalized {
            if !self.pending.contains(&request) {
                self.pending.push(request);
                added += 1;
            }
        }
        debug!(added, pending = self.pending.len(), "added search requests");
        Ok(added)
    }

    /// Remove all pending requests.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn as_slice(&self) -> &[SearchRequest] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
