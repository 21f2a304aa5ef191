//! Harvesting core: request collection, planning, query construction,
//! and the retrieval façade.
//!
//! A [`Harvester`] owns its pending requests and result store. Callers
//! add requests in any accepted shape, then pull results; retrieval is
//! lazy and cached, so repeated calls without new requests cost zero
//! provider calls. Gaps (unsupported slices, failed descriptors) are
//! reported through [`Diagnostic`]s rather than errors.

pub mod engine;
pub mod planner;
pub mod query;
pub mod requests;

pub use planner::{plan, Diagnostic, DiagnosticKind, PlannedQuery};
pub use query::{build, FilterClause, QueryDescriptor, QuerySpec, UnsupportedQuery};
pub use requests::RequestCollection;

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::HarvesterConfig;
use crate::models::{EntityKind, FieldKind, RequestError, RequestInput, ResultStore};
use crate::providers::Provider;

/// Errors surfaced by the harvester façade.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// `get_results` needs at least one pending request when the store
    /// is empty or a refresh was forced
    #[error("no search requests configured")]
    NoRequestsConfigured,
}

/// Orchestrates one provider's harvest: normalize requests, plan and
/// build queries, retrieve pages, accumulate results.
///
/// Each instance exclusively owns its request collection and result
/// store; nothing is shared across harvesters.
#[derive(Debug)]
pub struct Harvester {
    provider: Arc<dyn Provider>,
    config: HarvesterConfig,
    requests: RequestCollection,
    store: ResultStore,
    diagnostics: Vec<Diagnostic>,
}

impl Harvester {
    /// Default field applied to bare value strings.
    pub const DEFAULT_FIELD: FieldKind = FieldKind::Id;
    /// Default entity applied to bare value strings.
    pub const DEFAULT_ENTITY: EntityKind = EntityKind::Work;

    pub fn new(provider: Arc<dyn Provider>, config: HarvesterConfig) -> Self {
        Self {
            provider,
            config,
            requests: RequestCollection::new(Self::DEFAULT_FIELD, Self::DEFAULT_ENTITY),
            store: ResultStore::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Provider endpoint for an entity, if the provider supports it.
    pub fn entity_endpoint(&self, entity: EntityKind) -> Option<&'static str> {
        self.provider.entity_endpoint(entity)
    }

    /// Search fields the underlying provider accepts.
    pub fn supported_fields(&self) -> &[FieldKind] {
        self.provider.supported_fields()
    }

    /// Add pending requests; see [`RequestCollection::add`].
    pub fn add_requests(&mut self, inputs: Vec<RequestInput>) -> Result<usize, RequestError> {
        self.requests.add(inputs)
    }

    /// Drop all pending requests.
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    /// Results accumulated so far, without triggering retrieval.
    pub fn results(&self) -> &ResultStore {
        &self.store
    }

    /// Diagnostics from the most recent harvest run.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Return harvested results, running the harvest if needed.
    ///
    /// A non-empty store with `force_refresh == false` is a cache hit
    /// and performs zero provider calls. A forced refresh clears the
    /// store before re-harvesting, so records that no longer match do
    /// not linger. This is the façade's only network entry point.
    pub async fn get_results(
        &mut self,
        force_refresh: bool,
    ) -> Result<&ResultStore, HarvestError> {
        if !self.store.is_empty() && !force_refresh {
            return Ok(&self.store);
        }
        if self.requests.is_empty() {
            return Err(HarvestError::NoRequestsConfigured);
        }
        if force_refresh {
            self.store.clear();
        }

        let (planned, mut diagnostics) = plan(
            self.requests.as_slice(),
            self.provider.as_ref(),
            self.config.batch_size,
        );

        let mut descriptors = Vec::with_capacity(planned.len());
        for planned_query in &planned {
            match query::build(planned_query) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => {
                    warn!(error = %err, "skipping unbuildable query");
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnsupportedQuery,
                        planned_query.entity,
                        Some(planned_query.field),
                        err.to_string(),
                    ));
                }
            }
        }

        info!(
            provider = self.provider.id(),
            requests = self.requests.len(),
            descriptors = descriptors.len(),
            "starting harvest"
        );
        let retrieval_diagnostics = engine::retrieve(
            Arc::clone(&self.provider),
            &self.config,
            descriptors,
            &mut self.store,
        )
        .await;
        diagnostics.extend(retrieval_diagnostics);
        self.diagnostics = diagnostics;

        Ok(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchRequest;
    use crate::providers::{MockProvider, Page};
    use serde_json::json;

    fn harvester(provider: MockProvider) -> Harvester {
        Harvester::new(Arc::new(provider), HarvesterConfig::default())
    }

    #[tokio::test]
    async fn get_results_without_requests_fails() {
        let mut h = harvester(MockProvider::new());
        let err = h.get_results(false).await.unwrap_err();
        assert!(matches!(err, HarvestError::NoRequestsConfigured));
    }

    #[tokio::test]
    async fn doi_and_ror_requests_harvest_into_the_works_bucket() {
        let provider = MockProvider::new()
            .stub_pages(
                "works|filter|doi:10.1021/acs.analchem.9b05183",
                vec![Page::new(vec![json!({"id": "W100"})], None)],
            )
            .stub_pages(
                "works|filter|institutions.ror:https://ror.org/006hf6230",
                vec![Page::new(vec![json!({"id": "W200"})], None)],
            );
        let mut h = harvester(provider);

        h.add_requests(vec![
            SearchRequest::new(
                "10.1021/acs.analchem.9b05183",
                FieldKind::Doi,
                EntityKind::Work,
            )
            .unwrap()
            .into(),
            SearchRequest::new("https://ror.org/006hf6230", FieldKind::Ror, EntityKind::Work)
                .unwrap()
                .into(),
        ])
        .unwrap();

        let store = h.get_results(false).await.unwrap();
        let works = store.bucket(EntityKind::Work).unwrap();
        assert_eq!(works.len(), 2);
        assert!(works.contains_key("W100"));
        assert!(works.contains_key("W200"));
        assert!(h.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn second_call_is_a_cache_hit_with_zero_provider_calls() {
        let provider = Arc::new(MockProvider::new().stub_pages(
            "works|filter|doi:10.1000/1",
            vec![Page::new(vec![json!({"id": "W1"})], None)],
        ));
        let mut h = Harvester::new(
            Arc::clone(&provider) as Arc<dyn Provider>,
            HarvesterConfig::default(),
        );
        h.add_requests(vec![SearchRequest::new(
            "10.1000/1",
            FieldKind::Doi,
            EntityKind::Work,
        )
        .unwrap()
        .into()])
        .unwrap();

        h.get_results(false).await.unwrap();
        let calls_after_first = provider.calls();
        assert!(calls_after_first > 0);

        h.get_results(false).await.unwrap();
        assert_eq!(provider.calls(), calls_after_first);
    }

    #[tokio::test]
    async fn forced_refresh_clears_the_store_before_reharvesting() {
        // one scripted page: the first harvest consumes it, the forced
        // refresh sees an empty replay and must not resurrect W1
        let provider = MockProvider::new().stub_pages(
            "works|filter|doi:10.1000/1",
            vec![Page::new(vec![json!({"id": "W1"})], None)],
        );
        let mut h = harvester(provider);
        h.add_requests(vec![SearchRequest::new(
            "10.1000/1",
            FieldKind::Doi,
            EntityKind::Work,
        )
        .unwrap()
        .into()])
        .unwrap();

        h.get_results(false).await.unwrap();
        assert_eq!(h.results().len(), 1);

        h.get_results(true).await.unwrap();
        assert!(h.results().is_empty());
    }

    #[tokio::test]
    async fn unsupported_entity_yields_zero_calls_and_a_diagnostic() {
        let provider = Arc::new(
            MockProvider::new().with_entities(&[EntityKind::Work, EntityKind::Author]),
        );
        let mut h = Harvester::new(
            Arc::clone(&provider) as Arc<dyn Provider>,
            HarvesterConfig::default(),
        );
        h.add_requests(vec![SearchRequest::new(
            "https://ror.org/006hf6230",
            FieldKind::Ror,
            EntityKind::Funder,
        )
        .unwrap()
        .into()])
        .unwrap();

        let store = h.get_results(false).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(provider.calls(), 0);
        assert_eq!(h.diagnostics().len(), 1);
        assert_eq!(h.diagnostics()[0].kind, DiagnosticKind::UnsupportedEntity);
    }

    #[tokio::test]
    async fn unbuildable_query_degrades_to_a_diagnostic() {
        // ROR on a topic passes planning (field is supported) but no
        // construction rule matches
        let provider = Arc::new(MockProvider::new());
        let mut h = Harvester::new(
            Arc::clone(&provider) as Arc<dyn Provider>,
            HarvesterConfig::default(),
        );
        h.add_requests(vec![SearchRequest::new(
            "https://ror.org/006hf6230",
            FieldKind::Ror,
            EntityKind::Topic,
        )
        .unwrap()
        .into()])
        .unwrap();

        let store = h.get_results(false).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(provider.calls(), 0);
        assert_eq!(h.diagnostics()[0].kind, DiagnosticKind::UnsupportedQuery);
    }

    #[tokio::test]
    async fn bare_values_default_to_native_id_work_lookups() {
        let provider = MockProvider::new().stub_record(
            EntityKind::Work,
            "W42",
            json!({"id": "W42", "title": "The Answer"}),
        );
        let mut h = harvester(provider);
        h.add_requests(vec!["W42".into()]).unwrap();

        let store = h.get_results(false).await.unwrap();
        assert!(store.get(EntityKind::Work, "W42").is_some());
    }
}
