//! Scripted provider for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::harvest::query::{QueryDescriptor, QuerySpec};
use crate::models::{EntityKind, FieldKind};
use crate::providers::{Page, Provider, ProviderError};

const DEFAULT_ENTITIES: &[EntityKind] = &[
    EntityKind::Work,
    EntityKind::Author,
    EntityKind::Source,
    EntityKind::Publisher,
    EntityKind::Institution,
    EntityKind::Funder,
    EntityKind::Topic,
    EntityKind::Subfield,
    EntityKind::Field,
    EntityKind::Domain,
];

const DEFAULT_FIELDS: &[FieldKind] = &[
    FieldKind::Id,
    FieldKind::ProviderId,
    FieldKind::Doi,
    FieldKind::Ror,
    FieldKind::Orcid,
    FieldKind::Name,
    FieldKind::Issn,
    FieldKind::Pmid,
];

/// A provider that replays scripted pages and records.
///
/// Page scripts are keyed by [`MockProvider::descriptor_key`]; each
/// `fetch_page` call pops the next queued page for its descriptor. An
/// unscripted descriptor yields one empty page. Every provider call is
/// counted so tests can assert cache hits performed zero calls.
#[derive(Debug, Default)]
pub struct MockProvider {
    entities: Vec<EntityKind>,
    fields: Vec<FieldKind>,
    records: Mutex<HashMap<(EntityKind, String), Value>>,
    pages: Mutex<HashMap<String, VecDeque<Page>>>,
    failures: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            entities: DEFAULT_ENTITIES.to_vec(),
            fields: DEFAULT_FIELDS.to_vec(),
            ..Self::default()
        }
    }

    /// Restrict the capability set to the given entities.
    pub fn with_entities(mut self, entities: &[EntityKind]) -> Self {
        self.entities = entities.to_vec();
        self
    }

    /// Restrict the accepted search fields.
    pub fn with_fields(mut self, fields: &[FieldKind]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    /// Script a single record for direct-ID lookups.
    pub fn stub_record(self, entity: EntityKind, id: &str, record: Value) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert((entity, id.to_string()), record);
        self
    }

    /// Script the page sequence for a descriptor key.
    pub fn stub_pages(self, key: &str, pages: Vec<Page>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(key.to_string(), pages.into());
        self
    }

    /// Make every call for a descriptor key fail.
    pub fn stub_failure(self, key: &str) -> Self {
        self.failures.lock().unwrap().insert(key.to_string());
        self
    }

    /// Delay every page fetch for a descriptor key, for timeout tests.
    pub fn stub_delay(self, key: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
        self
    }

    /// Total provider calls observed (page fetches and record lookups).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Stable scripting key for a descriptor:
    /// `bucket|filter|attr:value,...` or `bucket|search|text`.
    pub fn descriptor_key(descriptor: &QueryDescriptor) -> String {
        let bucket = descriptor.entity.bucket();
        match &descriptor.spec {
            QuerySpec::Get { id } => format!("{}|get|{}", bucket, id),
            QuerySpec::Filter { clauses } => {
                let joined = clauses
                    .iter()
                    .map(|c| format!("{}:{}", c.attribute, c.value))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}|filter|{}", bucket, joined)
            }
            QuerySpec::Search { text, clauses } => {
                if clauses.is_empty() {
                    format!("{}|search|{}", bucket, text)
                } else {
                    let joined = clauses
                        .iter()
                        .map(|c| format!("{}:{}", c.attribute, c.value))
                        .collect::<Vec<_>>()
                        .join(",");
                    format!("{}|search|{}|{}", bucket, text, joined)
                }
            }
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    fn entity_endpoint(&self, entity: EntityKind) -> Option<&'static str> {
        self.entities
            .contains(&entity)
            .then(|| entity.bucket())
    }

    fn supported_fields(&self) -> &[FieldKind] {
        &self.fields
    }

    async fn fetch_record(&self, entity: EntityKind, id: &str) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .get(&(entity, id.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    async fn fetch_page(
        &self,
        descriptor: &QueryDescriptor,
        _per_page: usize,
        _cursor: Option<&str>,
    ) -> Result<Page, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = Self::descriptor_key(descriptor);

        let delay = self.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failures.lock().unwrap().contains(&key) {
            return Err(ProviderError::Api {
                status: 500,
                message: format!("scripted failure for {}", key),
            });
        }

        let page = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::query::FilterClause;
    use serde_json::json;

    #[test]
    fn descriptor_key_is_stable() {
        let descriptor = QueryDescriptor {
            entity: EntityKind::Work,
            field: FieldKind::Doi,
            spec: QuerySpec::Filter {
                clauses: vec![FilterClause {
                    attribute: "doi".to_string(),
                    value: "10.1000/1".to_string(),
                }],
            },
        };
        assert_eq!(
            MockProvider::descriptor_key(&descriptor),
            "works|filter|doi:10.1000/1"
        );
    }

    #[tokio::test]
    async fn pages_replay_in_order_then_run_dry() {
        let descriptor = QueryDescriptor {
            entity: EntityKind::Work,
            field: FieldKind::Doi,
            spec: QuerySpec::Filter {
                clauses: vec![FilterClause {
                    attribute: "doi".to_string(),
                    value: "x".to_string(),
                }],
            },
        };
        let provider = MockProvider::new().stub_pages(
            "works|filter|doi:x",
            vec![Page::new(vec![json!({"id": "W1"})], None)],
        );

        let first = provider.fetch_page(&descriptor, 10, None).await.unwrap();
        assert_eq!(first.records.len(), 1);

        let second = provider.fetch_page(&descriptor, 10, None).await.unwrap();
        assert!(second.records.is_empty());
        assert_eq!(provider.calls(), 2);
    }
}
