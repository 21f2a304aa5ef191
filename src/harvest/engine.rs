//! Pagination and aggregation.
//!
//! Executes built descriptors against the provider client and merges
//! every returned record into the result store, keyed by the record's
//! native ID. Descriptors are independent and run with bounded
//! concurrency; pages inside one descriptor are sequential because each
//! cursor comes from the previous page. A failure or timeout on one
//! descriptor never aborts the others.

use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::HarvesterConfig;
use crate::harvest::planner::{Diagnostic, DiagnosticKind};
use crate::harvest::query::{QueryDescriptor, QuerySpec};
use crate::models::{EntityKind, FieldKind, ResultStore};
use crate::providers::{Provider, ProviderError};

type DescriptorOutcome = (
    EntityKind,
    FieldKind,
    Result<Result<Vec<Value>, ProviderError>, tokio::time::error::Elapsed>,
);

/// Fetch all records for one descriptor.
///
/// A direct-ID descriptor resolves to exactly one record; anything else
/// walks the provider's cursor until it runs out of pages or the
/// per-query result cap is reached. The cap bounds worst-case memory
/// and time for a single ambiguous batch.
async fn run_descriptor(
    provider: &dyn Provider,
    config: &HarvesterConfig,
    descriptor: &QueryDescriptor,
) -> Result<Vec<Value>, ProviderError> {
    if let QuerySpec::Get { id } = &descriptor.spec {
        let record = provider.fetch_record(descriptor.entity, id).await?;
        return Ok(vec![record]);
    }

    let cap = config.max_results_per_query();
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = provider
            .fetch_page(descriptor, config.page_size, cursor.as_deref())
            .await?;
        let page_len = page.records.len();
        records.extend(page.records);

        if records.len() >= cap {
            records.truncate(cap);
            debug!(entity = %descriptor.entity, cap, "descriptor hit its result cap");
            break;
        }
        match page.next_cursor {
            Some(next) if page_len > 0 => cursor = Some(next),
            _ => break,
        }
    }
    Ok(records)
}

/// Merge one descriptor's records into the store.
fn merge(store: &mut ResultStore, entity: EntityKind, records: Vec<Value>) -> usize {
    let mut merged = 0;
    for record in records {
        let Some(native_id) = record.get("id").and_then(Value::as_str).map(str::to_string)
        else {
            warn!(entity = %entity, "dropping record without a native id");
            continue;
        };
        store.insert(entity, native_id, record);
        merged += 1;
    }
    merged
}

/// Execute every descriptor and merge the results.
///
/// Returns the per-descriptor diagnostics; an empty descriptor list
/// performs no provider call at all. The coordinating task is the only
/// writer into the store; descriptor workers only fetch.
pub async fn retrieve(
    provider: Arc<dyn Provider>,
    config: &HarvesterConfig,
    descriptors: Vec<QueryDescriptor>,
    store: &mut ResultStore,
) -> Vec<Diagnostic> {
    if descriptors.is_empty() {
        debug!("no descriptors to retrieve");
        return Vec::new();
    }

    let total = descriptors.len();
    let budget = Duration::from_secs(config.descriptor_timeout_secs);
    let concurrency = config.max_concurrency.max(1);

    let outcomes: Vec<DescriptorOutcome> = stream::iter(descriptors)
        .map(|descriptor| {
            let provider = Arc::clone(&provider);
            async move {
                let entity = descriptor.entity;
                let field = descriptor.field;
                let result =
                    timeout(budget, run_descriptor(provider.as_ref(), config, &descriptor))
                        .await;
                (entity, field, result)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut diagnostics = Vec::new();
    let mut merged = 0;
    for (entity, field, outcome) in outcomes {
        match outcome {
            Ok(Ok(records)) => merged += merge(store, entity, records),
            Ok(Err(err)) => {
                warn!(entity = %entity, field = %field, error = %err, "descriptor failed");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ProviderFailure,
                    entity,
                    Some(field),
                    err.to_string(),
                ));
            }
            Err(_) => {
                warn!(entity = %entity, field = %field, ?budget, "descriptor timed out");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::Timeout,
                    entity,
                    Some(field),
                    format!("exceeded {}s timeout budget", config.descriptor_timeout_secs),
                ));
            }
        }
    }

    info!(
        descriptors = total,
        merged,
        failed = diagnostics.len(),
        "retrieval finished"
    );
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::query::FilterClause;
    use crate::providers::{MockProvider, Page};
    use serde_json::json;

    fn filter_descriptor(
        entity: EntityKind,
        field: FieldKind,
        attribute: &str,
        value: &str,
    ) -> QueryDescriptor {
        QueryDescriptor {
            entity,
            field,
            spec: QuerySpec::Filter {
                clauses: vec![FilterClause {
                    attribute: attribute.to_string(),
                    value: value.to_string(),
                }],
            },
        }
    }

    fn test_config() -> HarvesterConfig {
        HarvesterConfig {
            page_size: 2,
            max_pages: 3,
            ..HarvesterConfig::default()
        }
    }

    #[tokio::test]
    async fn empty_descriptor_list_makes_no_calls() {
        let provider = Arc::new(MockProvider::new());
        let mut store = ResultStore::new();

        let diagnostics =
            retrieve(provider.clone() as Arc<dyn Provider>, &test_config(), Vec::new(), &mut store)
                .await;

        assert!(diagnostics.is_empty());
        assert!(store.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn paginated_records_merge_under_native_id() {
        let provider = MockProvider::new().stub_pages(
            "works|filter|doi:10.1000/1|10.1000/2",
            vec![
                Page::new(
                    vec![json!({"id": "W1"}), json!({"id": "W2"})],
                    Some("cursor-2".to_string()),
                ),
                Page::new(vec![json!({"id": "W3"})], None),
            ],
        );
        let provider = Arc::new(provider);
        let mut store = ResultStore::new();

        let descriptor =
            filter_descriptor(EntityKind::Work, FieldKind::Doi, "doi", "10.1000/1|10.1000/2");
        let diagnostics = retrieve(
            provider.clone() as Arc<dyn Provider>,
            &test_config(),
            vec![descriptor],
            &mut store,
        )
        .await;

        assert!(diagnostics.is_empty());
        assert_eq!(store.bucket(EntityKind::Work).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn merge_is_idempotent_across_get_and_paginated_paths() {
        let provider = MockProvider::new()
            .stub_record(EntityKind::Work, "W1", json!({"id": "W1", "via": "get"}))
            .stub_pages(
                "works|filter|doi:10.1000/1",
                vec![Page::new(vec![json!({"id": "W1", "via": "page"})], None)],
            );
        let provider = Arc::new(provider);
        let mut store = ResultStore::new();

        let descriptors = vec![
            QueryDescriptor {
                entity: EntityKind::Work,
                field: FieldKind::Id,
                spec: QuerySpec::Get {
                    id: "W1".to_string(),
                },
            },
            filter_descriptor(EntityKind::Work, FieldKind::Doi, "doi", "10.1000/1"),
        ];
        retrieve(
            provider as Arc<dyn Provider>,
            &test_config(),
            descriptors,
            &mut store,
        )
        .await;

        // exactly one entry under W1, whichever path wrote last
        assert_eq!(store.bucket(EntityKind::Work).unwrap().len(), 1);
        assert!(store.get(EntityKind::Work, "W1").is_some());
    }

    #[tokio::test]
    async fn result_cap_bounds_pagination() {
        // cap = page_size(2) * max_pages(3) = 6; cursor never runs out
        let pages: Vec<Page> = (0..10)
            .map(|p| {
                Page::new(
                    vec![
                        json!({"id": format!("W{}", 2 * p)}),
                        json!({"id": format!("W{}", 2 * p + 1)}),
                    ],
                    Some(format!("cursor-{}", p + 1)),
                )
            })
            .collect();
        let provider = Arc::new(
            MockProvider::new().stub_pages("works|filter|institutions.ror:r1", pages),
        );
        let mut store = ResultStore::new();

        retrieve(
            provider.clone() as Arc<dyn Provider>,
            &test_config(),
            vec![filter_descriptor(
                EntityKind::Work,
                FieldKind::Ror,
                "institutions.ror",
                "r1",
            )],
            &mut store,
        )
        .await;

        assert_eq!(store.bucket(EntityKind::Work).unwrap().len(), 6);
        // three pages fetched, not ten
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn one_failing_descriptor_does_not_abort_the_rest() {
        let provider = MockProvider::new()
            .stub_failure("works|filter|doi:10.1000/broken")
            .stub_pages(
                "works|filter|doi:10.1000/ok",
                vec![Page::new(vec![json!({"id": "W9"})], None)],
            );
        let provider = Arc::new(provider);
        let mut store = ResultStore::new();

        let diagnostics = retrieve(
            provider as Arc<dyn Provider>,
            &test_config(),
            vec![
                filter_descriptor(EntityKind::Work, FieldKind::Doi, "doi", "10.1000/broken"),
                filter_descriptor(EntityKind::Work, FieldKind::Doi, "doi", "10.1000/ok"),
            ],
            &mut store,
        )
        .await;

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ProviderFailure);
        assert_eq!(diagnostics[0].field, Some(FieldKind::Doi));
        assert_eq!(store.bucket(EntityKind::Work).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_descriptor_degrades_without_aborting_the_rest() {
        let provider = MockProvider::new()
            .stub_delay(
                "works|filter|doi:10.1000/slow",
                Duration::from_secs(600),
            )
            .stub_pages(
                "works|filter|institutions.ror:r1",
                vec![Page::new(vec![json!({"id": "W7"})], None)],
            );
        let provider = Arc::new(provider);
        let mut store = ResultStore::new();

        let config = HarvesterConfig {
            descriptor_timeout_secs: 5,
            ..test_config()
        };
        let diagnostics = retrieve(
            provider as Arc<dyn Provider>,
            &config,
            vec![
                filter_descriptor(EntityKind::Work, FieldKind::Doi, "doi", "10.1000/slow"),
                filter_descriptor(EntityKind::Work, FieldKind::Ror, "institutions.ror", "r1"),
            ],
            &mut store,
        )
        .await;

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Timeout);
        assert_eq!(diagnostics[0].field, Some(FieldKind::Doi));
        // the sibling descriptor still merged its record
        assert_eq!(store.bucket(EntityKind::Work).unwrap().len(), 1);
        assert!(store.get(EntityKind::Work, "W7").is_some());
    }

    #[tokio::test]
    async fn records_without_an_id_are_dropped() {
        let provider = Arc::new(MockProvider::new().stub_pages(
            "works|filter|doi:10.1000/1",
            vec![Page::new(
                vec![json!({"id": "W1"}), json!({"title": "no id here"})],
                None,
            )],
        ));
        let mut store = ResultStore::new();

        retrieve(
            provider as Arc<dyn Provider>,
            &test_config(),
            vec![filter_descriptor(EntityKind::Work, FieldKind::Doi, "doi", "10.1000/1")],
            &mut store,
        )
        .await;

        assert_eq!(store.bucket(EntityKind::Work).unwrap().len(), 1);
    }
}
