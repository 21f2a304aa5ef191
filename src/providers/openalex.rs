//! OpenAlex provider client.
//!
//! Speaks the OpenAlex REST API: exact-match filters on (possibly
//! nested) attribute paths, full-text search, and cursor pagination.
//! Retries against the configured status codes with exponential
//! backoff happen here, inside the client; the harvesting core never
//! sees a transient failure that a retry could absorb.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HarvesterConfig;
use crate::harvest::query::{FilterClause, QueryDescriptor, QuerySpec};
use crate::models::{EntityKind, FieldKind};
use crate::providers::{Page, Provider, ProviderError};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// First-page cursor sentinel defined by the OpenAlex API.
const INITIAL_CURSOR: &str = "*";

const SUPPORTED_FIELDS: &[FieldKind] = &[
    FieldKind::Id,
    FieldKind::ProviderId,
    FieldKind::Doi,
    FieldKind::Ror,
    FieldKind::Orcid,
    FieldKind::Name,
    FieldKind::Issn,
    FieldKind::Pmid,
];

/// OpenAlex metadata provider.
#[derive(Debug, Clone)]
pub struct OpenAlexProvider {
    client: Client,
    base_url: String,
    contact_email: String,
    max_retries: u32,
    retry_backoff_factor: f64,
    retry_http_codes: Vec<u16>,
}

impl OpenAlexProvider {
    /// Create a client from resolved harvester configuration. The
    /// contact email rides along on every request (polite pool).
    pub fn new(config: &HarvesterConfig) -> Self {
        let client = Client::builder()
            .user_agent(format!(
                "{}/{} (mailto:{})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                config.contact_email
            ))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: OPENALEX_API_BASE.to_string(),
            contact_email: config.contact_email.clone(),
            max_retries: config.max_retries,
            retry_backoff_factor: config.retry_backoff_factor,
            retry_http_codes: config.retry_http_codes.clone(),
        }
    }

    /// Override the API base URL (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn endpoint_for(&self, entity: EntityKind) -> Result<&'static str, ProviderError> {
        self.entity_endpoint(entity).ok_or_else(|| {
            ProviderError::InvalidQuery(format!("openalex does not expose {} entities", entity))
        })
    }

    fn filter_param(clauses: &[FilterClause]) -> String {
        clauses
            .iter()
            .map(|c| format!("{}:{}", c.attribute, c.value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// GET with retries on the configured status codes. Backoff grows
    /// as `factor * 2^attempt` seconds, matching the provider's own
    /// client libraries.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if self.retry_http_codes.contains(&status.as_u16())
                        && attempt < self.max_retries
                    {
                        let delay = self.retry_backoff_factor * 2f64.powi(attempt as i32);
                        debug!(url, attempt, delay, status = status.as_u16(), "retrying openalex request");
                        sleep(Duration::from_secs_f64(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ProviderError::NotFound(url.to_string()));
                    }
                    let message = response.text().await.unwrap_or_default();
                    warn!(url, status = status.as_u16(), "openalex request failed");
                    return Err(ProviderError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        let delay = self.retry_backoff_factor * 2f64.powi(attempt as i32);
                        debug!(url, attempt, delay, "retrying openalex request after transport error");
                        sleep(Duration::from_secs_f64(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAlexProvider {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn entity_endpoint(&self, entity: EntityKind) -> Option<&'static str> {
        match entity {
            EntityKind::Work => Some("works"),
            EntityKind::Author => Some("authors"),
            EntityKind::Source => Some("sources"),
            EntityKind::Publisher => Some("publishers"),
            EntityKind::Institution => Some("institutions"),
            EntityKind::Funder => Some("funders"),
            EntityKind::Topic => Some("topics"),
            EntityKind::Subfield => Some("subfields"),
            EntityKind::Field => Some("fields"),
            EntityKind::Domain => Some("domains"),
            _ => None,
        }
    }

    fn supported_fields(&self) -> &[FieldKind] {
        SUPPORTED_FIELDS
    }

    async fn fetch_record(&self, entity: EntityKind, id: &str) -> Result<Value, ProviderError> {
        let endpoint = self.endpoint_for(entity)?;
        let url = format!(
            "{}/{}",
            self.endpoint_url(endpoint),
            urlencoding::encode(id)
        );
        let query = [("mailto", self.contact_email.clone())];

        let response = self.get_with_retry(&url, &query).await?;
        let record: Value = response.json().await.map_err(|e| {
            ProviderError::Parse(format!("failed to decode record: {}", e))
        })?;
        Ok(record)
    }

    async fn fetch_page(
        &self,
        descriptor: &QueryDescriptor,
        per_page: usize,
        cursor: Option<&str>,
    ) -> Result<Page, ProviderError> {
        let endpoint = self.endpoint_for(descriptor.entity)?;
        let url = self.endpoint_url(endpoint);

        let mut query: Vec<(&str, String)> = Vec::new();
        match &descriptor.spec {
            QuerySpec::Get { id } => {
                // single-record lookups go through fetch_record
                return Err(ProviderError::InvalidQuery(format!(
                    "direct lookup of {} is not a paginated query",
                    id
                )));
            }
            QuerySpec::Filter { clauses } => {
                query.push(("filter", Self::filter_param(clauses)));
            }
            QuerySpec::Search { text, clauses } => {
                query.push(("search", text.clone()));
                if !clauses.is_empty() {
                    query.push(("filter", Self::filter_param(clauses)));
                }
            }
        }
        query.push(("per-page", per_page.to_string()));
        query.push(("cursor", cursor.unwrap_or(INITIAL_CURSOR).to_string()));
        query.push(("mailto", self.contact_email.clone()));

        let response = self.get_with_retry(&url, &query).await?;
        let page: PageResponse = response.json().await.map_err(|e| {
            ProviderError::Parse(format!("failed to decode page: {}", e))
        })?;

        Ok(Page::new(page.results, page.meta.next_cursor))
    }
}

// ===== OpenAlex API types =====

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_param_joins_clauses_with_commas() {
        let clauses = vec![
            FilterClause {
                attribute: "doi".to_string(),
                value: "10.1000/1|10.1000/2".to_string(),
            },
            FilterClause {
                attribute: "publication_year".to_string(),
                value: "2020".to_string(),
            },
        ];
        assert_eq!(
            OpenAlexProvider::filter_param(&clauses),
            "doi:10.1000/1|10.1000/2,publication_year:2020"
        );
    }

    #[test]
    fn capability_map_covers_the_ten_openalex_entities() {
        let provider = OpenAlexProvider::new(&HarvesterConfig::default());
        assert_eq!(provider.entity_endpoint(EntityKind::Work), Some("works"));
        assert_eq!(provider.entity_endpoint(EntityKind::Domain), Some("domains"));
        assert_eq!(provider.entity_endpoint(EntityKind::Project), None);
        assert_eq!(provider.entity_endpoint(EntityKind::Journal), None);
    }
}
