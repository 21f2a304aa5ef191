//! Metadata provider clients.
//!
//! This module defines the [`Provider`] trait that provider clients
//! implement. The harvesting core hands a provider fully-built
//! [`QueryDescriptor`]s and consumes pages of opaque records back;
//! transport concerns (retries, backoff, polite-pool identification)
//! live entirely inside the client.

pub mod mock;
mod openalex;

pub use mock::MockProvider;
pub use openalex::OpenAlexProvider;

use async_trait::async_trait;
use serde_json::Value;

use crate::harvest::query::QueryDescriptor;
use crate::models::{EntityKind, FieldKind};

/// One page of records for a paginated query.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Raw records in whatever shape the provider returns them
    pub records: Vec<Value>,
    /// Cursor for the next page, `None` when this page is the last
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(records: Vec<Value>, next_cursor: Option<String>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }
}

/// A scholarly-metadata provider client.
///
/// Implementations expose their entity capability map and supported
/// search fields statically, a single-record lookup, and a cursor-based
/// page fetch. Pages within one descriptor must be requested in order;
/// distinct descriptors are independent.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this provider (used in registry keys)
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Provider endpoint handle for an entity, `None` when the entity
    /// is outside this provider's capability set.
    fn entity_endpoint(&self, entity: EntityKind) -> Option<&'static str>;

    /// Search fields this provider accepts.
    fn supported_fields(&self) -> &[FieldKind];

    /// Fetch a single record by provider-native ID.
    async fn fetch_record(&self, entity: EntityKind, id: &str) -> Result<Value, ProviderError>;

    /// Fetch one page for a descriptor. `cursor` is `None` for the
    /// first page; subsequent pages pass the previous page's cursor.
    async fn fetch_page(
        &self,
        descriptor: &QueryDescriptor,
        per_page: usize,
        cursor: Option<&str>,
    ) -> Result<Page, ProviderError>;
}

/// Errors that can occur when talking to a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network or transport error
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status after retries were exhausted
    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Record not found
    #[error("not found: {0}")]
    NotFound(String),

    /// The descriptor cannot be executed by this provider
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(format!("JSON: {}", err))
    }
}
