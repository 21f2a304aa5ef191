//! Configuration management.
//!
//! Settings come from an optional TOML file with environment-variable
//! overrides (`SCHOLAR_HARVESTER_*`). The harvester itself only ever
//! sees a resolved [`HarvesterConfig`], supplied once at construction
//! and read-only afterwards.
//!
//! ```toml
//! [harvester]
//! contact_email = "you@example.org"
//! max_retries = 3
//! retry_backoff_factor = 0.1
//! retry_http_codes = [429, 500, 503]
//! batch_size = 50
//! page_size = 200
//! max_pages = 10
//!
//! [[providers]]
//! name = "openalex"
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Resolved runtime configuration for one harvester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterConfig {
    /// Contact email forwarded to the provider (polite pool)
    #[serde(default = "default_contact_email")]
    pub contact_email: String,

    /// Retry attempts inside the provider client
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff factor between retries, in seconds
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,

    /// HTTP status codes eligible for a retry
    #[serde(default = "default_retry_http_codes")]
    pub retry_http_codes: Vec<u16>,

    /// Identifiers combined into one provider query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pages fetched per descriptor before the result cap kicks in
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Timeout budget per descriptor, in seconds
    #[serde(default = "default_descriptor_timeout_secs")]
    pub descriptor_timeout_secs: u64,

    /// Concurrent descriptor workers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl HarvesterConfig {
    /// Cumulative record cap per descriptor.
    pub fn max_results_per_query(&self) -> usize {
        self.page_size * self.max_pages
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            contact_email: default_contact_email(),
            max_retries: default_max_retries(),
            retry_backoff_factor: default_retry_backoff_factor(),
            retry_http_codes: default_retry_http_codes(),
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            descriptor_timeout_secs: default_descriptor_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_contact_email() -> String {
    std::env::var("SCHOLAR_HARVESTER_EMAIL").unwrap_or_else(|_| "user@example.com".to_string())
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_factor() -> f64 {
    0.1
}

fn default_retry_http_codes() -> Vec<u16> {
    vec![429, 500, 503]
}

fn default_batch_size() -> usize {
    50
}

fn default_page_size() -> usize {
    200
}

fn default_max_pages() -> usize {
    10
}

fn default_descriptor_timeout_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    4
}

/// One configured provider entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL override, mainly for tests and mirrors
    #[serde(default)]
    pub api_url: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub harvester: HarvesterConfig,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            harvester: HarvesterConfig::default(),
            providers: default_providers(),
        }
    }
}

fn default_providers() -> Vec<ProviderEntry> {
    vec![ProviderEntry {
        name: "openalex".to_string(),
        enabled: true,
        api_url: None,
    }]
}

/// Load settings from a TOML file, with `SCHOLAR_HARVESTER_*`
/// environment variables taking precedence.
pub fn load_settings(path: &Path) -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("SCHOLAR_HARVESTER").separator("__"))
        .build()?;

    settings.try_deserialize()
}
