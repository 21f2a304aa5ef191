//! # Scholar Harvester
//!
//! Batched identifier lookup and result harvesting against scholarly
//! metadata providers.
//!
//! Heterogeneous lookup requests (DOIs, ORCIDs, ROR IDs, provider IDs,
//! free-text names) are normalized into typed search requests, grouped
//! into the minimum number of provider queries under a per-query
//! identifier cap, and the paginated results are accumulated into a
//! deduplicated, entity-keyed store.
//!
//! ## Architecture
//!
//! - [`models`]: Typed request model and the entity-keyed result store
//! - [`harvest`]: Request collection, query planner/builder, the
//!   pagination engine, and the [`Harvester`] façade
//! - [`providers`]: Provider clients behind the [`Provider`] trait
//!   (OpenAlex, plus a scripted mock)
//! - [`registry`]: Enable/disable harvesters per configured provider
//! - [`config`]: TOML settings with environment overrides

pub mod config;
pub mod harvest;
pub mod models;
pub mod providers;
pub mod registry;

// Re-export commonly used types
pub use harvest::{Diagnostic, DiagnosticKind, HarvestError, Harvester};
pub use models::{EntityKind, FieldKind, RequestInput, ResultStore, SearchRequest};
pub use providers::Provider;
pub use registry::HarvesterRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
