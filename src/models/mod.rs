//! Core data models for search requests and harvested results.

mod request;
mod store;

pub use request::{EntityKind, FieldKind, RequestError, RequestInput, SearchRequest};
pub use store::ResultStore;
