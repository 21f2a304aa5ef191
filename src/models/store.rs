//! Entity-bucketed result store.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::EntityKind;

/// Accumulated harvest results, keyed twice: by the entity's plural
/// bucket name, then by the provider's native record ID within the
/// bucket. Merging is idempotent; a later write for the same key
/// replaces the earlier record.
///
/// Constructed fresh per harvester instance and owned exclusively by
/// it; only the aggregation engine inserts into it.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ResultStore {
    buckets: HashMap<String, HashMap<String, Value>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its native ID, last write wins.
    pub fn insert(&mut self, entity: EntityKind, native_id: impl Into<String>, record: Value) {
        self.buckets
            .entry(entity.bucket().to_string())
            .or_default()
            .insert(native_id.into(), record);
    }

    /// Records for one entity bucket, if any were harvested.
    pub fn bucket(&self, entity: EntityKind) -> Option<&HashMap<String, Value>> {
        self.buckets.get(entity.bucket())
    }

    /// Look up a single record by entity and native ID.
    pub fn get(&self, entity: EntityKind, native_id: &str) -> Option<&Value> {
        self.bucket(entity).and_then(|b| b.get(native_id))
    }

    /// Iterate over all populated buckets.
    pub fn buckets(&self) -> impl Iterator<Item = (&str, &HashMap<String, Value>)> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total record count across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(HashMap::is_empty)
    }

    /// Drop every bucket. Used by forced refresh.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_is_last_write_wins() {
        let mut store = ResultStore::new();
        store.insert(EntityKind::Work, "W1", json!({"id": "W1", "v": 1}));
        store.insert(EntityKind::Work, "W1", json!({"id": "W1", "v": 2}));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(EntityKind::Work, "W1").unwrap()["v"], 2);
    }

    #[test]
    fn buckets_are_keyed_by_plural_name() {
        let mut store = ResultStore::new();
        store.insert(EntityKind::Author, "A1", json!({"id": "A1"}));

        let (name, bucket) = store.buckets().next().unwrap();
        assert_eq!(name, "authors");
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn clear_empties_every_bucket() {
        let mut store = ResultStore::new();
        store.insert(EntityKind::Work, "W1", json!({"id": "W1"}));
        store.insert(EntityKind::Author, "A1", json!({"id": "A1"}));
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }
}
