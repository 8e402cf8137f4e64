//! Async document store trait.
//!
//! A keyed, collection-partitioned CRUD store. Every update goes through
//! [`DocumentStore::modify`], a read-mutate-write that implementations must
//! run atomically per document. That atomic step is the only serialization
//! point the orchestrator relies on.

use ::async_trait::async_trait;
use arena_core::ArenaResult;
use serde_json::Value;
use std::fmt;

// ============================================================================
// COLLECTIONS
// ============================================================================

/// Collection label partitioning the document space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Agents,
    Battles,
    /// Companion system logs of battles
    System,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Agents => "agents",
            Collection::Battles => "battles",
            Collection::System => "system",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-place mutation applied to a freshly read document. Returning an error
/// aborts the write and leaves the stored document untouched.
pub type Mutation = Box<dyn FnOnce(&mut Value) -> ArenaResult<()> + Send>;

// ============================================================================
// STORE TRAIT
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails if the id is already taken.
    async fn insert(&self, collection: Collection, id: &str, doc: Value) -> ArenaResult<()>;

    /// Read a document by id.
    async fn get(&self, collection: Collection, id: &str) -> ArenaResult<Option<Value>>;

    /// All documents of a collection, ordered by id.
    async fn list(&self, collection: Collection) -> ArenaResult<Vec<Value>>;

    /// Atomically read, mutate and write back one document. Returns the
    /// document as written.
    async fn modify(&self, collection: Collection, id: &str, mutation: Mutation)
        -> ArenaResult<Value>;

    /// Shallow read-merge-write: top-level keys of `patch` replace those of
    /// the stored document.
    async fn merge(&self, collection: Collection, id: &str, patch: Value) -> ArenaResult<Value> {
        self.modify(
            collection,
            id,
            Box::new(move |doc| {
                merge_patch(doc, patch);
                Ok(())
            }),
        )
        .await
    }

    /// Connectivity probe used by readiness checks.
    async fn ping(&self) -> ArenaResult<()> {
        Ok(())
    }
}

/// Merge the top-level keys of `patch` into `doc`.
pub fn merge_patch(doc: &mut Value, patch: Value) {
    match (doc, patch) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                target.insert(key, value);
            }
        }
        (doc, patch) => *doc = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_replaces_top_level_keys() {
        let mut doc = json!({"a": 1, "b": {"x": 1}, "c": 3});
        merge_patch(&mut doc, json!({"b": {"y": 2}, "d": 4}));
        assert_eq!(doc, json!({"a": 1, "b": {"y": 2}, "c": 3, "d": 4}));
    }

    #[test]
    fn test_merge_patch_non_object_overwrites() {
        let mut doc = json!([1, 2]);
        merge_patch(&mut doc, json!({"a": 1}));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_collection_labels() {
        assert_eq!(Collection::Agents.to_string(), "agents");
        assert_eq!(Collection::Battles.as_str(), "battles");
        assert_eq!(Collection::System.as_str(), "system");
    }

    proptest! {
        #[test]
        fn prop_merge_patch_keeps_untouched_keys(
            base in proptest::collection::btree_map("[a-e]", 0i64..100, 0..5),
            patch in proptest::collection::btree_map("[c-h]", 0i64..100, 0..5),
        ) {
            let mut doc = json!(base);
            merge_patch(&mut doc, json!(patch));

            for (key, value) in &patch {
                prop_assert_eq!(&doc[key], &json!(value));
            }
            for (key, value) in base.iter().filter(|(k, _)| !patch.contains_key(*k)) {
                prop_assert_eq!(&doc[key], &json!(value));
            }
        }
    }
}
