//! In-memory document store.

use crate::document::{Collection, DocumentStore, Mutation};
use ::async_trait::async_trait;
use arena_core::{ArenaResult, StorageError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Process-local document store.
///
/// Documents live in one `BTreeMap` per collection behind a single async
/// `RwLock`. `modify` holds the write lock across read, mutation and write,
/// so concurrent updates to one document are serialized.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: Collection, id: &str, doc: Value) -> ArenaResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(id) {
            return Err(StorageError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> ArenaResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn list(&self, collection: Collection) -> ArenaResult<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn modify(
        &self,
        collection: Collection,
        id: &str,
        mutation: Mutation,
    ) -> ArenaResult<Value> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StorageError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let mut working = stored.clone();
        mutation(&mut working)?;
        *stored = working.clone();
        Ok(working)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::ArenaError;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_get_list() -> ArenaResult<()> {
        let store = InMemoryDocumentStore::new();
        store.insert(Collection::Agents, "b", json!({"n": 2})).await?;
        store.insert(Collection::Agents, "a", json!({"n": 1})).await?;
        store.insert(Collection::Battles, "a", json!({"n": 3})).await?;

        assert_eq!(store.get(Collection::Agents, "a").await?, Some(json!({"n": 1})));
        assert_eq!(store.get(Collection::System, "a").await?, None);
        assert_eq!(
            store.list(Collection::Agents).await?,
            vec![json!({"n": 1}), json!({"n": 2})]
        );
        assert_eq!(store.count(Collection::Battles).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() -> ArenaResult<()> {
        let store = InMemoryDocumentStore::new();
        store.insert(Collection::Agents, "a", json!({})).await?;
        let err = store
            .insert(Collection::Agents, "a", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArenaError::Storage(StorageError::AlreadyExists { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document() -> ArenaResult<()> {
        let store = InMemoryDocumentStore::new();
        store.insert(Collection::Battles, "x", json!({"state": "finished"})).await?;
        let result = store
            .modify(
                Collection::Battles,
                "x",
                Box::new(|doc| {
                    doc["state"] = json!("running");
                    Err(StorageError::PreconditionFailed {
                        collection: "battles".into(),
                        id: "x".into(),
                        reason: "terminal".into(),
                    }
                    .into())
                }),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(
            store.get(Collection::Battles, "x").await?,
            Some(json!({"state": "finished"}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_modify_missing_document() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .merge(Collection::Agents, "ghost", json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::Storage(StorageError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_modifications_are_serialized() -> ArenaResult<()> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert(Collection::System, "log", json!({"entries": []})).await?;

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .modify(
                        Collection::System,
                        "log",
                        Box::new(move |doc| {
                            if let Some(entries) = doc["entries"].as_array_mut() {
                                entries.push(json!(i));
                            }
                            Ok(())
                        }),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked")?;
        }

        let doc = store.get(Collection::System, "log").await?.unwrap_or_default();
        assert_eq!(doc["entries"].as_array().map(Vec::len), Some(32));
        Ok(())
    }
}
