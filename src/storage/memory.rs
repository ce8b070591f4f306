//! In-memory document sink.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{Collection, DocumentSink, StorageError};

/// Keeps documents in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
    failing: Mutex<HashSet<Collection>>,
    cleared: Mutex<Vec<Collection>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserts into `collection` fail.
    pub fn fail_inserts(&self, collection: Collection) {
        self.failing.lock().unwrap().insert(collection);
    }

    /// Documents currently stored in `collection`.
    pub fn documents(&self, collection: Collection) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Collections cleared so far, in call order.
    pub fn cleared(&self) -> Vec<Collection> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn clear(&self, collection: Collection) -> Result<(), StorageError> {
        self.collections.lock().unwrap().remove(&collection);
        self.cleared.lock().unwrap().push(collection);
        Ok(())
    }

    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Value>,
    ) -> Result<usize, StorageError> {
        if self.failing.lock().unwrap().contains(&collection) {
            return Err(StorageError::Backend(format!(
                "insert into {} rejected",
                collection
            )));
        }

        let count = documents.len();
        self.collections
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .extend(documents);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_clear() {
        let sink = MemorySink::new();
        sink.insert_many(Collection::RawArticles, vec![json!({"a": 1}), json!({"a": 2})])
            .await
            .unwrap();
        sink.insert_one(Collection::RawArticles, json!({"a": 3}))
            .await
            .unwrap();
        assert_eq!(sink.documents(Collection::RawArticles).len(), 3);

        sink.clear(Collection::RawArticles).await.unwrap();
        assert!(sink.documents(Collection::RawArticles).is_empty());
        assert_eq!(sink.cleared(), vec![Collection::RawArticles]);
    }

    #[tokio::test]
    async fn test_failing_collection() {
        let sink = MemorySink::new();
        sink.fail_inserts(Collection::GapAnalysis);

        let result = sink.insert_one(Collection::GapAnalysis, json!({})).await;
        assert!(matches!(result, Err(StorageError::Backend(_))));
        assert!(sink
            .insert_one(Collection::Comparison, json!({}))
            .await
            .is_ok());
    }
}
