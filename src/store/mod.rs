//! Store Module - In-memory document collections

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Serialize, Deserialize};

/// A stored document: a store-assigned id plus a JSON payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

/// Document store keyed by collection name.
///
/// Each collection preserves insertion order, which is the authoritative
/// ordering for everything built on top of it. Individual operations are
/// atomic under the collection lock; nothing here spans two operations.
pub struct DocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a document, returning its assigned id.
    pub async fn insert(&self, collection: &str, data: serde_json::Value) -> Result<String, String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(Vec::new)
            .push(Document { id: id.clone(), data });
        Ok(id)
    }

    /// All documents matching the predicate, in insertion order.
    pub async fn find<F>(&self, collection: &str, predicate: F) -> Vec<Document>
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| predicate(&d.data))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First document matching the predicate.
    pub async fn find_one<F>(&self, collection: &str, predicate: F) -> Option<Document>
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let collections = self.collections.read().await;
        collections
            .get(collection)?
            .iter()
            .find(|d| predicate(&d.data))
            .cloned()
    }

    pub async fn find_by_id(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().await;
        collections
            .get(collection)?
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Replace the payload of the first matching document wholesale.
    /// The id and the document's position in the collection are kept.
    pub async fn update_one<F>(
        &self,
        collection: &str,
        predicate: F,
        data: serde_json::Value,
    ) -> Result<bool, String>
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            if let Some(doc) = docs.iter_mut().find(|d| predicate(&d.data)) {
                doc.data = data;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<bool, String> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            if let Some(doc) = docs.iter_mut().find(|d| d.id == id) {
                doc.data = data;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete the first matching document. Returns whether one was removed.
    pub async fn delete_one<F>(&self, collection: &str, predicate: F) -> Result<bool, String>
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            if let Some(pos) = docs.iter().position(|d| predicate(&d.data)) {
                docs.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, String> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            if let Some(pos) = docs.iter().position(|d| d.id == id) {
                docs.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_find_preserves_order() {
        let store = DocumentStore::new();
        store.insert("msgs", json!({"n": 1})).await.unwrap();
        store.insert("msgs", json!({"n": 2})).await.unwrap();
        store.insert("msgs", json!({"n": 3})).await.unwrap();

        let all = store.find("msgs", |_| true).await;
        let ns: Vec<i64> = all.iter().map(|d| d.data["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);

        let evens = store.find("msgs", |v| v["n"].as_i64().unwrap() % 2 == 0).await;
        assert_eq!(evens.len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_position() {
        let store = DocumentStore::new();
        store.insert("docs", json!({"k": "a"})).await.unwrap();
        let id = store.insert("docs", json!({"k": "b"})).await.unwrap();
        store.insert("docs", json!({"k": "c"})).await.unwrap();

        let updated = store
            .update_one("docs", |v| v["k"] == "b", json!({"k": "B"}))
            .await
            .unwrap();
        assert!(updated);

        let all = store.find("docs", |_| true).await;
        assert_eq!(all[1].id, id);
        assert_eq!(all[1].data["k"], "B");
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let store = DocumentStore::new();
        let id = store.insert("docs", json!({"k": "a"})).await.unwrap();
        assert!(store.delete_by_id("docs", &id).await.unwrap());
        assert!(!store.delete_by_id("docs", &id).await.unwrap());
        assert_eq!(store.count("docs").await, 0);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = DocumentStore::new();
        assert!(store.find("nope", |_| true).await.is_empty());
        assert!(store.find_one("nope", |_| true).await.is_none());
        assert!(!store.delete_one("nope", |_| true).await.unwrap());
        assert_eq!(store.count("nope").await, 0);
    }
}
