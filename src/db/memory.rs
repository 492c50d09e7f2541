use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{compare_values, Direction, Document, DocumentStore, Fields, Precondition, Query, StoreError};

/// Process-local document store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, Fields>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn create(&self, collection: &str, id: &str, data: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::AlreadyExists);
        }
        docs.insert(id.to_string(), data);
        Ok(())
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(Precondition::FieldEquals(field, expected)) = &precondition {
            let current = docs.get(id).ok_or(StoreError::NotFound)?;
            if current.get(field) != Some(expected) {
                return Err(StoreError::PreconditionFailed);
            }
        }

        let doc = docs.entry(id.to_string()).or_default();
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, data)| query.matches(data))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        match &query.order_by {
            Some((field, direction)) => {
                matched.sort_by(|a, b| {
                    let ord = compare_values(a.data.get(field), b.data.get(field))
                        .then_with(|| a.id.cmp(&b.id));
                    match direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                });
            }
            None => matched.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = InMemoryDocumentStore::new();
        store.create("jobs", "a", fields(json!({"n": 1}))).await.unwrap();
        let err = store.create("jobs", "a", fields(json!({"n": 2}))).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_merge_keeps_unrelated_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .merge("cache", "k", fields(json!({"payload": 1, "owner": "x"})), None)
            .await
            .unwrap();
        store
            .merge("cache", "k", fields(json!({"payload": 2})), None)
            .await
            .unwrap();
        let doc = store.get("cache", "k").await.unwrap().unwrap();
        assert_eq!(doc.data["payload"], 2);
        assert_eq!(doc.data["owner"], "x");
    }

    #[tokio::test]
    async fn test_merge_precondition() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .merge(
                "jobs",
                "missing",
                fields(json!({"v": 1})),
                Some(Precondition::FieldEquals("version".into(), json!(0))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        store.create("jobs", "a", fields(json!({"version": 1}))).await.unwrap();
        let err = store
            .merge(
                "jobs",
                "a",
                fields(json!({"version": 2})),
                Some(Precondition::FieldEquals("version".into(), json!(0))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed));

        store
            .merge(
                "jobs",
                "a",
                fields(json!({"version": 2})),
                Some(Precondition::FieldEquals("version".into(), json!(1))),
            )
            .await
            .unwrap();
        assert_eq!(store.get("jobs", "a").await.unwrap().unwrap().data["version"], 2);
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let store = InMemoryDocumentStore::new();
        for (id, user, at) in [("a", "u1", 3), ("b", "u2", 1), ("c", "u1", 5), ("d", "u1", 4)] {
            store
                .create("jobs", id, fields(json!({"userId": user, "at": at})))
                .await
                .unwrap();
        }

        let query = Query::new()
            .filter_eq("userId", "u1")
            .order_by("at", Direction::Descending)
            .limit(2);
        let ids: Vec<String> = store
            .query("jobs", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["c", "d"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        store.create("jobs", "a", Fields::new()).await.unwrap();
        store.delete("jobs", "a").await.unwrap();
        store.delete("jobs", "a").await.unwrap();
        assert!(store.get("jobs", "a").await.unwrap().is_none());
    }
}
