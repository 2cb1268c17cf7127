use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Document, DocumentStore, StoreError};

/// In-memory store used by unit tests and `AppState::fake()`. Every operation
/// runs under one mutex, which gives it the same single-document atomicity
/// the real backend provides.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(fields: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(wanted) => wanted
            .iter()
            .all(|(k, v)| fields.get(k).map(|have| have == v).unwrap_or(false)),
        None => false,
    }
}

fn merge(fields: &mut Value, patch: Value) {
    if let (Some(target), Some(patch)) = (fields.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        let mut all = self.collections.lock().unwrap();
        let coll = all.entry(collection.to_string()).or_default();
        if coll.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        coll.insert(id.to_string(), fields);
        Ok(())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let all = self.collections.lock().unwrap();
        Ok(all.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<Document>, StoreError> {
        let all = self.collections.lock().unwrap();
        Ok(all.get(collection).and_then(|c| {
            c.iter().find(|(_, fields)| matches(fields, &filter)).map(
                |(id, fields)| Document {
                    id: id.clone(),
                    fields: fields.clone(),
                },
            )
        }))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Vec<Document>, StoreError> {
        let all = self.collections.lock().unwrap();
        Ok(all
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, fields)| matches(fields, &filter))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<bool, StoreError> {
        let mut all = self.collections.lock().unwrap();
        match all.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(fields) => {
                merge(fields, patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: Value,
        patch: Value,
    ) -> Result<bool, StoreError> {
        let mut all = self.collections.lock().unwrap();
        match all.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(fields) if fields.get(guard_field) == Some(&expected) => {
                merge(fields, patch);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn adjust(
        &self,
        collection: &str,
        id: &str,
        deltas: &[(&str, i64)],
    ) -> Result<(), StoreError> {
        let mut all = self.collections.lock().unwrap();
        let coll = all.entry(collection.to_string()).or_default();
        let fields = coll
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(obj) = fields.as_object_mut() {
            for (field, delta) in deltas {
                let current = obj.get(*field).and_then(Value::as_i64).unwrap_or(0);
                obj.insert(field.to_string(), Value::from(current + delta));
            }
        }
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut all = self.collections.lock().unwrap();
        Ok(all
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = MemoryStore::new();
        store.create("users", "a", json!({"n": 1})).await.unwrap();
        let err = store.create("users", "a", json!({"n": 2})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_merges_and_reports_absence() {
        let store = MemoryStore::new();
        store
            .create("c", "x", json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        assert!(store.update("c", "x", json!({"b": 3, "c": 4})).await.unwrap());
        let fields = store.read("c", "x").await.unwrap().unwrap();
        assert_eq!(fields, json!({"a": 1, "b": 3, "c": 4}));
        assert!(!store.update("c", "missing", json!({"a": 1})).await.unwrap());
    }

    #[tokio::test]
    async fn update_if_only_applies_when_guard_matches() {
        let store = MemoryStore::new();
        store
            .create("c", "x", json!({"consumed": false}))
            .await
            .unwrap();
        assert!(store
            .update_if("c", "x", "consumed", json!(false), json!({"consumed": true}))
            .await
            .unwrap());
        // Second attempt loses: the guard no longer matches.
        assert!(!store
            .update_if("c", "x", "consumed", json!(false), json!({"consumed": true}))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn adjust_upserts_and_accumulates() {
        let store = MemoryStore::new();
        store.adjust("tallies", "t", &[("upvotes", 1)]).await.unwrap();
        store
            .adjust("tallies", "t", &[("upvotes", -1), ("downvotes", 1)])
            .await
            .unwrap();
        let fields = store.read("tallies", "t").await.unwrap().unwrap();
        assert_eq!(fields, json!({"upvotes": 0, "downvotes": 1}));
    }

    #[tokio::test]
    async fn find_one_matches_all_filter_fields() {
        let store = MemoryStore::new();
        store
            .create("r", "1", json!({"email": "a@x.com", "consumed": true}))
            .await
            .unwrap();
        store
            .create("r", "2", json!({"email": "a@x.com", "consumed": false}))
            .await
            .unwrap();
        let doc = store
            .find_one("r", json!({"email": "a@x.com", "consumed": false}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.id, "2");
    }
}
