use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{DocumentStore, FieldUpdate, Fields, Order, StoreError, sort_documents};

/// In-process store. BTreeMaps keep query iteration in id order so repeated
/// bounded scans see the same documents.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Fields>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
        order_by: Option<(&str, Order)>,
        limit: Option<usize>,
    ) -> Result<Vec<Fields>, StoreError> {
        let collections = self.collections.lock().await;
        let mut matches = Vec::new();

        if let Some(documents) = collections.get(collection) {
            for fields in documents.values() {
                if filters.iter().all(|(name, value)| fields.get(*name) == Some(value)) {
                    matches.push(fields.clone());

                    // sorted scans see every match before the bound applies
                    if order_by.is_none() && limit.is_some_and(|limit| matches.len() >= limit) {
                        break;
                    }
                }
            }
        }

        if let Some((field, order)) = order_by {
            sort_documents(&mut matches, field, order);
        }
        if let Some(limit) = limit {
            matches.truncate(limit);
        }

        Ok(matches)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: &[(&str, FieldUpdate)],
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::Missing {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (name, update) in updates {
            match update {
                FieldUpdate::Set(value) => {
                    document.insert(name.to_string(), value.clone());
                }
                FieldUpdate::Increment(delta) => {
                    let current = match document.get(*name) {
                        None => 0,
                        Some(value) => value
                            .as_i64()
                            .ok_or_else(|| StoreError::BadUpdate(name.to_string()))?,
                    };
                    document.insert(name.to_string(), Value::from(current + delta));
                }
            }
        }

        Ok(())
    }

    async fn add_to_set(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.lock().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::Missing {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let entry = document
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(members) = entry else {
            return Err(StoreError::BadUpdate(field.to_string()));
        };

        if members.iter().any(|value| value.as_str() == Some(member)) {
            return Ok(false);
        }

        members.push(Value::String(member.to_string()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn get_returns_none_for_absent_document() {
        let store = MemoryStore::new();
        assert!(store.get("things", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn increment_assumes_zero_for_missing_field() {
        let store = MemoryStore::new();
        store.create("things", "a", doc(&[])).await.unwrap();

        store
            .update("things", "a", &[("count", FieldUpdate::Increment(5))])
            .await
            .unwrap();

        let fields = store.get("things", "a").await.unwrap().unwrap();
        assert_eq!(fields.get("count"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("things", "a", &[("count", FieldUpdate::Increment(1))])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
    }

    #[tokio::test]
    async fn add_to_set_is_conditional() {
        let store = MemoryStore::new();
        store
            .create("things", "a", doc(&[("tags", json!([]))]))
            .await
            .unwrap();

        assert!(store.add_to_set("things", "a", "tags", "x").await.unwrap());
        assert!(!store.add_to_set("things", "a", "tags", "x").await.unwrap());
        assert!(store.add_to_set("things", "a", "tags", "y").await.unwrap());

        let fields = store.get("things", "a").await.unwrap().unwrap();
        assert_eq!(fields.get("tags"), Some(&json!(["x", "y"])));
    }

    #[tokio::test]
    async fn query_filters_and_bounds() {
        let store = MemoryStore::new();
        for (id, color) in [("a", "red"), ("b", "blue"), ("c", "red"), ("d", "red")] {
            store
                .create("things", id, doc(&[("color", json!(color)), ("id", json!(id))]))
                .await
                .unwrap();
        }

        let reds = store
            .query("things", &[("color", json!("red"))], None, Some(2))
            .await
            .unwrap();
        assert_eq!(reds.len(), 2);

        // id order makes the bounded scan repeatable
        let again = store
            .query("things", &[("color", json!("red"))], None, Some(2))
            .await
            .unwrap();
        assert_eq!(reds, again);
    }

    #[tokio::test]
    async fn query_sorts_before_bounding() {
        let store = MemoryStore::new();
        for (id, rank) in [("a", 3), ("b", 1), ("c", 2)] {
            store
                .create("things", id, doc(&[("rank", json!(rank))]))
                .await
                .unwrap();
        }

        let top = store
            .query("things", &[], Some(("rank", Order::Descending)), Some(2))
            .await
            .unwrap();
        let ranks: Vec<_> = top.iter().map(|f| f.get("rank").unwrap()).collect();
        assert_eq!(ranks, vec![&json!(3), &json!(2)]);

        let bottom = store
            .query("things", &[], Some(("rank", Order::Ascending)), Some(1))
            .await
            .unwrap();
        assert_eq!(bottom[0].get("rank"), Some(&json!(1)));
    }
}
