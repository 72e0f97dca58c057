use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{apply_updates, Document, DocumentStore, Fields, FieldUpdate, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    fields: Fields,
}

/// In-process document store keyed by (collection, id).
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(String, String), Entry>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `StoreError::Unavailable`.
    #[cfg(test)]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store rejecting writes".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(collection.to_string(), id.to_string()))
            .map(|entry| Document {
                id: id.to_string(),
                version: entry.version,
                fields: entry.fields.clone(),
            }))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<u64, StoreError> {
        self.check_writable()?;
        let mut documents = self.documents.write().await;
        let entry = documents
            .entry((collection.to_string(), id.to_string()))
            .or_insert(Entry {
                version: 0,
                fields: Fields::new(),
            });
        entry.version += 1;
        entry.fields = fields;
        Ok(entry.version)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: &[FieldUpdate],
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.check_writable()?;
        let mut documents = self.documents.write().await;
        let entry = documents
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let Some(expected) = expected_version {
            if entry.version != expected {
                return Err(StoreError::VersionConflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    actual: entry.version,
                });
            }
        }

        // Apply to a copy so a failed delta leaves the document untouched.
        let mut fields = entry.fields.clone();
        apply_updates(collection, id, &mut fields, updates)?;
        entry.fields = fields;
        entry.version += 1;
        Ok(entry.version)
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
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get_document("locations", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_bumps_version() {
        let store = MemoryStore::new();
        assert_eq!(store.set_document("votes", "a_b", fields(json!({}))).await.unwrap(), 1);
        assert_eq!(store.set_document("votes", "a_b", fields(json!({}))).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_document("locations", "x", &[FieldUpdate::increment("upvotes", 1)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        store
            .set_document("locations", "x", fields(json!({ "rating": 0.0 })))
            .await
            .unwrap();
        store
            .update_document("locations", "x", &[FieldUpdate::set("rating", 3.0)], Some(1))
            .await
            .unwrap();

        let err = store
            .update_document("locations", "x", &[FieldUpdate::set("rating", 1.0)], Some(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 1, actual: 2, .. }
        ));
        let doc = store.get_document("locations", "x").await.unwrap().unwrap();
        assert_eq!(doc.fields["rating"], json!(3.0));
    }

    #[tokio::test]
    async fn test_failed_delta_leaves_document_untouched() {
        let store = MemoryStore::new();
        store
            .set_document("locations", "x", fields(json!({ "upvotes": 1, "downvotes": "bad" })))
            .await
            .unwrap();
        let result = store
            .update_document(
                "locations",
                "x",
                &[
                    FieldUpdate::increment("upvotes", 1),
                    FieldUpdate::increment("downvotes", 1),
                ],
                None,
            )
            .await;
        assert!(result.is_err());
        let doc = store.get_document("locations", "x").await.unwrap().unwrap();
        assert_eq!(doc.fields["upvotes"], json!(1));
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store.set_document("votes", "a_b", Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
