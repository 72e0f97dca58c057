//! Document store capability consumed by the voting engine.
//!
//! The engine never talks to a database directly: it is handed an
//! `Arc<dyn DocumentStore>` at construction. `MemoryStore` backs tests and
//! local runs, `PgDocumentStore` keeps documents as `jsonb` rows in Postgres.
//!
//! Every document carries a `version` that increases by one per write, which
//! callers may pass back as `expected_version` to make an update conditional.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub fields: Fields,
}

impl Document {
    /// Decodes the document fields into a typed record.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::InvalidRecord {
                collection: collection.to_string(),
                id: self.id.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// A single field change in an `update_document` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDelta {
    /// Overwrite the field with an absolute value.
    Set(Value),
    /// Add a signed amount to a counter field. A missing field counts as 0
    /// and the result never drops below 0.
    Increment(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub delta: FieldDelta,
}

impl FieldUpdate {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            delta: FieldDelta::Set(value.into()),
        }
    }

    pub fn increment(field: &str, by: i64) -> Self {
        Self {
            field: field.to_string(),
            delta: FieldDelta::Increment(by),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Version conflict on {collection}/{id}: expected {expected}, found {actual}")]
    VersionConflict {
        collection: String,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid record {collection}/{id}: {reason}")]
    InvalidRecord {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns `None` when the document does not exist.
    async fn get_document(&self, collection: &str, id: &str)
        -> Result<Option<Document>, StoreError>;

    /// Creates or replaces a document. Returns the new version.
    async fn set_document(&self, collection: &str, id: &str, fields: Fields)
        -> Result<u64, StoreError>;

    /// Applies all updates atomically to an existing document. When
    /// `expected_version` is given the write only happens if the stored
    /// version still matches. Returns the new version.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: &[FieldUpdate],
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;
}

/// Applies field updates in order. Shared by every backend so increments
/// behave the same everywhere.
pub fn apply_updates(
    collection: &str,
    id: &str,
    fields: &mut Fields,
    updates: &[FieldUpdate],
) -> Result<(), StoreError> {
    for update in updates {
        match &update.delta {
            FieldDelta::Set(value) => {
                fields.insert(update.field.clone(), value.clone());
            }
            FieldDelta::Increment(by) => {
                let current = match fields.get(&update.field) {
                    None | Some(Value::Null) => 0,
                    Some(value) => value.as_i64().ok_or_else(|| StoreError::InvalidRecord {
                        collection: collection.to_string(),
                        id: id.to_string(),
                        reason: format!("field '{}' is not an integer: {value}", update.field),
                    })?,
                };
                // Counters are non-negative; a decrement past 0 stops at 0.
                fields.insert(update.field.clone(), Value::from((current + by).max(0)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_increment_missing_field_starts_at_zero() {
        let mut f = fields(json!({}));
        apply_updates("locations", "a", &mut f, &[FieldUpdate::increment("upvotes", 1)]).unwrap();
        assert_eq!(f["upvotes"], json!(1));
    }

    #[test]
    fn test_increment_and_decrement_in_one_call() {
        let mut f = fields(json!({ "upvotes": 3, "downvotes": 1 }));
        apply_updates(
            "locations",
            "a",
            &mut f,
            &[
                FieldUpdate::increment("downvotes", 1),
                FieldUpdate::increment("upvotes", -1),
            ],
        )
        .unwrap();
        assert_eq!(f["upvotes"], json!(2));
        assert_eq!(f["downvotes"], json!(2));
    }

    #[test]
    fn test_increment_rejects_non_integer_field() {
        let mut f = fields(json!({ "upvotes": "lots" }));
        let err = apply_updates("locations", "a", &mut f, &[FieldUpdate::increment("upvotes", 1)])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[test]
    fn test_decrement_stops_at_zero() {
        let mut f = fields(json!({ "upvotes": 0, "downvotes": 2 }));
        apply_updates(
            "locations",
            "a",
            &mut f,
            &[
                FieldUpdate::increment("upvotes", -1),
                FieldUpdate::increment("downvotes", 1),
            ],
        )
        .unwrap();
        assert_eq!(f["upvotes"], json!(0));
        assert_eq!(f["downvotes"], json!(3));
    }

    #[test]
    fn test_set_overwrites_value() {
        let mut f = fields(json!({ "rating": 2.5 }));
        apply_updates("locations", "a", &mut f, &[FieldUpdate::set("rating", 4.0)]).unwrap();
        assert_eq!(f["rating"], json!(4.0));
    }
}
