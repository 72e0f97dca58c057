use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::aggregate::RatingAggregate;
use crate::store::{Document, Fields, StoreError};

pub const LOCATIONS: &str = "locations";

pub const MAX_RATING: f64 = 5.0;

/// A catalogued spot together with its vote and rating aggregates.
///
/// Aggregate fields default to zero so documents created before a first vote
/// or rating decode cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[serde(skip)]
    pub version: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub downvotes: u64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: u64,
}

impl Location {
    pub fn new(id: String, name: String, created_by: String) -> Self {
        Self {
            id,
            version: 0,
            name,
            created_by: Some(created_by),
            created_at: Some(Utc::now()),
            upvotes: 0,
            downvotes: 0,
            rating: 0.0,
            rating_count: 0,
        }
    }

    pub fn from_document(document: &Document) -> Result<Self, StoreError> {
        let mut location: Location = document.decode(LOCATIONS)?;
        location.id = document.id.clone();
        location.version = document.version;

        if !location.rating.is_finite() || !(0.0..=MAX_RATING).contains(&location.rating) {
            return Err(StoreError::InvalidRecord {
                collection: LOCATIONS.to_string(),
                id: document.id.clone(),
                reason: format!("rating {} outside [0, {MAX_RATING}]", location.rating),
            });
        }
        Ok(location)
    }

    /// Stored fields. The id lives in the document key, not in the body.
    pub fn to_fields(&self) -> Result<Fields, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(mut fields) => {
                fields.remove("id");
                Ok(fields)
            }
            other => Err(StoreError::InvalidRecord {
                collection: LOCATIONS.to_string(),
                id: self.id.clone(),
                reason: format!("expected an object, serialized to {other}"),
            }),
        }
    }

    pub fn rating_aggregate(&self) -> RatingAggregate {
        RatingAggregate {
            rating: self.rating,
            count: self.rating_count,
        }
    }
}

/// Read-side view of a location's aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStats {
    pub location_id: String,
    pub upvotes: u64,
    pub downvotes: u64,
    /// upvotes minus downvotes
    pub score: i64,
    pub rating: f64,
    pub rating_count: u64,
}

impl From<&Location> for LocationStats {
    fn from(location: &Location) -> Self {
        Self {
            location_id: location.id.clone(),
            upvotes: location.upvotes,
            downvotes: location.downvotes,
            score: location.upvotes as i64 - location.downvotes as i64,
            rating: location.rating,
            rating_count: location.rating_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(fields: Value) -> Document {
        Document {
            id: "loc-1".to_string(),
            version: 7,
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_missing_aggregates_default_to_zero() {
        let location = Location::from_document(&document(json!({ "name": "Old Mill" }))).unwrap();
        assert_eq!(location.id, "loc-1");
        assert_eq!(location.version, 7);
        assert_eq!(location.upvotes, 0);
        assert_eq!(location.rating_count, 0);
        assert_eq!(location.rating, 0.0);
    }

    #[test]
    fn test_negative_counter_is_rejected() {
        let err = Location::from_document(&document(json!({ "upvotes": -1 }))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[test]
    fn test_rating_above_five_is_rejected() {
        let err = Location::from_document(&document(json!({ "rating": 5.5 }))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[test]
    fn test_fields_use_camel_case_and_drop_id() {
        let location = Location::new("loc-1".into(), "Water Tower".into(), "alice".into());
        let fields = location.to_fields().unwrap();
        assert!(fields.get("id").is_none());
        assert_eq!(fields["ratingCount"], json!(0));
        assert_eq!(fields["createdBy"], json!("alice"));
    }

    #[test]
    fn test_stats_score_can_go_negative() {
        let mut location = Location::new("loc-1".into(), "Bunker".into(), "bob".into());
        location.upvotes = 1;
        location.downvotes = 3;
        assert_eq!(LocationStats::from(&location).score, -2);
    }
}
