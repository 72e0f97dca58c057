use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Document, Fields, StoreError};

pub const VOTES: &str = "votes";
pub const RATINGS: &str = "ratings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Upvote,
    Downvote,
}

impl VoteDirection {
    /// Location field tallying votes in this direction.
    pub fn counter_field(self) -> &'static str {
        match self {
            VoteDirection::Upvote => "upvotes",
            VoteDirection::Downvote => "downvotes",
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDirection::Upvote => write!(f, "upvote"),
            VoteDirection::Downvote => write!(f, "downvote"),
        }
    }
}

/// A star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct StarValue(u8);

impl StarValue {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for StarValue {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(StarValue(value as u8))
        } else {
            Err(format!(
                "star rating must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            ))
        }
    }
}

impl From<StarValue> for u8 {
    fn from(value: StarValue) -> Self {
        value.0
    }
}

/// One user's vote on one location. Stored under `pair_document_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub location_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub direction: VoteDirection,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Vote {
    pub fn new(location_id: &str, user_id: &str, direction: VoteDirection) -> Self {
        Self {
            location_id: location_id.to_string(),
            user_id: user_id.to_string(),
            direction,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn from_document(document: &Document) -> Result<Self, StoreError> {
        document.decode(VOTES)
    }

    pub fn to_fields(&self) -> Result<Fields, StoreError> {
        into_fields(VOTES, serde_json::to_value(self)?)
    }
}

/// One user's star rating of one location. Stored under `pair_document_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarRating {
    pub location_id: String,
    pub user_id: String,
    pub value: StarValue,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StarRating {
    pub fn new(location_id: &str, user_id: &str, value: StarValue) -> Self {
        Self {
            location_id: location_id.to_string(),
            user_id: user_id.to_string(),
            value,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn from_document(document: &Document) -> Result<Self, StoreError> {
        document.decode(RATINGS)
    }

    pub fn to_fields(&self) -> Result<Fields, StoreError> {
        into_fields(RATINGS, serde_json::to_value(self)?)
    }
}

fn into_fields(collection: &str, value: Value) -> Result<Fields, StoreError> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidRecord {
            collection: collection.to_string(),
            id: String::new(),
            reason: format!("expected an object, serialized to {other}"),
        }),
    }
}
