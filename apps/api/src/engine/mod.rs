//! Voting/rating engine. Keeps per-location vote counters and the running
//! mean star rating consistent with the per-user Vote and StarRating records.
//!
//! Votes move counters with atomic increments. Ratings overwrite the mean,
//! so that write is conditional on the location version read and retried on
//! conflict.

pub mod aggregate;
pub mod handlers;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::errors::EngineError;
use crate::models::{
    pair_document_id, Location, LocationStats, StarRating, StarValue, Vote, VoteDirection,
    LOCATIONS, RATINGS, VOTES,
};
use crate::store::{DocumentStore, StoreError};

use aggregate::{fold_rating, vote_transition};

const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Read-compute-write cycles attempted for one rating before giving up.
    pub max_rating_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rating_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    Recorded,
    Switched { from: VoteDirection },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingOutcome {
    pub previous: Option<u8>,
    pub rating: f64,
    pub rating_count: u64,
}

/// The caller's own vote and rating on a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStanding {
    pub location_id: String,
    pub vote: Option<VoteDirection>,
    pub rating: Option<u8>,
}

#[derive(Clone)]
pub struct VotingEngine {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
}

impl VotingEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Records the caller's vote. Returns `false` on any failure, which is
    /// logged rather than returned.
    pub async fn cast_vote(
        &self,
        auth: &AuthContext,
        location_id: &str,
        direction: VoteDirection,
    ) -> bool {
        match self.try_cast_vote(auth, location_id, direction).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Vote {direction} on location {location_id} failed: {e}");
                false
            }
        }
    }

    pub async fn try_cast_vote(
        &self,
        auth: &AuthContext,
        location_id: &str,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, EngineError> {
        let user_id = auth.require_user()?;
        self.load_location(location_id).await?;

        let vote_id = pair_document_id(location_id, user_id);
        let previous = self
            .store
            .get_document(VOTES, &vote_id)
            .await?
            .map(|doc| Vote::from_document(&doc))
            .transpose()?
            .map(|vote| vote.direction);

        let Some(delta) = vote_transition(previous, direction) else {
            info!("User {user_id} already voted {direction} on location {location_id}");
            return Ok(VoteOutcome::Unchanged);
        };

        let vote = Vote::new(location_id, user_id, direction);
        self.store.set_document(VOTES, &vote_id, vote.to_fields()?).await?;
        // A failure here leaves the vote record ahead of the counters; no rollback.
        self.store
            .update_document(LOCATIONS, location_id, &delta.updates(), None)
            .await?;

        info!("User {user_id} voted {direction} on location {location_id}");
        Ok(match previous {
            Some(from) => VoteOutcome::Switched { from },
            None => VoteOutcome::Recorded,
        })
    }

    /// Records the caller's star rating (1 to 5). Returns `false` on any
    /// failure; out-of-range values are rejected before touching the store.
    pub async fn rate_location(&self, auth: &AuthContext, location_id: &str, value: i64) -> bool {
        match self.try_rate_location(auth, location_id, value).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Rating {value} on location {location_id} failed: {e}");
                false
            }
        }
    }

    pub async fn try_rate_location(
        &self,
        auth: &AuthContext,
        location_id: &str,
        value: i64,
    ) -> Result<RatingOutcome, EngineError> {
        let value = StarValue::try_from(value).map_err(EngineError::InvalidInput)?;
        let user_id = auth.require_user()?;
        let rating_id = pair_document_id(location_id, user_id);

        let attempts = self.config.max_rating_attempts.max(1);
        let mut last_conflict = None;

        for attempt in 1..=attempts {
            let location = self.load_location(location_id).await?;
            let previous = self
                .store
                .get_document(RATINGS, &rating_id)
                .await?
                .map(|doc| StarRating::from_document(&doc))
                .transpose()?
                .map(|rating| rating.value);

            let next = fold_rating(location.rating_aggregate(), previous, value);

            // Aggregate first: a retried cycle must not see its own record.
            match self
                .store
                .update_document(LOCATIONS, location_id, &next.updates(), Some(location.version))
                .await
            {
                Ok(_) => {}
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    warn!(
                        "Rating on location {location_id} lost a race (attempt {attempt}/{attempts}): {conflict}"
                    );
                    last_conflict = Some(conflict);
                    continue;
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(EngineError::LocationNotFound(location_id.to_string()))
                }
                Err(e) => return Err(e.into()),
            }

            let record = StarRating::new(location_id, user_id, value);
            self.store
                .set_document(RATINGS, &rating_id, record.to_fields()?)
                .await?;

            info!(
                "User {user_id} rated location {location_id} {} (mean {:.3} over {})",
                value.get(),
                next.rating,
                next.count
            );
            return Ok(RatingOutcome {
                previous: previous.map(StarValue::get),
                rating: next.rating,
                rating_count: next.count,
            });
        }

        Err(EngineError::StoreOperationFailed(last_conflict.unwrap_or_else(
            || StoreError::Unavailable(format!("rating on {location_id} not attempted")),
        )))
    }

    /// Creates a location with zeroed aggregates.
    pub async fn create_location(
        &self,
        auth: &AuthContext,
        name: &str,
    ) -> Result<Location, EngineError> {
        let user_id = auth.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("location name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(EngineError::InvalidInput(format!(
                "location name exceeds {MAX_NAME_LEN} characters"
            )));
        }

        let mut location = Location::new(
            Uuid::new_v4().to_string(),
            name.to_string(),
            user_id.to_string(),
        );
        location.version = self
            .store
            .set_document(LOCATIONS, &location.id, location.to_fields()?)
            .await?;

        info!("User {user_id} created location {} ({name})", location.id);
        Ok(location)
    }

    pub async fn location_stats(&self, location_id: &str) -> Result<LocationStats, EngineError> {
        let location = self.load_location(location_id).await?;
        Ok(LocationStats::from(&location))
    }

    pub async fn user_standing(
        &self,
        auth: &AuthContext,
        location_id: &str,
    ) -> Result<UserStanding, EngineError> {
        let user_id = auth.require_user()?;
        self.load_location(location_id).await?;
        let pair_id = pair_document_id(location_id, user_id);

        let vote = self
            .store
            .get_document(VOTES, &pair_id)
            .await?
            .map(|doc| Vote::from_document(&doc))
            .transpose()?;
        let rating = self
            .store
            .get_document(RATINGS, &pair_id)
            .await?
            .map(|doc| StarRating::from_document(&doc))
            .transpose()?;

        Ok(UserStanding {
            location_id: location_id.to_string(),
            vote: vote.map(|v| v.direction),
            rating: rating.map(|r| r.value.get()),
        })
    }

    async fn load_location(&self, location_id: &str) -> Result<Location, EngineError> {
        if location_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("location id is required".to_string()));
        }
        let document = self
            .store
            .get_document(LOCATIONS, location_id)
            .await?
            .ok_or_else(|| EngineError::LocationNotFound(location_id.to_string()))?;
        Ok(Location::from_document(&document)?)
    }
}
