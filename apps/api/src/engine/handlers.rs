use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::AuthContext;
use crate::engine::{RatingOutcome, UserStanding, VoteOutcome};
use crate::errors::{AppError, AppJson};
use crate::models::{Location, LocationStats, VoteDirection};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub value: i64,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: VoteOutcome,
    /// `None` when the write succeeded but the follow-up read did not.
    pub stats: Option<LocationStats>,
}

#[derive(Serialize)]
pub struct RatingResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: RatingOutcome,
    pub stats: Option<LocationStats>,
}

/// POST /api/v1/locations
pub async fn handle_create_location(
    State(state): State<AppState>,
    auth: AuthContext,
    AppJson(req): AppJson<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    let location = state.engine.create_location(&auth, &req.name).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// GET /api/v1/locations/:id
pub async fn handle_get_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LocationStats>, AppError> {
    Ok(Json(state.engine.location_stats(&id).await?))
}

/// POST /api/v1/locations/:id/vote
pub async fn handle_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
    AppJson(req): AppJson<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let outcome = state.engine.try_cast_vote(&auth, &id, req.direction).await?;
    let stats = stats_after_write(&state, &id).await;
    Ok(Json(VoteResponse {
        success: true,
        outcome,
        stats,
    }))
}

/// POST /api/v1/locations/:id/rating
pub async fn handle_rate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
    AppJson(req): AppJson<RatingRequest>,
) -> Result<Json<RatingResponse>, AppError> {
    let outcome = state.engine.try_rate_location(&auth, &id, req.value).await?;
    let stats = stats_after_write(&state, &id).await;
    Ok(Json(RatingResponse {
        success: true,
        outcome,
        stats,
    }))
}

/// GET /api/v1/locations/:id/me
pub async fn handle_get_standing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> Result<Json<UserStanding>, AppError> {
    Ok(Json(state.engine.user_standing(&auth, &id).await?))
}

/// The write already succeeded, so a failed read only drops the stats.
async fn stats_after_write(state: &AppState, location_id: &str) -> Option<LocationStats> {
    match state.engine.location_stats(location_id).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("Stats for location {location_id} unavailable after write: {e}");
            None
        }
    }
}
