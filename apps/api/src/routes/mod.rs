pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::engine::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/locations",
            post(handlers::handle_create_location),
        )
        .route("/api/v1/locations/:id", get(handlers::handle_get_stats))
        .route("/api/v1/locations/:id/vote", post(handlers::handle_vote))
        .route("/api/v1/locations/:id/rating", post(handlers::handle_rate))
        .route(
            "/api/v1/locations/:id/me",
            get(handlers::handle_get_standing),
        )
        .with_state(state)
}
