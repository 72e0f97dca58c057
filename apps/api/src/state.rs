use crate::config::Config;
use crate::engine::VotingEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Engine over whichever document store the config selected.
    pub engine: VotingEngine,
    pub config: Config,
}
