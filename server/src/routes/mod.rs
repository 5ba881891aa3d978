//! HTTP routes.

pub mod analysis;
pub mod decks;
pub mod ws;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router. Uploads are capped at `server.max_upload_bytes`.
pub fn router(state: AppState) -> Router {
    let max_upload = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        // Analyses
        .route(
            "/analyze",
            post(analysis::analyze).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/analysis/:job_id/status", get(analysis::status))
        .route("/analysis/:job_id/result", get(analysis::result))
        .route("/analysis/:job_id/report", get(analysis::report))
        // Decks
        .route("/decks", get(decks::list_decks))
        .route("/decks/compare", get(decks::compare_decks))
        .route("/decks/:deck_id", get(decks::get_deck))
        .route("/dashboard/metrics", get(decks::dashboard_metrics))
        // Live progress
        .route("/ws/:job_id", get(ws::job_events))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}
