//! Deck listing, comparison and dashboard endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use deckscore::service::{DashboardMetrics, DeckComparison, DeckDetail, DeckSummary};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub deck_id_1: i64,
    pub deck_id_2: i64,
}

/// GET /decks
pub async fn list_decks(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<DeckSummary>>> {
    Ok(Json(state.service.list_decks(page.limit, page.offset)?))
}

/// GET /decks/:deck_id
pub async fn get_deck(
    State(state): State<AppState>,
    Path(deck_id): Path<i64>,
) -> ApiResult<Json<DeckDetail>> {
    Ok(Json(state.service.get_deck(deck_id)?))
}

/// GET /decks/compare?deck_id_1=&deck_id_2=
pub async fn compare_decks(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> ApiResult<Json<DeckComparison>> {
    Ok(Json(
        state
            .service
            .compare_decks(params.deck_id_1, params.deck_id_2)?,
    ))
}

/// GET /dashboard/metrics
pub async fn dashboard_metrics(State(state): State<AppState>) -> ApiResult<Json<DashboardMetrics>> {
    Ok(Json(state.service.dashboard()?))
}
