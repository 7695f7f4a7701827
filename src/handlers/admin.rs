//! # Admin API Handlers
//!
//! Operational controls: cache introspection and refresh, the featured match
//! pin, and ranking every domain at once.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::ranking::RankAllSummary;
use crate::server::AppState;
use crate::sports::CacheStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshScoresResponse {
    /// The refresh produced fresh data
    pub ok: bool,
    pub count: usize,
    pub is_stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeaturedMatchRequest {
    /// Match to pin; `null` clears the pin
    pub match_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeaturedMatchResponse {
    pub featured_match_override: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/admin/api-status",
    responses((status = 200, description = "Scores cache state", body = CacheStatus)),
    tag = "admin"
)]
pub async fn api_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.scores.status().await)
}

/// Expire the scores cache and fetch immediately
#[utoipa::path(
    post,
    path = "/api/admin/refresh-scores",
    responses((status = 200, description = "Refresh attempted", body = RefreshScoresResponse)),
    tag = "admin"
)]
pub async fn refresh_scores(State(state): State<AppState>) -> Json<RefreshScoresResponse> {
    state.scores.force_refresh().await;
    let snapshot = state.scores.get_cached().await;

    Json(RefreshScoresResponse {
        ok: !snapshot.last_fetch_failed && !snapshot.is_stale,
        count: snapshot.matches.len(),
        is_stale: snapshot.is_stale,
    })
}

#[utoipa::path(
    post,
    path = "/api/admin/featured-match",
    request_body = FeaturedMatchRequest,
    responses(
        (status = 200, description = "Pin updated", body = FeaturedMatchResponse),
        (status = 400, description = "Malformed body", body = ApiError)
    ),
    tag = "admin"
)]
pub async fn set_featured_match(
    State(state): State<AppState>,
    payload: Result<Json<FeaturedMatchRequest>, JsonRejection>,
) -> Result<Json<FeaturedMatchResponse>, ApiError> {
    let Json(request) = payload?;
    state.scores.set_featured_override(request.match_id).await;

    let featured_match_override = state.scores.status().await.featured_match_override;
    info!(featured = ?featured_match_override, "Featured match pin updated");
    Ok(Json(FeaturedMatchResponse {
        featured_match_override,
    }))
}

/// Rank every active domain
#[utoipa::path(
    post,
    path = "/api/admin/update-rankings",
    responses(
        (status = 200, description = "Summary of the pass", body = RankAllSummary),
        (status = 500, description = "Domains could not be loaded", body = ApiError)
    ),
    tag = "admin"
)]
pub async fn update_all_rankings(
    State(state): State<AppState>,
) -> Result<Json<RankAllSummary>, ApiError> {
    Ok(Json(state.rankings.update_all().await?))
}
