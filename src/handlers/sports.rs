//! # Sports API Handlers
//!
//! Read-only views over the scores cache.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, not_found, service_unavailable};
use crate::server::AppState;
use crate::sports::Match;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoresResponse {
    pub matches: Vec<Match>,
    pub from_cache: bool,
    pub is_stale: bool,
    pub count: usize,
}

/// Live, recent and upcoming matches
#[utoipa::path(
    get,
    path = "/api/sports/scores",
    responses(
        (status = 200, description = "Matches, live first", body = ScoresResponse),
        (status = 503, description = "Upstream unavailable and nothing cached", body = ApiError)
    ),
    tag = "sports"
)]
pub async fn scores(State(state): State<AppState>) -> Result<Json<ScoresResponse>, ApiError> {
    let snapshot = state.scores.get_cached().await;
    if snapshot.last_fetch_failed {
        return Err(service_unavailable(
            "Live scores are temporarily unavailable",
        ));
    }

    let matches: Vec<Match> = snapshot
        .matches
        .iter()
        .take(state.config.sports.display_limit)
        .cloned()
        .collect();

    Ok(Json(ScoresResponse {
        count: matches.len(),
        matches,
        from_cache: snapshot.from_cache,
        is_stale: snapshot.is_stale,
    }))
}

/// The pinned match, else the first match of the feed; `null` when there are none
#[utoipa::path(
    get,
    path = "/api/sports/featured",
    responses(
        (status = 200, description = "Featured match, or null when the feed is empty", body = Match)
    ),
    tag = "sports"
)]
pub async fn featured(State(state): State<AppState>) -> Json<Option<Match>> {
    Json(state.scores.featured().await)
}

#[utoipa::path(
    get,
    path = "/api/sports/match/{id}",
    params(("id" = String, Path, description = "Upstream match id")),
    responses(
        (status = 200, description = "Match", body = Match),
        (status = 404, description = "Match not in the current feed", body = ApiError)
    ),
    tag = "sports"
)]
pub async fn match_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Match>, ApiError> {
    state
        .scores
        .find_by_id(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Match"))
}

#[utoipa::path(
    get,
    path = "/api/sports/match-by-slug/{slug}",
    params(("slug" = String, Path, description = "Match slug, e.g. `galatasaray-vs-fenerbahce-2025-03-09`")),
    responses(
        (status = 200, description = "Match", body = Match),
        (status = 404, description = "Match not in the current feed", body = ApiError)
    ),
    tag = "sports"
)]
pub async fn match_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Match>, ApiError> {
    state
        .scores
        .find_by_slug(&slug)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Match"))
}
