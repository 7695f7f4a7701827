//! On-demand ranking for a single domain.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, not_found};
use crate::repositories::TenantRepository;
use crate::server::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRankingsResponse {
    /// Number of performance records ranked
    pub updated: usize,
}

/// Rescore and rerank a domain's listings
#[utoipa::path(
    post,
    path = "/api/domains/{id}/update-rankings",
    params(("id" = Uuid, Path, description = "Domain id")),
    responses(
        (status = 200, description = "Ranking pass completed", body = UpdateRankingsResponse),
        (status = 404, description = "Unknown domain", body = ApiError),
        (status = 500, description = "Ranking pass failed, safe to retry", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn update_domain_rankings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UpdateRankingsResponse>, ApiError> {
    if !TenantRepository::new(&state.db).tenant_exists(id).await? {
        return Err(not_found("Domain"));
    }

    let updated = state.rankings.update_rankings(id).await?;
    Ok(Json(UpdateRankingsResponse { updated }))
}
