//! # Stats API Handlers
//!
//! Headline counts for the admin dashboard.

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::repositories::{ListingRepository, PerformanceRepository, TenantRepository};
use crate::server::AppState;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Restrict the performance record count to one domain
    pub domain_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_domains: u64,
    /// Active, non-archived bonus sites
    pub total_bonus_sites: u64,
    pub performance_records: u64,
}

#[utoipa::path(
    get,
    path = "/api/stats/dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard counts", body = DashboardStats)
    ),
    tag = "admin"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(DashboardStats {
        total_domains: TenantRepository::new(&state.db).count().await?,
        total_bonus_sites: ListingRepository::new(&state.db).count_live().await?,
        performance_records: PerformanceRepository::new(&state.db)
            .count(query.domain_id)
            .await?,
    }))
}
