//! Liveness, version and database reachability probes.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sea_orm::ConnectionTrait;

use crate::db;
use crate::error::{ApiError, service_unavailable};
use crate::server::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionResponse {
    pub version: String,
    pub git_commit: Option<String>,
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DbCheckResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub backend: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up", body = HealthResponse)),
    tag = "root"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Build information", body = VersionResponse)),
    tag = "root"
)]
pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_commit: state.config.git_commit.clone(),
        profile: state.config.profile.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/db-check",
    responses(
        (status = 200, description = "Database reachable", body = DbCheckResponse),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn db_check(State(state): State<AppState>) -> Result<Json<DbCheckResponse>, ApiError> {
    if let Err(err) = db::health_check(&state.db).await {
        tracing::warn!(error = %err, "Database health check failed");
        return Err(service_unavailable("Database is unreachable"));
    }

    Ok(Json(DbCheckResponse {
        status: "ok".to_string(),
        backend: format!("{:?}", state.db.get_database_backend()).to_lowercase(),
    }))
}
