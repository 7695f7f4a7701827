//! # Domain API Handlers
//!
//! Tenants are exposed as "domains". Creating one provisions its catalog from
//! the live global listings.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, not_found};
use crate::models::tenant::Model as TenantModel;
use crate::repositories::TenantRepository;
use crate::repositories::tenant::CreateTenantRequest;
use crate::server::AppState;

/// Request payload for creating a domain
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDomainRequest {
    #[schema(example = "bonus.example.com")]
    pub domain_name: String,
    #[schema(example = "Bonus Example")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DomainResponse {
    pub id: Uuid,
    pub domain_name: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TenantModel> for DomainResponse {
    fn from(tenant: TenantModel) -> Self {
        Self {
            id: tenant.id,
            domain_name: tenant.domain_name,
            display_name: tenant.display_name,
            is_active: tenant.is_active,
            created_at: tenant.created_at.with_timezone(&Utc),
        }
    }
}

/// Create a domain and link every live global listing to it
#[utoipa::path(
    post,
    path = "/api/domains",
    request_body = CreateDomainRequest,
    responses(
        (status = 201, description = "Domain created", body = DomainResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Domain already exists", body = ApiError),
        (status = 429, description = "Rate limit exceeded", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn create_domain(
    State(state): State<AppState>,
    payload: Result<Json<CreateDomainRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DomainResponse>), ApiError> {
    let Json(request) = payload?;

    let tenant = TenantRepository::new(&state.db)
        .create_tenant(
            CreateTenantRequest {
                domain_name: request.domain_name,
                display_name: request.display_name,
            },
            &state.scoring,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(tenant.into())))
}

#[utoipa::path(
    get,
    path = "/api/domains",
    responses(
        (status = 200, description = "All domains", body = [DomainResponse])
    ),
    tag = "domains"
)]
pub async fn list_domains(
    State(state): State<AppState>,
) -> Result<Json<Vec<DomainResponse>>, ApiError> {
    let tenants = TenantRepository::new(&state.db).list_tenants().await?;
    Ok(Json(tenants.into_iter().map(DomainResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/domains/{id}",
    params(("id" = Uuid, Path, description = "Domain id")),
    responses(
        (status = 200, description = "Domain", body = DomainResponse),
        (status = 404, description = "Unknown domain", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn get_domain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DomainResponse>, ApiError> {
    TenantRepository::new(&state.db)
        .get_tenant_by_id(id)
        .await?
        .map(|tenant| Json(tenant.into()))
        .ok_or_else(|| not_found("Domain"))
}

/// Look a domain up by host name, case-insensitively
#[utoipa::path(
    get,
    path = "/api/domains/by-name/{domain_name}",
    params(("domain_name" = String, Path, description = "Served host name")),
    responses(
        (status = 200, description = "Domain", body = DomainResponse),
        (status = 400, description = "Malformed host name", body = ApiError),
        (status = 404, description = "Unknown domain", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn get_domain_by_name(
    State(state): State<AppState>,
    Path(domain_name): Path<String>,
) -> Result<Json<DomainResponse>, ApiError> {
    TenantRepository::new(&state.db)
        .get_by_domain_name(&domain_name)
        .await?
        .map(|tenant| Json(tenant.into()))
        .ok_or_else(|| not_found("Domain"))
}

/// Delete a domain with its links and performance records
#[utoipa::path(
    delete,
    path = "/api/domains/{id}",
    params(("id" = Uuid, Path, description = "Domain id")),
    responses(
        (status = 204, description = "Domain deleted"),
        (status = 404, description = "Unknown domain", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn delete_domain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    TenantRepository::new(&state.db).delete_tenant(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
