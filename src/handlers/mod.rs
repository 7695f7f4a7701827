//! # API Handlers
//!
//! HTTP endpoint handlers for domains, bonus sites, tracking, sports scores,
//! dashboard stats and admin operations.

use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ServiceInfo;

pub mod admin;
pub mod health;
pub mod listings;
pub mod rankings;
pub mod sports;
pub mod stats;
pub mod tenants;
pub mod tracking;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// API index
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiRootResponse {
    pub message: String,
    pub version: String,
    #[schema(example = "/docs")]
    pub docs: String,
}

#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "API index", body = ApiRootResponse)
    ),
    tag = "root"
)]
pub async fn api_root() -> Json<ApiRootResponse> {
    Json(ApiRootResponse {
        message: "BonusHub API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/docs".to_string(),
    })
}

#[cfg(test)]
mod tests;
