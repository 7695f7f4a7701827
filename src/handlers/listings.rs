//! # Bonus Site API Handlers
//!
//! CRUD over listings ("bonus sites") plus the per-domain ranked feed and
//! domain linking.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{ApiError, ErrorType, not_found};
use crate::models::listing::Model as ListingModel;
use crate::models::tenant_listing::Model as LinkModel;
use crate::ranking::feed::{FeedEntry, tenant_feed};
use crate::ranking::scorer::ListingAttributes;
use crate::repositories::listing::{ListingChanges, NewListing};
use crate::repositories::{ListingRepository, TenantListingRepository, TenantRepository};
use crate::server::AppState;

const DEFAULT_LIST_LIMIT: u64 = 100;
const MAX_LIST_LIMIT: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BonusSiteResponse {
    pub id: Uuid,
    pub name: String,
    /// Owning domain, absent for global listings
    pub tenant_id: Option<Uuid>,
    pub bonus_type: String,
    #[schema(example = "750 TL")]
    pub bonus_amount: String,
    #[schema(example = 750)]
    pub bonus_value: i64,
    pub turnover_requirement: Option<f64>,
    pub rating: Option<f64>,
    pub affiliate_url: String,
    pub logo_url: Option<String>,
    pub campaign_start: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ListingModel> for BonusSiteResponse {
    fn from(listing: ListingModel) -> Self {
        Self {
            id: listing.id,
            name: listing.name,
            tenant_id: listing.tenant_id,
            bonus_type: listing.bonus_type,
            bonus_amount: listing.bonus_amount,
            bonus_value: listing.bonus_value,
            turnover_requirement: listing.turnover_requirement,
            rating: listing.rating,
            affiliate_url: listing.affiliate_url,
            logo_url: listing.logo_url,
            campaign_start: listing.campaign_start.map(|ts| ts.with_timezone(&Utc)),
            is_active: listing.is_active,
            is_archived: listing.is_archived,
            created_at: listing.created_at.with_timezone(&Utc),
            updated_at: listing.updated_at.with_timezone(&Utc),
        }
    }
}

fn default_bonus_type() -> String {
    "welcome".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBonusSiteRequest {
    #[schema(example = "MAXWIN")]
    pub name: String,
    pub tenant_id: Option<Uuid>,
    #[serde(default = "default_bonus_type")]
    pub bonus_type: String,
    #[schema(example = "1.500 TL")]
    pub bonus_amount: String,
    pub turnover_requirement: Option<f64>,
    pub rating: Option<f64>,
    #[schema(example = "https://partner.example/ref/42")]
    pub affiliate_url: String,
    pub logo_url: Option<String>,
    pub campaign_start: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateBonusSiteRequest {
    pub name: Option<String>,
    pub bonus_type: Option<String>,
    pub bonus_amount: Option<String>,
    pub turnover_requirement: Option<f64>,
    pub rating: Option<f64>,
    pub affiliate_url: Option<String>,
    pub logo_url: Option<String>,
    pub campaign_start: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSitesQuery {
    /// Maximum number of sites (default 100, max 500)
    pub limit: Option<u64>,
}

/// A listing as it appears in a domain feed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RankedSiteResponse {
    #[serde(flatten)]
    pub site: BonusSiteResponse,
    pub custom_order: i32,
    pub score: f64,
    pub rank: i32,
    pub is_featured: bool,
}

impl From<FeedEntry> for RankedSiteResponse {
    fn from(entry: FeedEntry) -> Self {
        Self {
            site: entry.listing.into(),
            custom_order: entry.custom_order,
            score: entry.score,
            rank: entry.rank,
            is_featured: entry.is_featured,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkSiteRequest {
    pub listing_id: Uuid,
    #[serde(default)]
    pub custom_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkSiteResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub listing_id: Uuid,
    pub custom_order: i32,
    pub is_active: bool,
}

impl From<LinkModel> for LinkSiteResponse {
    fn from(link: LinkModel) -> Self {
        Self {
            id: link.id,
            tenant_id: link.tenant_id,
            listing_id: link.listing_id,
            custom_order: link.custom_order,
            is_active: link.is_active,
        }
    }
}

/// Ranked listing feed of a domain
#[utoipa::path(
    get,
    path = "/api/domains/{id}/sites",
    params(("id" = Uuid, Path, description = "Domain id")),
    responses(
        (status = 200, description = "Sites by score, rank recomputed on read", body = [RankedSiteResponse]),
        (status = 404, description = "Unknown domain", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn domain_sites(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RankedSiteResponse>>, ApiError> {
    if !TenantRepository::new(&state.db).tenant_exists(id).await? {
        return Err(not_found("Domain"));
    }

    let feed = tenant_feed(&state.db, id).await?;
    Ok(Json(feed.into_iter().map(RankedSiteResponse::from).collect()))
}

/// Link a listing to a domain, or update an existing link
#[utoipa::path(
    post,
    path = "/api/domains/{id}/sites",
    params(("id" = Uuid, Path, description = "Domain id")),
    request_body = LinkSiteRequest,
    responses(
        (status = 201, description = "Link stored", body = LinkSiteResponse),
        (status = 400, description = "Listing belongs to another domain", body = ApiError),
        (status = 404, description = "Unknown domain or listing", body = ApiError)
    ),
    tag = "domains"
)]
pub async fn link_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<LinkSiteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LinkSiteResponse>), ApiError> {
    let Json(request) = payload?;

    if !TenantRepository::new(&state.db).tenant_exists(id).await? {
        return Err(not_found("Domain"));
    }
    let listing = ListingRepository::new(&state.db)
        .get(request.listing_id)
        .await?
        .ok_or_else(|| not_found("Bonus site"))?;
    if !listing.is_visible_to(id) {
        return Err(ApiError::of(
            ErrorType::BadRequest,
            "Bonus site belongs to another domain",
        ));
    }

    let now = state.clock.now();
    let seed = state
        .scoring
        .heuristic_score(&ListingAttributes::from(&listing), now);
    let link = TenantListingRepository::new(&state.db)
        .upsert_with_record(
            id,
            listing.id,
            request.custom_order,
            request.is_active,
            seed,
            now,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(link.into())))
}

/// Active bonus sites, best rated first
#[utoipa::path(
    get,
    path = "/api/bonus-sites",
    params(ListSitesQuery),
    responses(
        (status = 200, description = "Active sites", body = [BonusSiteResponse])
    ),
    tag = "bonus-sites"
)]
pub async fn list_sites(
    State(state): State<AppState>,
    Query(query): Query<ListSitesQuery>,
) -> Result<Json<Vec<BonusSiteResponse>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let sites = ListingRepository::new(&state.db).list_live(limit).await?;
    Ok(Json(sites.into_iter().map(BonusSiteResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/bonus-sites",
    request_body = CreateBonusSiteRequest,
    responses(
        (status = 201, description = "Site created", body = BonusSiteResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Owning domain not found", body = ApiError)
    ),
    tag = "bonus-sites"
)]
pub async fn create_site(
    State(state): State<AppState>,
    payload: Result<Json<CreateBonusSiteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BonusSiteResponse>), ApiError> {
    let Json(request) = payload?;

    if let Some(tenant_id) = request.tenant_id
        && !TenantRepository::new(&state.db).tenant_exists(tenant_id).await?
    {
        return Err(not_found("Domain"));
    }

    let listing = ListingRepository::new(&state.db)
        .create(NewListing {
            name: request.name,
            tenant_id: request.tenant_id,
            bonus_type: request.bonus_type,
            bonus_amount: request.bonus_amount,
            turnover_requirement: request.turnover_requirement,
            rating: request.rating,
            affiliate_url: request.affiliate_url,
            logo_url: request.logo_url,
            campaign_start: request.campaign_start,
            is_active: request.is_active,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(listing.into())))
}

#[utoipa::path(
    get,
    path = "/api/bonus-sites/{id}",
    params(("id" = Uuid, Path, description = "Bonus site id")),
    responses(
        (status = 200, description = "Site", body = BonusSiteResponse),
        (status = 404, description = "Unknown site", body = ApiError)
    ),
    tag = "bonus-sites"
)]
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BonusSiteResponse>, ApiError> {
    ListingRepository::new(&state.db)
        .get(id)
        .await?
        .map(|listing| Json(listing.into()))
        .ok_or_else(|| not_found("Bonus site"))
}

#[utoipa::path(
    patch,
    path = "/api/bonus-sites/{id}",
    params(("id" = Uuid, Path, description = "Bonus site id")),
    request_body = UpdateBonusSiteRequest,
    responses(
        (status = 200, description = "Updated site", body = BonusSiteResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Unknown site", body = ApiError)
    ),
    tag = "bonus-sites"
)]
pub async fn update_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateBonusSiteRequest>, JsonRejection>,
) -> Result<Json<BonusSiteResponse>, ApiError> {
    let Json(request) = payload?;

    let listing = ListingRepository::new(&state.db)
        .update(
            id,
            ListingChanges {
                name: request.name,
                bonus_type: request.bonus_type,
                bonus_amount: request.bonus_amount,
                turnover_requirement: request.turnover_requirement,
                rating: request.rating,
                affiliate_url: request.affiliate_url,
                logo_url: request.logo_url,
                campaign_start: request.campaign_start,
                is_active: request.is_active,
                is_archived: None,
            },
        )
        .await?;

    Ok(Json(listing.into()))
}

/// Archive a site; it stays resolvable but leaves every feed
#[utoipa::path(
    delete,
    path = "/api/bonus-sites/{id}",
    params(("id" = Uuid, Path, description = "Bonus site id")),
    responses(
        (status = 200, description = "Archived site", body = BonusSiteResponse),
        (status = 404, description = "Unknown site", body = ApiError)
    ),
    tag = "bonus-sites"
)]
pub async fn archive_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BonusSiteResponse>, ApiError> {
    let listing = ListingRepository::new(&state.db).archive(id).await?;
    Ok(Json(listing.into()))
}
