//! # Tracking API Handlers
//!
//! Public telemetry endpoints called by tenant sites. Recording is best
//! effort: once a request is valid it is acknowledged even if the write fails.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    response::{Json, Redirect},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, not_found, validation_error};
use crate::ranking::EventKind;
use crate::repositories::ListingRepository;
use crate::server::AppState;

const MAX_BATCH_EVENTS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackEventRequest {
    pub tenant_id: Uuid,
    pub listing_id: Uuid,
    /// `impression`, `cta_click`, `affiliate_click`, `scroll_depth` or `dwell_time`
    #[schema(example = "impression")]
    pub event_type: String,
    /// Sample magnitude for scroll (percent) and dwell (seconds) events
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackBatchRequest {
    pub events: Vec<TrackEventRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackResponse {
    #[schema(example = "tracked")]
    pub status: String,
    pub accepted: usize,
}

impl TrackResponse {
    fn tracked(accepted: usize) -> Self {
        Self {
            status: "tracked".to_string(),
            accepted,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RedirectQuery {
    /// Domain the click came from; counted as an affiliate click when present
    pub tenant_id: Option<Uuid>,
}

fn parse_kind(raw: &str) -> Result<EventKind, ApiError> {
    raw.parse::<EventKind>().map_err(|err| {
        validation_error(
            &err.to_string(),
            json!({ "field": "event_type", "value": raw }),
        )
    })
}

async fn record_best_effort(state: &AppState, event: &TrackEventRequest, kind: EventKind) {
    let value = event.value.unwrap_or(1.0);
    if let Err(err) = state
        .recorder
        .record(event.tenant_id, event.listing_id, kind, value)
        .await
    {
        warn!(
            error = %err,
            tenant_id = %event.tenant_id,
            listing_id = %event.listing_id,
            kind = %kind,
            "Dropping tracking event"
        );
    }
}

/// Record one page event
#[utoipa::path(
    post,
    path = "/api/track/event",
    request_body = TrackEventRequest,
    responses(
        (status = 200, description = "Event accepted", body = TrackResponse),
        (status = 400, description = "Unknown event type or malformed body", body = ApiError)
    ),
    tag = "tracking"
)]
pub async fn track_event(
    State(state): State<AppState>,
    payload: Result<Json<TrackEventRequest>, JsonRejection>,
) -> Result<Json<TrackResponse>, ApiError> {
    let Json(event) = payload?;
    let kind = parse_kind(&event.event_type)?;

    record_best_effort(&state, &event, kind).await;
    Ok(Json(TrackResponse::tracked(1)))
}

/// Record several page events; the whole batch is validated before any is recorded
#[utoipa::path(
    post,
    path = "/api/track/batch",
    request_body = TrackBatchRequest,
    responses(
        (status = 200, description = "Events accepted", body = TrackResponse),
        (status = 400, description = "Invalid event in batch or batch too large", body = ApiError)
    ),
    tag = "tracking"
)]
pub async fn track_batch(
    State(state): State<AppState>,
    payload: Result<Json<TrackBatchRequest>, JsonRejection>,
) -> Result<Json<TrackResponse>, ApiError> {
    let Json(batch) = payload?;

    if batch.events.len() > MAX_BATCH_EVENTS {
        return Err(validation_error(
            "Too many events in batch",
            json!({ "max": MAX_BATCH_EVENTS, "actual": batch.events.len() }),
        ));
    }

    let mut kinds = Vec::with_capacity(batch.events.len());
    for (index, event) in batch.events.iter().enumerate() {
        let kind = event.event_type.parse::<EventKind>().map_err(|err| {
            validation_error(
                &err.to_string(),
                json!({ "field": "event_type", "index": index }),
            )
        })?;
        kinds.push(kind);
    }

    for (event, kind) in batch.events.iter().zip(kinds) {
        record_best_effort(&state, event, kind).await;
    }
    Ok(Json(TrackResponse::tracked(batch.events.len())))
}

/// Redirect to a site's affiliate URL, counting the click
#[utoipa::path(
    get,
    path = "/api/go/{listing_id}/{match_id}",
    params(
        ("listing_id" = Uuid, Path, description = "Bonus site id"),
        ("match_id" = String, Path, description = "Match the click came from"),
        RedirectQuery
    ),
    responses(
        (status = 307, description = "Redirect to the affiliate URL"),
        (status = 404, description = "Unknown or inactive site", body = ApiError)
    ),
    tag = "tracking"
)]
pub async fn affiliate_redirect(
    State(state): State<AppState>,
    Path((listing_id, match_id)): Path<(Uuid, String)>,
    Query(query): Query<RedirectQuery>,
) -> Result<Redirect, ApiError> {
    let listing = ListingRepository::new(&state.db)
        .get(listing_id)
        .await?
        .filter(|listing| listing.is_live())
        .ok_or_else(|| not_found("Bonus site"))?;

    if let Some(tenant_id) = query.tenant_id {
        let event = TrackEventRequest {
            tenant_id,
            listing_id,
            event_type: EventKind::AffiliateClick.to_string(),
            value: None,
        };
        record_best_effort(&state, &event, EventKind::AffiliateClick).await;
    }
    debug!(%listing_id, match_id = %match_id, "Affiliate redirect");

    Ok(Redirect::temporary(&listing.affiliate_url))
}
