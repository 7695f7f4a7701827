//! # Server Configuration
//!
//! Application state, router assembly, background tasks and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::handlers::{
    self, admin, health, listings, rankings, sports, stats, tenants, tracking,
};
use crate::rate_limit::{self, SlidingWindowLimiter, enforce_rate_limit};
use crate::ranking::{EventRecorder, RankingScheduler, RankingUpdater, ScoringStrategy};
use crate::sports::{OddsApiClient, ScoresCache, ScoresSource, UpstreamError};
use crate::telemetry::trace_requests;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub scoring: ScoringStrategy,
    pub scores: Arc<ScoresCache>,
    pub rate_limiter: Arc<SlidingWindowLimiter>,
    pub recorder: EventRecorder,
    pub rankings: RankingUpdater,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the state with the live odds API client and the system clock.
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Result<Self, UpstreamError> {
        let source = Arc::new(OddsApiClient::new(&config.sports)?);
        Ok(Self::with_components(config, db, source, Arc::new(SystemClock)))
    }

    /// Build the state around an arbitrary scores source and clock.
    pub fn with_components(
        config: AppConfig,
        db: DatabaseConnection,
        source: Arc<dyn ScoresSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scoring = config.ranking.strategy();
        let scores = Arc::new(ScoresCache::new(
            source,
            Arc::clone(&clock),
            Duration::from_secs(config.sports.cache_ttl_seconds),
            config.sports.is_configured(),
        ));
        let rate_limiter = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit));

        Self {
            recorder: EventRecorder::new(db.clone(), Arc::clone(&clock)),
            rankings: RankingUpdater::new(db.clone(), scoring, Arc::clone(&clock)),
            config: Arc::new(config),
            db,
            scoring,
            scores,
            rate_limiter,
            clock,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let limiter = Arc::clone(&state.rate_limiter);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .route("/db-check", get(health::db_check))
        .route("/api", get(handlers::api_root))
        .route(
            "/api/domains",
            post(tenants::create_domain).get(tenants::list_domains),
        )
        .route(
            "/api/domains/by-name/{domain_name}",
            get(tenants::get_domain_by_name),
        )
        .route(
            "/api/domains/{id}",
            get(tenants::get_domain).delete(tenants::delete_domain),
        )
        .route(
            "/api/domains/{id}/sites",
            get(listings::domain_sites).post(listings::link_site),
        )
        .route(
            "/api/domains/{id}/update-rankings",
            post(rankings::update_domain_rankings),
        )
        .route(
            "/api/bonus-sites",
            get(listings::list_sites).post(listings::create_site),
        )
        .route(
            "/api/bonus-sites/{id}",
            get(listings::get_site)
                .patch(listings::update_site)
                .delete(listings::archive_site),
        )
        .route("/api/track/event", post(tracking::track_event))
        .route("/api/track/batch", post(tracking::track_batch))
        .route(
            "/api/go/{listing_id}/{match_id}",
            get(tracking::affiliate_redirect),
        )
        .route("/api/sports/scores", get(sports::scores))
        .route("/api/sports/featured", get(sports::featured))
        .route("/api/sports/match/{id}", get(sports::match_by_id))
        .route("/api/sports/match-by-slug/{slug}", get(sports::match_by_slug))
        .route("/api/admin/api-status", get(admin::api_status))
        .route("/api/admin/refresh-scores", post(admin::refresh_scores))
        .route("/api/admin/featured-match", post(admin::set_featured_match))
        .route("/api/admin/update-rankings", post(admin::update_all_rankings))
        .route("/api/stats/dashboard", get(stats::dashboard))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(limiter, enforce_rate_limit))
        .layer(from_fn(trace_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Starts the server and its background tasks, returning after a graceful shutdown.
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("Invalid server address")?;
    let state = AppState::new(config, db).context("Failed to build odds API client")?;
    let shutdown = CancellationToken::new();

    let mut background = Vec::new();
    if state.config.ranking.scheduler_enabled {
        let scheduler = RankingScheduler::new(
            state.rankings.clone(),
            Duration::from_secs(state.config.ranking.tick_interval_seconds),
        );
        background.push(tokio::spawn(scheduler.run(shutdown.clone())));
    }
    background.push(tokio::spawn(rate_limit::run_sweeper(
        Arc::clone(&state.rate_limiter),
        Duration::from_secs(state.config.rate_limit.sweep_interval_seconds),
        shutdown.clone(),
    )));

    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, profile = %profile, "Server listening");

    let signal = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = shutdown_signal() => signal.cancel(),
            _ = signal.cancelled() => {}
        }
    })
    .await
    .context("HTTP server error")?;

    shutdown.cancel();
    for task in background {
        if let Err(err) = task.await {
            warn!(error = %err, "Background task ended abnormally");
        }
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => warn!(error = %err, "Failed to listen for Ctrl+C"),
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::api_root,
        crate::handlers::health::health,
        crate::handlers::health::version,
        crate::handlers::health::db_check,
        crate::handlers::tenants::create_domain,
        crate::handlers::tenants::list_domains,
        crate::handlers::tenants::get_domain,
        crate::handlers::tenants::get_domain_by_name,
        crate::handlers::tenants::delete_domain,
        crate::handlers::listings::domain_sites,
        crate::handlers::listings::link_site,
        crate::handlers::listings::list_sites,
        crate::handlers::listings::create_site,
        crate::handlers::listings::get_site,
        crate::handlers::listings::update_site,
        crate::handlers::listings::archive_site,
        crate::handlers::rankings::update_domain_rankings,
        crate::handlers::tracking::track_event,
        crate::handlers::tracking::track_batch,
        crate::handlers::tracking::affiliate_redirect,
        crate::handlers::sports::scores,
        crate::handlers::sports::featured,
        crate::handlers::sports::match_by_id,
        crate::handlers::sports::match_by_slug,
        crate::handlers::admin::api_status,
        crate::handlers::admin::refresh_scores,
        crate::handlers::admin::set_featured_match,
        crate::handlers::admin::update_all_rankings,
        crate::handlers::stats::dashboard,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::ApiRootResponse,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::VersionResponse,
            crate::handlers::health::DbCheckResponse,
            crate::handlers::tenants::CreateDomainRequest,
            crate::handlers::tenants::DomainResponse,
            crate::handlers::listings::BonusSiteResponse,
            crate::handlers::listings::CreateBonusSiteRequest,
            crate::handlers::listings::UpdateBonusSiteRequest,
            crate::handlers::listings::RankedSiteResponse,
            crate::handlers::listings::LinkSiteRequest,
            crate::handlers::listings::LinkSiteResponse,
            crate::handlers::rankings::UpdateRankingsResponse,
            crate::handlers::tracking::TrackEventRequest,
            crate::handlers::tracking::TrackBatchRequest,
            crate::handlers::tracking::TrackResponse,
            crate::handlers::sports::ScoresResponse,
            crate::handlers::admin::RefreshScoresResponse,
            crate::handlers::admin::FeaturedMatchRequest,
            crate::handlers::admin::FeaturedMatchResponse,
            crate::handlers::stats::DashboardStats,
            crate::sports::Match,
            crate::sports::CacheStatus,
            crate::ranking::RankAllSummary,
        )
    ),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "domains", description = "Tenant domains and their ranked feeds"),
        (name = "bonus-sites", description = "Affiliate listings"),
        (name = "tracking", description = "Page telemetry and affiliate redirects"),
        (name = "sports", description = "Cached live scores"),
        (name = "admin", description = "Operational controls"),
    ),
    info(
        title = "BonusHub API",
        description = "Multi-tenant affiliate listings with performance-based ranking",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
