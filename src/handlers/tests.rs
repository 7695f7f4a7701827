//! # Tests for Handlers
//!
//! Router-level tests driven through `tower::ServiceExt::oneshot` against an
//! in-memory SQLite database and a scripted scores source.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::config::{AppConfig, RateLimitConfig};
use crate::models::ServiceInfo;
use crate::repositories::PerformanceRepository;
use crate::repositories::testing::setup_db;
use crate::server::{AppState, create_app};
use crate::sports::matches::sample_match;
use crate::sports::{Match, ScoresSource, UpstreamError};

struct StaticSource {
    matches: Option<Vec<Match>>,
}

#[async_trait]
impl ScoresSource for StaticSource {
    async fn fetch_scores(&self) -> Result<Vec<Match>, UpstreamError> {
        self.matches
            .clone()
            .ok_or(UpstreamError::Status { status: 503 })
    }

    async fn fetch_upcoming(&self) -> Result<Vec<Match>, UpstreamError> {
        Ok(Vec::new())
    }
}

async fn test_app_with(config: AppConfig, matches: Option<Vec<Match>>) -> (Router, AppState) {
    let db = setup_db().await;
    let state = AppState::with_components(
        config,
        db,
        Arc::new(StaticSource { matches }),
        Arc::new(SystemClock),
    );
    (create_app(state.clone()), state)
}

async fn test_app() -> (Router, AppState) {
    let now = Utc::now();
    test_app_with(
        AppConfig::default(),
        Some(vec![
            sample_match("live", now - Duration::minutes(20), false),
            sample_match("done", now - Duration::hours(5), true),
        ]),
    )
    .await
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    app.clone().oneshot(request(method, uri, body)).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_site(app: &Router, name: &str, amount: &str, turnover: f64, rating: f64) -> Uuid {
    let response = send(
        app,
        Method::POST,
        "/api/bonus-sites",
        Some(json!({
            "name": name,
            "bonus_amount": amount,
            "turnover_requirement": turnover,
            "rating": rating,
            "affiliate_url": format!("https://partner.example/{name}")
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().parse().unwrap()
}

async fn create_domain(app: &Router, domain: &str) -> Uuid {
    let response = send(
        app,
        Method::POST,
        "/api/domains",
        Some(json!({ "domain_name": domain })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_root_returns_service_info() {
    let (app, _) = test_app().await;

    let response = send(&app, Method::GET, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let info: ServiceInfo = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(info.service, "bonushub");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_version_and_db_check() {
    let (app, _) = test_app().await;

    let health = send(&app, Method::GET, "/health", None).await;
    assert_eq!(body_json(health).await["status"], "ok");

    let version = send(&app, Method::GET, "/version", None).await;
    assert_eq!(body_json(version).await["version"], env!("CARGO_PKG_VERSION"));

    let db_check = send(&app, Method::GET, "/db-check", None).await;
    assert_eq!(db_check.status(), StatusCode::OK);
    assert_eq!(body_json(db_check).await["backend"], "sqlite");
}

#[tokio::test]
async fn test_domain_lifecycle() {
    let (app, _) = test_app().await;
    create_site(&app, "Alpha", "500 TL", 10.0, 4.0).await;

    let id = create_domain(&app, "Bets.Example.com").await;

    let duplicate = send(
        &app,
        Method::POST,
        "/api/domains",
        Some(json!({ "domain_name": "bets.example.com" })),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(
        duplicate.headers()[header::CONTENT_TYPE],
        "application/problem+json"
    );

    let invalid = send(
        &app,
        Method::POST,
        "/api/domains",
        Some(json!({ "domain_name": "not a domain" })),
    )
    .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let fetched = send(&app, Method::GET, &format!("/api/domains/{id}"), None).await;
    assert_eq!(body_json(fetched).await["domain_name"], "bets.example.com");

    let sites = send(&app, Method::GET, &format!("/api/domains/{id}/sites"), None).await;
    assert_eq!(body_json(sites).await.as_array().unwrap().len(), 1);

    let deleted = send(&app, Method::DELETE, &format!("/api/domains/{id}"), None).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let missing = send(&app, Method::GET, &format!("/api/domains/{id}"), None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let problem = body_json(missing).await;
    assert_eq!(problem["code"], "NOT_FOUND");
    assert!(problem["trace_id"].is_string());
}

#[tokio::test]
async fn test_domain_lookup_by_name() {
    let (app, _) = test_app().await;
    let id = create_domain(&app, "named.example.com").await;

    let found = send(&app, Method::GET, "/api/domains/by-name/Named.Example.COM", None).await;
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(body_json(found).await["id"], id.to_string());

    let unknown = send(&app, Method::GET, "/api/domains/by-name/nobody.example", None).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let malformed = send(&app, Method::GET, "/api/domains/by-name/bad_host", None).await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_stats_counts() {
    let (app, _) = test_app().await;
    create_site(&app, "Kept", "500 TL", 10.0, 4.0).await;
    let archived = create_site(&app, "Gone", "500 TL", 10.0, 4.0).await;
    let first = create_domain(&app, "first.example").await;
    send(&app, Method::DELETE, &format!("/api/bonus-sites/{archived}"), None).await;
    create_domain(&app, "second.example").await;

    let stats = body_json(send(&app, Method::GET, "/api/stats/dashboard", None).await).await;
    assert_eq!(stats["total_domains"], 2);
    assert_eq!(stats["total_bonus_sites"], 1);
    // first.example got both sites, second.example only the live one
    assert_eq!(stats["performance_records"], 3);

    let scoped = body_json(
        send(&app, Method::GET, &format!("/api/stats/dashboard?domain_id={first}"), None).await,
    )
    .await;
    assert_eq!(scoped["performance_records"], 2);
}

#[tokio::test]
async fn test_link_site_stores_link_and_seeded_record() {
    let (app, state) = test_app().await;
    let domain = create_domain(&app, "linking.example").await;
    let other = create_domain(&app, "other.example").await;
    let site = create_site(&app, "Late", "500 TL", 10.0, 4.0).await;
    let uri = format!("/api/domains/{domain}/sites");

    let linked = send(&app, Method::POST, &uri, Some(json!({ "listing_id": site }))).await;
    assert_eq!(linked.status(), StatusCode::CREATED);
    let relinked = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "listing_id": site, "custom_order": 4 })),
    )
    .await;
    assert_eq!(body_json(relinked).await["custom_order"], 4);

    let records = PerformanceRepository::new(&state.db)
        .list_for_tenant(domain)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].score > 0.0);

    let foreign = send(
        &app,
        Method::POST,
        "/api/bonus-sites",
        Some(json!({
            "name": "Foreign",
            "tenant_id": other,
            "bonus_amount": "100 TL",
            "affiliate_url": "https://partner.example/foreign"
        })),
    )
    .await;
    let foreign: Uuid = body_json(foreign).await["id"].as_str().unwrap().parse().unwrap();
    let rejected = send(&app, Method::POST, &uri, Some(json!({ "listing_id": foreign }))).await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(rejected).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_malformed_json_is_problem_response() {
    let (app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/domains")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_bonus_site_crud() {
    let (app, _) = test_app().await;
    let id = create_site(&app, "Crud", "1.500 TL", 10.0, 4.0).await;

    let fetched = body_json(send(&app, Method::GET, &format!("/api/bonus-sites/{id}"), None).await).await;
    assert_eq!(fetched["bonus_value"], 1500);

    let patched = send(
        &app,
        Method::PATCH,
        &format!("/api/bonus-sites/{id}"),
        Some(json!({ "bonus_amount": "2.000 TL", "rating": 4.8 })),
    )
    .await;
    assert_eq!(patched.status(), StatusCode::OK);
    assert_eq!(body_json(patched).await["bonus_value"], 2000);

    let bad_rating = send(
        &app,
        Method::PATCH,
        &format!("/api/bonus-sites/{id}"),
        Some(json!({ "rating": 9.0 })),
    )
    .await;
    assert_eq!(bad_rating.status(), StatusCode::BAD_REQUEST);

    let archived = send(&app, Method::DELETE, &format!("/api/bonus-sites/{id}"), None).await;
    assert_eq!(body_json(archived).await["is_archived"], true);

    let listed = body_json(send(&app, Method::GET, "/api/bonus-sites", None).await).await;
    assert!(listed.as_array().unwrap().is_empty());

    let unknown = send(
        &app,
        Method::GET,
        &format!("/api/bonus-sites/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tracking_then_ranking_reorders_feed() {
    let (app, state) = test_app().await;
    // Heuristic favours "Rich": 40 + 15 + 18 vs 4 + 10 + 16.
    let rich = create_site(&app, "Rich", "1000 TL", 5.0, 4.5).await;
    let engaging = create_site(&app, "Engaging", "100 TL", 10.0, 4.0).await;
    let domain = create_domain(&app, "rank.example").await;

    let feed = body_json(send(&app, Method::GET, &format!("/api/domains/{domain}/sites"), None).await).await;
    assert_eq!(feed[0]["id"], rich.to_string());
    assert_eq!(feed[0]["is_featured"], true);

    // Push "Engaging" past the observed threshold with strong engagement.
    let mut events = Vec::new();
    for _ in 0..12 {
        events.push(json!({ "tenant_id": domain, "listing_id": engaging, "event_type": "impression" }));
    }
    for _ in 0..6 {
        events.push(json!({ "tenant_id": domain, "listing_id": engaging, "event_type": "cta_click" }));
    }
    events.push(json!({ "tenant_id": domain, "listing_id": engaging, "event_type": "scroll", "value": 100.0 }));
    events.push(json!({ "tenant_id": domain, "listing_id": engaging, "event_type": "time_on_page", "value": 400.0 }));
    let batch = send(&app, Method::POST, "/api/track/batch", Some(json!({ "events": events }))).await;
    assert_eq!(batch.status(), StatusCode::OK);
    assert_eq!(body_json(batch).await["accepted"], 20);

    let ranked = send(
        &app,
        Method::POST,
        &format!("/api/domains/{domain}/update-rankings"),
        None,
    )
    .await;
    assert_eq!(body_json(ranked).await["updated"], 2);

    let record = PerformanceRepository::new(&state.db)
        .find(domain, engaging)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.impressions, 12);
    assert_eq!(record.cta_clicks, 6);

    let feed = body_json(send(&app, Method::GET, &format!("/api/domains/{domain}/sites"), None).await).await;
    assert_eq!(feed[0]["id"], engaging.to_string());
    assert_eq!(feed[0]["rank"], 1);
    assert_eq!(feed[1]["rank"], 2);
}

#[tokio::test]
async fn test_track_event_validation_and_best_effort() {
    let (app, _) = test_app().await;

    let unknown_kind = send(
        &app,
        Method::POST,
        "/api/track/event",
        Some(json!({ "tenant_id": Uuid::new_v4(), "listing_id": Uuid::new_v4(), "event_type": "hover" })),
    )
    .await;
    assert_eq!(unknown_kind.status(), StatusCode::BAD_REQUEST);

    // Tracking never surfaces storage failures to the client.
    let dropped = send(
        &app,
        Method::POST,
        "/api/track/event",
        Some(json!({ "tenant_id": Uuid::new_v4(), "listing_id": Uuid::new_v4(), "event_type": "impression" })),
    )
    .await;
    assert_eq!(dropped.status(), StatusCode::OK);
    assert_eq!(body_json(dropped).await["status"], "tracked");

    let bad_batch = send(
        &app,
        Method::POST,
        "/api/track/batch",
        Some(json!({ "events": [
            { "tenant_id": Uuid::new_v4(), "listing_id": Uuid::new_v4(), "event_type": "impression" },
            { "tenant_id": Uuid::new_v4(), "listing_id": Uuid::new_v4(), "event_type": "nope" }
        ] })),
    )
    .await;
    assert_eq!(bad_batch.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(bad_batch).await["details"]["index"], 1);
}

#[tokio::test]
async fn test_affiliate_redirect_counts_click() {
    let (app, state) = test_app().await;
    let site = create_site(&app, "Go", "100 TL", 10.0, 4.0).await;
    let domain = create_domain(&app, "go.example").await;

    let response = send(
        &app,
        Method::GET,
        &format!("/api/go/{site}/match-1?tenant_id={domain}"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "https://partner.example/Go");

    let record = PerformanceRepository::new(&state.db)
        .find(domain, site)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.affiliate_clicks, 1);

    let missing = send(&app, Method::GET, &format!("/api/go/{}/m", Uuid::new_v4()), None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sports_endpoints() {
    let (app, _) = test_app().await;

    let first = body_json(send(&app, Method::GET, "/api/sports/scores", None).await).await;
    assert_eq!(first["count"], 2);
    assert_eq!(first["from_cache"], false);
    assert_eq!(first["matches"][0]["id"], "live");

    let second = body_json(send(&app, Method::GET, "/api/sports/scores", None).await).await;
    assert_eq!(second["from_cache"], true);
    assert_eq!(second["is_stale"], false);

    let featured = body_json(send(&app, Method::GET, "/api/sports/featured", None).await).await;
    assert_eq!(featured["id"], "live");

    let by_id = send(&app, Method::GET, "/api/sports/match/done", None).await;
    assert_eq!(by_id.status(), StatusCode::OK);
    let slug = body_json(by_id).await["slug"].as_str().unwrap().to_string();
    let by_slug = send(&app, Method::GET, &format!("/api/sports/match-by-slug/{slug}"), None).await;
    assert_eq!(body_json(by_slug).await["id"], "done");

    let unknown = send(&app, Method::GET, "/api/sports/match/nope", None).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scores_unavailable_without_cache() {
    let (app, _) = test_app_with(AppConfig::default(), None).await;

    let response = send(&app, Method::GET, "/api/sports/scores", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let featured = body_json(send(&app, Method::GET, "/api/sports/featured", None).await).await;
    assert!(featured.is_null());

    let status = body_json(send(&app, Method::GET, "/api/admin/api-status", None).await).await;
    assert!(status["error_count"].as_u64().unwrap() >= 1);
    assert_eq!(status["odds_api_configured"], false);
}

#[tokio::test]
async fn test_admin_controls() {
    let (app, _) = test_app().await;

    let refreshed = body_json(send(&app, Method::POST, "/api/admin/refresh-scores", None).await).await;
    assert_eq!(refreshed["ok"], true);
    assert_eq!(refreshed["count"], 2);

    let pinned = send(
        &app,
        Method::POST,
        "/api/admin/featured-match",
        Some(json!({ "match_id": "done" })),
    )
    .await;
    assert_eq!(body_json(pinned).await["featured_match_override"], "done");
    let featured = body_json(send(&app, Method::GET, "/api/sports/featured", None).await).await;
    assert_eq!(featured["id"], "done");

    create_domain(&app, "all.example").await;
    let summary = body_json(send(&app, Method::POST, "/api/admin/update-rankings", None).await).await;
    assert_eq!(summary["tenants"], 1);
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_only() {
    let config = AppConfig {
        rate_limit: RateLimitConfig {
            requests: 2,
            ..RateLimitConfig::default()
        },
        ..AppConfig::default()
    };
    let (app, _) = test_app_with(config, Some(Vec::new())).await;

    for _ in 0..2 {
        let ok = send(&app, Method::GET, "/api/domains", None).await;
        assert_eq!(ok.status(), StatusCode::OK);
    }
    let limited = send(&app, Method::GET, "/api/domains", None).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(body_json(limited).await["code"], "RATE_LIMITED");

    let health = send(&app, Method::GET, "/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);
    let tracked = send(
        &app,
        Method::POST,
        "/api/track/event",
        Some(json!({ "tenant_id": Uuid::new_v4(), "listing_id": Uuid::new_v4(), "event_type": "impression" })),
    )
    .await;
    assert_eq!(tracked.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let (app, _) = test_app().await;

    let doc = body_json(send(&app, Method::GET, "/openapi.json", None).await).await;
    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/api/domains",
        "/api/domains/{id}/sites",
        "/api/track/event",
        "/api/sports/scores",
        "/api/admin/refresh-scores",
        "/api/domains/by-name/{domain_name}",
        "/api/stats/dashboard",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}
