//! # Rate limiting
//!
//! Process-local sliding-log limiter keyed by client address, and the axum
//! middleware that applies it to the `/api` surface.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RateLimitConfig;
use crate::error::rate_limited;

pub static RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");

/// Sliding-log limiter: a client may make at most `max_requests` requests in
/// any `window`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    exempt_prefixes: Vec<String>,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            exempt_prefixes: Vec::new(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests as usize,
            Duration::from_secs(config.window_seconds),
        )
        .with_exempt_prefixes(config.exempt_prefixes.clone())
    }

    pub fn with_exempt_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.exempt_prefixes = prefixes;
        self
    }

    /// Whether requests to `path` bypass the limiter.
    pub fn is_exempt(&self, path: &str) -> bool {
        !under_prefix(path, "/api")
            || self
                .exempt_prefixes
                .iter()
                .any(|prefix| under_prefix(path, prefix))
    }

    /// Count a request from `client`. Returns whether it is allowed and how
    /// many requests remain in the current window.
    pub fn is_allowed(&self, client: &str) -> (bool, usize) {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> (bool, usize) {
        let mut clients = self.lock();
        let log = clients.entry(client.to_string()).or_default();
        prune(log, now, self.window);

        if log.len() >= self.max_requests {
            return (false, 0);
        }
        log.push_back(now);
        (true, self.max_requests - log.len())
    }

    /// Whole seconds until the oldest request in the window expires.
    pub fn retry_after(&self, client: &str) -> u64 {
        self.retry_after_at(client, Instant::now())
    }

    pub fn retry_after_at(&self, client: &str, now: Instant) -> u64 {
        let clients = self.lock();
        let Some(oldest) = clients.get(client).and_then(|log| log.front()) else {
            return 0;
        };
        let remaining = self
            .window
            .saturating_sub(now.saturating_duration_since(*oldest));
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    /// Drop clients with no request inside the window. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, log| {
            prune(log, now, self.window);
            !log.is_empty()
        });
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Matches `prefix` itself or anything below it, on segment boundaries.
fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while log
        .front()
        .is_some_and(|ts| now.saturating_duration_since(*ts) >= window)
    {
        log.pop_front();
    }
}

/// Client key: first `X-Forwarded-For` hop, else the peer address.
fn client_key(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the limiter on non-exempt `/api` routes.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<SlidingWindowLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let client = client_key(&request);
    let (allowed, remaining) = limiter.is_allowed(&client);

    if !allowed {
        let retry_after = limiter.retry_after(&client);
        counter!("rate_limit_rejections_total").increment(1);
        debug!(client = %client, retry_after, "Rate limit exceeded");

        let mut response = rate_limited(retry_after).into_response();
        response
            .headers_mut()
            .insert(RATE_LIMIT_REMAINING_HEADER.clone(), HeaderValue::from(0));
        return response;
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING_HEADER.clone(), HeaderValue::from(remaining));
    response
}

/// Periodically evict idle clients until shutdown.
pub async fn run_sweeper(
    limiter: Arc<SlidingWindowLimiter>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!(interval_seconds = interval.as_secs(), "Starting rate limit sweeper");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let evicted = limiter.evict_idle();
                if evicted > 0 {
                    debug!(evicted, tracked = limiter.tracked_clients(), "Evicted idle rate limit clients");
                }
            }
        }
    }
    info!("Rate limit sweeper stopped");
}
