//! # Scores cache
//!
//! Single-slot TTL cache in front of a [`ScoresSource`]. Expired reads trigger
//! one refresh at a time; callers arriving during a refresh wait for it and
//! read its result. When a refresh fails the previous data is served marked
//! stale; with no previous data the snapshot is empty and flagged as a failed
//! fetch so callers can report the feed as unavailable.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::sports::client::{ScoresSource, UpstreamError};
use crate::sports::matches::{Match, arrange_matches};

/// Result of a cache read.
#[derive(Debug, Clone)]
pub struct ScoresSnapshot {
    pub matches: Arc<Vec<Match>>,
    pub is_stale: bool,
    pub from_cache: bool,
    /// The read needed a refresh, it failed and there was nothing to fall back on.
    pub last_fetch_failed: bool,
}

/// Operational view of the cache.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStatus {
    pub odds_api_configured: bool,
    pub cache_age_seconds: Option<i64>,
    pub cache_ttl_seconds: i64,
    pub is_stale: bool,
    pub cached_match_count: usize,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub featured_match_override: Option<String>,
}

#[derive(Debug, Default)]
struct CacheState {
    matches: Option<Arc<Vec<Match>>>,
    fetched_at: Option<DateTime<Utc>>,
    error_count: u64,
    last_error: Option<String>,
    /// Bumped after every finished refresh attempt, successful or not.
    attempts: u64,
}

impl CacheState {
    fn fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Option<Arc<Vec<Match>>> {
        let fetched_at = self.fetched_at?;
        if now - fetched_at < ttl {
            self.matches.clone()
        } else {
            None
        }
    }

    /// What a caller sees without fetching: fresh data, stale data, or an empty
    /// failed read when the last attempt failed with nothing cached.
    fn snapshot(&self, now: DateTime<Utc>, ttl: Duration) -> ScoresSnapshot {
        if let Some(matches) = self.fresh(now, ttl) {
            return ScoresSnapshot::cached(matches);
        }
        match &self.matches {
            Some(previous) => ScoresSnapshot {
                matches: Arc::clone(previous),
                is_stale: true,
                from_cache: true,
                last_fetch_failed: false,
            },
            None => ScoresSnapshot {
                matches: Arc::new(Vec::new()),
                is_stale: false,
                from_cache: false,
                last_fetch_failed: self.last_error.is_some(),
            },
        }
    }
}

pub struct ScoresCache {
    source: Arc<dyn ScoresSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    source_configured: bool,
    state: RwLock<CacheState>,
    refresh_guard: Mutex<()>,
    featured_override: RwLock<Option<String>>,
}

impl ScoresCache {
    pub fn new(
        source: Arc<dyn ScoresSource>,
        clock: Arc<dyn Clock>,
        ttl: std::time::Duration,
        source_configured: bool,
    ) -> Self {
        Self {
            source,
            clock,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(120)),
            source_configured,
            state: RwLock::new(CacheState::default()),
            refresh_guard: Mutex::new(()),
            featured_override: RwLock::new(None),
        }
    }

    /// Current matches, refreshing from the source when the TTL has passed.
    pub async fn get_cached(&self) -> ScoresSnapshot {
        let seen_attempts = {
            let state = self.state.read().await;
            if let Some(matches) = state.fresh(self.clock.now(), self.ttl) {
                return ScoresSnapshot::cached(matches);
            }
            state.attempts
        };

        let _refreshing = self.refresh_guard.lock().await;

        // An attempt that finished while this caller waited answers for it,
        // whether it succeeded or not.
        {
            let state = self.state.read().await;
            if let Some(matches) = state.fresh(self.clock.now(), self.ttl) {
                return ScoresSnapshot::cached(matches);
            }
            if state.attempts != seen_attempts {
                return state.snapshot(self.clock.now(), self.ttl);
            }
        }

        match self.fetch().await {
            Ok(matches) => {
                let matches = Arc::new(arrange_matches(matches, self.clock.now()));
                let mut state = self.state.write().await;
                state.matches = Some(Arc::clone(&matches));
                state.fetched_at = Some(self.clock.now());
                state.error_count = 0;
                state.last_error = None;
                state.attempts += 1;
                info!(count = matches.len(), "Scores cache refreshed");
                ScoresSnapshot {
                    matches,
                    is_stale: false,
                    from_cache: false,
                    last_fetch_failed: false,
                }
            }
            Err(err) => {
                counter!("scores_refresh_failures_total").increment(1);
                let mut state = self.state.write().await;
                state.error_count += 1;
                state.last_error = Some(err.to_string());
                state.attempts += 1;
                warn!(error = %err, errors = state.error_count, "Scores refresh failed");

                state.snapshot(self.clock.now(), self.ttl)
            }
        }
    }

    /// Primary scores, falling back to upcoming fixtures when the primary pass
    /// succeeded but came back empty.
    async fn fetch(&self) -> Result<Vec<Match>, UpstreamError> {
        let primary = self.source.fetch_scores().await?;
        if !primary.is_empty() {
            return Ok(primary);
        }

        match self.source.fetch_upcoming().await {
            Ok(upcoming) => Ok(upcoming),
            Err(err) => {
                warn!(error = %err, "Upcoming fixtures fallback failed, keeping empty result");
                Ok(primary)
            }
        }
    }

    /// Expire the cache so the next read refreshes regardless of TTL.
    pub async fn force_refresh(&self) {
        self.state.write().await.fetched_at = None;
    }

    pub async fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        let state = self.state.read().await;
        let age = state.fetched_at.map(|at| (now - at).num_seconds());

        CacheStatus {
            odds_api_configured: self.source_configured,
            cache_age_seconds: age,
            cache_ttl_seconds: self.ttl.num_seconds(),
            is_stale: state.matches.is_some() && state.fresh(now, self.ttl).is_none(),
            cached_match_count: state.matches.as_ref().map_or(0, |m| m.len()),
            error_count: state.error_count,
            last_error: state.last_error.clone(),
            featured_match_override: self.featured_override.read().await.clone(),
        }
    }

    /// Pin a match as featured, or clear the pin with `None`.
    pub async fn set_featured_override(&self, match_id: Option<String>) {
        *self.featured_override.write().await = match_id.filter(|id| !id.trim().is_empty());
    }

    /// The pinned match when it is still in the feed, else the first arranged match.
    pub async fn featured(&self) -> Option<Match> {
        let snapshot = self.get_cached().await;
        let pinned = self.featured_override.read().await.clone();

        pinned
            .and_then(|id| snapshot.matches.iter().find(|m| m.id == id).cloned())
            .or_else(|| snapshot.matches.first().cloned())
    }

    pub async fn find_by_id(&self, match_id: &str) -> Option<Match> {
        self.get_cached()
            .await
            .matches
            .iter()
            .find(|m| m.id == match_id)
            .cloned()
    }

    pub async fn find_by_slug(&self, slug: &str) -> Option<Match> {
        self.get_cached()
            .await
            .matches
            .iter()
            .find(|m| m.slug == slug)
            .cloned()
    }
}

impl ScoresSnapshot {
    fn cached(matches: Arc<Vec<Match>>) -> Self {
        Self {
            matches,
            is_stale: false,
            from_cache: true,
            last_fetch_failed: false,
        }
    }
}
