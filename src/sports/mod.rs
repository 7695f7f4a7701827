//! # Sports scores
//!
//! Live scores and fixtures from The Odds API, served through a TTL cache
//! with stale fallback.

pub mod cache;
pub mod client;
pub mod matches;

pub use cache::{CacheStatus, ScoresCache, ScoresSnapshot};
pub use client::{OddsApiClient, ScoresSource, UpstreamError};
pub use matches::Match;
