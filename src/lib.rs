//! # BonusHub Library
//!
//! Backend for a multi-tenant affiliate listing platform: per-domain listing
//! feeds ordered by a performance-based ranking score, page telemetry,
//! cached live sports scores and a sliding-window rate limiter.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod ranking;
pub mod repositories;
pub mod server;
pub mod sports;
pub mod telemetry;
pub use migration;
