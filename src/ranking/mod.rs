//! # Ranking
//!
//! Listing scoring and ordering per tenant: the pure score formulas, the
//! event recorder feeding them, and the updater that turns scores into ranks.

pub mod feed;
pub mod recorder;
pub mod scheduler;
pub mod scorer;
pub mod updater;

pub use feed::{FeedEntry, tenant_feed};
pub use recorder::{EventKind, EventRecorder};
pub use scheduler::RankingScheduler;
pub use scorer::ScoringStrategy;
pub use updater::{RankAllSummary, RankingUpdater};
