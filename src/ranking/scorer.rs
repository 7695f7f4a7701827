//! # Listing Scorer
//!
//! Turns a listing's static attributes, or the traffic recorded for it on one
//! tenant, into a ranking score. Two formulas exist:
//!
//! * **heuristic**: bonus size, wagering requirement and rating, used until a
//!   record has seen more than [`OBSERVED_MIN_IMPRESSIONS`] impressions;
//! * **observed**: click-through rate, dwell time and scroll depth.
//!
//! Every term carries its own cap; there is no cap on the total. Missing or
//! non-finite inputs fall back to documented defaults instead of failing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{listing, performance};

/// Records with more impressions than this are scored from observed traffic.
pub const OBSERVED_MIN_IMPRESSIONS: i64 = 10;

/// Ranks up to and including this one are featured.
pub const FEATURED_RANK_CUTOFF: i32 = 2;

const DEFAULT_RATING: f64 = 4.0;
const DEFAULT_TURNOVER: f64 = 10.0;
const MAX_RATING: f64 = 5.0;
const CAMPAIGN_UNSET_BONUS: f64 = 10.0;

/// Heuristic formula in force for a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicVariant {
    #[default]
    Standard,
    /// Adds up to 20 points for campaigns started in the last 20 days.
    CampaignFreshness,
}

/// Observed-traffic formula in force for a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObservedVariant {
    #[default]
    Standard,
    /// Adds up to 25 points for CTA clicks that convert to affiliate clicks.
    WithConversion,
}

/// Returned when a variant name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scoring variant '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for HeuristicVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "campaign_freshness" => Ok(Self::CampaignFreshness),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for ObservedVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "with_conversion" => Ok(Self::WithConversion),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Which formula produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Heuristic,
    Observed,
}

/// Static listing inputs to the heuristic formula.
#[derive(Debug, Clone, Default)]
pub struct ListingAttributes {
    pub bonus_value: Option<f64>,
    pub turnover_requirement: Option<f64>,
    pub rating: Option<f64>,
    pub campaign_start: Option<DateTime<Utc>>,
}

impl From<&listing::Model> for ListingAttributes {
    fn from(listing: &listing::Model) -> Self {
        Self {
            bonus_value: Some(listing.bonus_value as f64),
            turnover_requirement: listing.turnover_requirement,
            rating: listing.rating,
            campaign_start: listing.campaign_start.map(|ts| ts.with_timezone(&Utc)),
        }
    }
}

/// Traffic inputs to the observed formula.
#[derive(Debug, Clone, Default)]
pub struct TrafficSnapshot {
    pub impressions: i64,
    pub cta_clicks: i64,
    pub affiliate_clicks: i64,
    pub avg_dwell_seconds: f64,
    pub avg_scroll_depth: f64,
}

impl From<&performance::Model> for TrafficSnapshot {
    fn from(record: &performance::Model) -> Self {
        Self {
            impressions: record.impressions,
            cta_clicks: record.cta_clicks,
            affiliate_clicks: record.affiliate_clicks,
            avg_dwell_seconds: record.avg_dwell_seconds,
            avg_scroll_depth: record.avg_scroll_depth,
        }
    }
}

/// Whether a record with this many impressions is scored from traffic.
pub fn uses_observed(impressions: i64) -> bool {
    impressions > OBSERVED_MIN_IMPRESSIONS
}

/// Whether a rank earns the featured badge.
pub fn is_featured_rank(rank: i32) -> bool {
    (1..=FEATURED_RANK_CUTOFF).contains(&rank)
}

/// The pair of formula variants selected at configuration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringStrategy {
    pub heuristic: HeuristicVariant,
    pub observed: ObservedVariant,
}

impl ScoringStrategy {
    pub fn new(heuristic: HeuristicVariant, observed: ObservedVariant) -> Self {
        Self {
            heuristic,
            observed,
        }
    }

    /// Score a record, choosing the formula by its impression count.
    pub fn score(
        &self,
        attributes: &ListingAttributes,
        traffic: &TrafficSnapshot,
        now: DateTime<Utc>,
    ) -> (f64, ScoreSource) {
        if uses_observed(traffic.impressions) {
            (self.observed_score(traffic), ScoreSource::Observed)
        } else {
            (self.heuristic_score(attributes, now), ScoreSource::Heuristic)
        }
    }

    /// Heuristic score from static listing attributes.
    pub fn heuristic_score(&self, attributes: &ListingAttributes, now: DateTime<Utc>) -> f64 {
        let base = bonus_term(attributes.bonus_value)
            + turnover_term(attributes.turnover_requirement)
            + rating_term(attributes.rating);

        match self.heuristic {
            HeuristicVariant::Standard => base,
            HeuristicVariant::CampaignFreshness => {
                base + freshness_term(attributes.campaign_start, now)
            }
        }
    }

    /// Observed score from accumulated traffic.
    pub fn observed_score(&self, traffic: &TrafficSnapshot) -> f64 {
        let base = cta_term(traffic) + dwell_term(traffic) + scroll_term(traffic);

        match self.observed {
            ObservedVariant::Standard => base,
            ObservedVariant::WithConversion => base + conversion_term(traffic),
        }
    }
}

fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

fn bonus_term(bonus_value: Option<f64>) -> f64 {
    (finite_or(bonus_value, 0.0).max(0.0) / 25.0).min(40.0)
}

fn turnover_term(turnover: Option<f64>) -> f64 {
    (20.0 - finite_or(turnover, DEFAULT_TURNOVER)).max(0.0)
}

fn rating_term(rating: Option<f64>) -> f64 {
    finite_or(rating, DEFAULT_RATING).clamp(0.0, MAX_RATING) * 4.0
}

fn freshness_term(campaign_start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match campaign_start {
        // A campaign starting in the future counts as starting today.
        Some(start) => (20.0 - (now - start).num_days().max(0) as f64).max(0.0),
        None => CAMPAIGN_UNSET_BONUS,
    }
}

fn cta_term(traffic: &TrafficSnapshot) -> f64 {
    let cta_rate = traffic.cta_clicks as f64 / traffic.impressions.max(1) as f64 * 100.0;
    (cta_rate * 10.0).min(30.0)
}

fn dwell_term(traffic: &TrafficSnapshot) -> f64 {
    (finite_or(Some(traffic.avg_dwell_seconds), 0.0) / 10.0).min(20.0)
}

fn scroll_term(traffic: &TrafficSnapshot) -> f64 {
    (finite_or(Some(traffic.avg_scroll_depth), 0.0) / 4.0).min(25.0)
}

fn conversion_term(traffic: &TrafficSnapshot) -> f64 {
    let conversion = traffic.affiliate_clicks as f64 / traffic.cta_clicks.max(1) as f64;
    (conversion * 100.0 * 5.0).min(25.0)
}
