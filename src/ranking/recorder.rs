//! # Event Recorder
//!
//! Entry point for page telemetry. Counter events are applied with a single
//! atomic upsert; scroll and dwell samples update running averages that use
//! the record's impression count as the sample count.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use metrics::counter;
use sea_orm::DatabaseConnection;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::RepositoryError;
use crate::repositories::performance::{Average, Counter, PerformanceRepository};

pub const MAX_SCROLL_DEPTH: f64 = 100.0;

/// Kinds of tracked page events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Impression,
    CtaClick,
    AffiliateClick,
    ScrollDepth,
    DwellTime,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Impression => "impression",
            EventKind::CtaClick => "cta_click",
            EventKind::AffiliateClick => "affiliate_click",
            EventKind::ScrollDepth => "scroll_depth",
            EventKind::DwellTime => "dwell_time",
        }
    }

    fn counter(self) -> Option<Counter> {
        match self {
            EventKind::Impression => Some(Counter::Impressions),
            EventKind::CtaClick => Some(Counter::CtaClicks),
            EventKind::AffiliateClick => Some(Counter::AffiliateClicks),
            EventKind::ScrollDepth | EventKind::DwellTime => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "impression" => Ok(EventKind::Impression),
            "cta_click" => Ok(EventKind::CtaClick),
            "affiliate_click" => Ok(EventKind::AffiliateClick),
            "scroll_depth" | "scroll" | "scroll_depth_sample" => Ok(EventKind::ScrollDepth),
            "dwell_time" | "time_on_page" | "dwell_time_sample" => Ok(EventKind::DwellTime),
            _ => Err(UnknownEventKind(raw.to_string())),
        }
    }
}

/// `(old_avg * n + sample) / (n + 1)`
pub fn running_average(old_avg: f64, n: i64, sample: f64) -> f64 {
    let n = n.max(0) as f64;
    (old_avg * n + sample) / (n + 1.0)
}

/// Applies tracked events to performance records.
#[derive(Clone)]
pub struct EventRecorder {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl EventRecorder {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Record one event for `(tenant_id, listing_id)`, creating the record on
    /// first contact. `value` is ignored for counter events.
    pub async fn record(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
        kind: EventKind,
        value: f64,
    ) -> Result<(), RepositoryError> {
        let repo = PerformanceRepository::new(&self.db);
        let now = self.clock.now();

        if let Some(counter) = kind.counter() {
            repo.increment(tenant_id, listing_id, counter, now).await?;
        } else {
            if !value.is_finite() {
                return Err(RepositoryError::validation_error(format!(
                    "{kind} sample must be a finite number"
                )));
            }

            let (average, sample) = match kind {
                EventKind::ScrollDepth => (Average::ScrollDepth, value.clamp(0.0, MAX_SCROLL_DEPTH)),
                _ => (Average::DwellSeconds, value.max(0.0)),
            };

            let record = repo.get_or_create(tenant_id, listing_id, now).await?;
            let old_avg = match average {
                Average::ScrollDepth => record.avg_scroll_depth,
                Average::DwellSeconds => record.avg_dwell_seconds,
            };
            let updated = running_average(old_avg, record.impressions, sample);
            repo.set_average(record, average, updated, now).await?;
        }

        counter!("tracking_events_recorded_total", "kind" => kind.as_str()).increment(1);
        debug!(%tenant_id, %listing_id, kind = %kind, "Recorded tracking event");
        Ok(())
    }
}
