//! # Ranking Scheduler
//!
//! Background task that reranks every active tenant on a fixed tick until the
//! shutdown token fires. A failed tick is logged and retried on the next one.

use std::time::Duration;

use metrics::counter;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::ranking::updater::RankingUpdater;

pub struct RankingScheduler {
    updater: RankingUpdater,
    tick_interval: Duration,
}

impl RankingScheduler {
    pub fn new(updater: RankingUpdater, tick_interval: Duration) -> Self {
        Self {
            updater,
            tick_interval,
        }
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            tick_seconds = self.tick_interval.as_secs(),
            "Starting ranking scheduler"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Ranking scheduler shutdown requested");
                    break;
                }
                _ = sleep(self.tick_interval) => self.tick().await,
            }
        }

        info!("Ranking scheduler stopped");
    }

    async fn tick(&self) {
        match self.updater.update_all().await {
            Ok(summary) => {
                counter!("ranking_scheduler_ticks_total").increment(1);
                info!(
                    tenants = summary.tenants,
                    ranked = summary.records_ranked,
                    failed = summary.failed_tenants.len(),
                    "Scheduled ranking tick completed"
                );
            }
            Err(err) => error!(error = %err, "Scheduled ranking tick failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::SystemClock;
    use crate::ranking::scorer::ScoringStrategy;
    use crate::repositories::{PerformanceRepository, TenantListingRepository};
    use crate::repositories::testing::{insert_listing, insert_tenant, setup_db};

    #[tokio::test]
    async fn stops_on_cancellation() {
        let db = setup_db().await;
        let updater = RankingUpdater::new(db, ScoringStrategy::default(), Arc::new(SystemClock));
        let scheduler = RankingScheduler::new(updater, Duration::from_secs(3600));
        let token = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(token.clone()));
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn ticks_rank_tenants() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "tick.example").await;
        let listing = insert_listing(&db, "Ticked", 100, None, None).await;
        TenantListingRepository::new(&db)
            .upsert(tenant.id, listing.id, 0, true)
            .await
            .unwrap();
        PerformanceRepository::new(&db)
            .get_or_create(tenant.id, listing.id, chrono::Utc::now())
            .await
            .unwrap();

        let updater =
            RankingUpdater::new(db.clone(), ScoringStrategy::default(), Arc::new(SystemClock));
        let scheduler = RankingScheduler::new(updater, Duration::from_millis(10));
        let token = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(token.clone()));

        let repo = PerformanceRepository::new(&db);
        let mut ranked = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let record = repo.find(tenant.id, listing.id).await.unwrap().unwrap();
            if record.rank == 1 {
                ranked = true;
                break;
            }
        }
        token.cancel();
        handle.await.unwrap();

        assert!(ranked, "scheduler never ranked the tenant");
    }
}
