//! # Ranking Updater
//!
//! Scores every performance record of a tenant, then assigns a dense 1-based
//! rank by score and flags the top two as featured.
//!
//! A pass is idempotent: it overwrites score, rank and featured flag of every
//! record it touches, so a failed pass can simply be re-run. It is not
//! transactional against concurrent event writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::RepositoryError;
use crate::models::listing::Model as ListingModel;
use crate::ranking::scorer::{ListingAttributes, ScoringStrategy, TrafficSnapshot, is_featured_rank};
use crate::repositories::{
    ListingRepository, PerformanceRepository, TenantListingRepository, TenantRepository,
};

/// Outcome of ranking every active tenant.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct RankAllSummary {
    pub tenants: usize,
    pub records_ranked: usize,
    pub failed_tenants: Vec<Uuid>,
}

#[derive(Clone)]
pub struct RankingUpdater {
    db: DatabaseConnection,
    scoring: ScoringStrategy,
    clock: Arc<dyn Clock>,
}

impl RankingUpdater {
    pub fn new(db: DatabaseConnection, scoring: ScoringStrategy, clock: Arc<dyn Clock>) -> Self {
        Self { db, scoring, clock }
    }

    /// Rescore and rerank one tenant. Returns the number of records ranked.
    pub async fn update_rankings(&self, tenant_id: Uuid) -> Result<usize, RepositoryError> {
        let started = Instant::now();
        let now = self.clock.now();
        let performance = PerformanceRepository::new(&self.db);

        let records = performance.list_for_tenant(tenant_id).await?;
        let listing_ids: Vec<Uuid> = records.iter().map(|r| r.listing_id).collect();
        let listings: HashMap<Uuid, ListingModel> = ListingRepository::new(&self.db)
            .find_by_ids(&listing_ids)
            .await?
            .into_iter()
            .map(|listing| (listing.id, listing))
            .collect();
        let link_active: HashMap<Uuid, bool> = TenantListingRepository::new(&self.db)
            .list_for_tenant(tenant_id)
            .await?
            .into_iter()
            .map(|link| (link.listing_id, link.is_active))
            .collect();

        let mut eligible = HashSet::with_capacity(records.len());
        for record in &records {
            let Some(listing) = listings.get(&record.listing_id) else {
                debug!(
                    %tenant_id,
                    listing_id = %record.listing_id,
                    "Skipping performance record for missing listing"
                );
                continue;
            };

            let linked = link_active.get(&listing.id).copied().unwrap_or(false);
            if !listing.is_live() || !listing.is_visible_to(tenant_id) || !linked {
                if record.rank != 0 || record.is_featured {
                    performance.set_rank(record.id, 0, false, now).await?;
                }
                continue;
            }

            let (score, source) = self.scoring.score(
                &ListingAttributes::from(listing),
                &TrafficSnapshot::from(record),
                now,
            );
            if let Err(err) = performance.set_score(record.id, score, now).await {
                counter!("ranking_score_write_failures_total").increment(1);
                warn!(
                    error = %err,
                    record_id = %record.id,
                    "Failed to persist score, leaving record out of this pass"
                );
                continue;
            }
            eligible.insert(record.id);
            debug!(listing_id = %listing.id, score, ?source, "Scored listing");
        }

        let ordered = performance.list_for_tenant_by_score(tenant_id).await?;
        let mut rank = 0;
        for record in ordered.iter().filter(|r| eligible.contains(&r.id)) {
            rank += 1;
            performance
                .set_rank(record.id, rank, is_featured_rank(rank), now)
                .await?;
        }

        let ranked = rank as usize;
        histogram!("ranking_pass_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
        info!(%tenant_id, ranked, skipped = records.len() - ranked, "Ranking pass completed");
        Ok(ranked)
    }

    /// Rank every active tenant. A failing tenant is logged and does not stop the others.
    pub async fn update_all(&self) -> Result<RankAllSummary, RepositoryError> {
        let tenant_ids = TenantRepository::new(&self.db).list_active_ids().await?;
        let mut summary = RankAllSummary {
            tenants: tenant_ids.len(),
            ..RankAllSummary::default()
        };

        for tenant_id in tenant_ids {
            match self.update_rankings(tenant_id).await {
                Ok(ranked) => summary.records_ranked += ranked,
                Err(err) => {
                    warn!(error = %err, %tenant_id, "Ranking pass failed for tenant");
                    summary.failed_tenants.push(tenant_id);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::performance::Model as PerformanceModel;
    use crate::repositories::listing::ListingChanges;
    use crate::repositories::performance::Counter;
    use crate::repositories::testing::{insert_listing, insert_tenant, setup_db};
    use chrono::Utc;
    use sea_orm::ConnectionTrait;

    fn updater(db: &DatabaseConnection) -> RankingUpdater {
        RankingUpdater::new(db.clone(), ScoringStrategy::default(), Arc::new(SystemClock))
    }

    /// Active link plus a blank performance record.
    async fn record_for(
        db: &DatabaseConnection,
        tenant_id: Uuid,
        listing_id: Uuid,
    ) -> PerformanceModel {
        TenantListingRepository::new(db)
            .upsert(tenant_id, listing_id, 0, true)
            .await
            .unwrap();
        unlinked_record_for(db, tenant_id, listing_id).await
    }

    async fn unlinked_record_for(
        db: &DatabaseConnection,
        tenant_id: Uuid,
        listing_id: Uuid,
    ) -> PerformanceModel {
        PerformanceRepository::new(db)
            .get_or_create(tenant_id, listing_id, Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ranks_are_dense_and_top_two_featured() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "rank.example").await;
        let mut listing_ids = Vec::new();
        for (name, bonus) in [("A", 1000), ("B", 750), ("C", 250), ("D", 0)] {
            let listing = insert_listing(&db, name, bonus, Some(8.0), Some(4.0)).await;
            record_for(&db, tenant.id, listing.id).await;
            listing_ids.push(listing.id);
        }

        let ranked = updater(&db).update_rankings(tenant.id).await.unwrap();
        assert_eq!(ranked, 4);

        let repo = PerformanceRepository::new(&db);
        let mut expected_rank = 0;
        for listing_id in &listing_ids {
            expected_rank += 1;
            let record = repo.find(tenant.id, *listing_id).await.unwrap().unwrap();
            assert_eq!(record.rank, expected_rank);
            assert_eq!(record.is_featured, expected_rank <= 2);
        }
        let a = repo.find(tenant.id, listing_ids[0]).await.unwrap().unwrap();
        // 40 + 12 + 16
        assert!((a.score - 68.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn observed_formula_applies_above_ten_impressions() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "observed.example").await;
        let listing = insert_listing(&db, "Busy", 750, Some(8.0), Some(4.9)).await;
        record_for(&db, tenant.id, listing.id).await;
        let repo = PerformanceRepository::new(&db);
        let now = Utc::now();

        for _ in 0..11 {
            repo.increment(tenant.id, listing.id, Counter::Impressions, now)
                .await
                .unwrap();
        }
        repo.increment(tenant.id, listing.id, Counter::CtaClicks, now)
            .await
            .unwrap();

        updater(&db).update_rankings(tenant.id).await.unwrap();

        let record = repo.find(tenant.id, listing.id).await.unwrap().unwrap();
        // cta_rate = 1/11*100, capped term: min(90.9.., 30) = 30; no dwell or scroll
        assert!((record.score - 30.0).abs() < 1e-9);
        assert_eq!(record.rank, 1);
    }

    #[tokio::test]
    async fn excluded_and_dangling_records_are_not_ranked() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "mixed.example").await;
        let live = insert_listing(&db, "Live", 100, None, None).await;
        let archived = insert_listing(&db, "Archived", 900, None, None).await;
        let unlinked = insert_listing(&db, "Unlinked", 900, None, None).await;
        let never_linked = insert_listing(&db, "NeverLinked", 900, None, None).await;
        let dangling = Uuid::new_v4();

        for id in [live.id, archived.id, unlinked.id] {
            record_for(&db, tenant.id, id).await;
        }
        unlinked_record_for(&db, tenant.id, dangling).await;
        let orphan = unlinked_record_for(&db, tenant.id, never_linked.id).await;
        let stale = record_for(&db, tenant.id, archived.id).await;
        for id in [stale.id, orphan.id] {
            PerformanceRepository::new(&db)
                .set_rank(id, 1, true, Utc::now())
                .await
                .unwrap();
        }
        ListingRepository::new(&db)
            .update(
                archived.id,
                ListingChanges {
                    is_archived: Some(true),
                    ..ListingChanges::default()
                },
            )
            .await
            .unwrap();
        TenantListingRepository::new(&db)
            .upsert(tenant.id, unlinked.id, 0, false)
            .await
            .unwrap();

        let ranked = updater(&db).update_rankings(tenant.id).await.unwrap();
        assert_eq!(ranked, 1);

        let repo = PerformanceRepository::new(&db);
        let live_record = repo.find(tenant.id, live.id).await.unwrap().unwrap();
        assert_eq!((live_record.rank, live_record.is_featured), (1, true));
        let archived_record = repo.find(tenant.id, archived.id).await.unwrap().unwrap();
        assert_eq!((archived_record.rank, archived_record.is_featured), (0, false));
        let dangling_record = repo.find(tenant.id, dangling).await.unwrap().unwrap();
        assert_eq!(dangling_record.rank, 0);
        // Tracked but never linked: not in the feed, so no stored rank either.
        let orphan_record = repo.find(tenant.id, never_linked.id).await.unwrap().unwrap();
        assert_eq!((orphan_record.rank, orphan_record.is_featured), (0, false));
    }

    #[tokio::test]
    async fn record_with_failed_score_write_is_left_out() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "writes.example").await;
        let blocked = insert_listing(&db, "Blocked", 1000, Some(5.0), Some(5.0)).await;
        let open = insert_listing(&db, "Open", 100, None, None).await;
        record_for(&db, tenant.id, blocked.id).await;
        record_for(&db, tenant.id, open.id).await;

        // Score writes fail for the one record carrying three CTA clicks.
        let repo = PerformanceRepository::new(&db);
        for _ in 0..3 {
            repo.increment(tenant.id, blocked.id, Counter::CtaClicks, Utc::now())
                .await
                .unwrap();
        }
        db.execute_unprepared(
            "CREATE TRIGGER block_score_write BEFORE UPDATE OF score ON listing_performance \
             WHEN OLD.cta_clicks = 3 BEGIN SELECT RAISE(ABORT, 'score write blocked'); END;",
        )
        .await
        .unwrap();

        let ranked = updater(&db).update_rankings(tenant.id).await.unwrap();
        assert_eq!(ranked, 1);

        let blocked_record = repo.find(tenant.id, blocked.id).await.unwrap().unwrap();
        assert_eq!(blocked_record.score, 0.0);
        assert_eq!((blocked_record.rank, blocked_record.is_featured), (0, false));
        let open_record = repo.find(tenant.id, open.id).await.unwrap().unwrap();
        assert_eq!((open_record.rank, open_record.is_featured), (1, true));
    }

    #[tokio::test]
    async fn equal_scores_rank_by_listing_id() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "tie.example").await;
        let mut ids = Vec::new();
        for name in ["X", "Y", "Z"] {
            let listing = insert_listing(&db, name, 500, Some(10.0), Some(4.0)).await;
            record_for(&db, tenant.id, listing.id).await;
            ids.push(listing.id);
        }
        ids.sort();

        let runner = updater(&db);
        runner.update_rankings(tenant.id).await.unwrap();
        // Re-running leaves the result unchanged.
        runner.update_rankings(tenant.id).await.unwrap();

        let repo = PerformanceRepository::new(&db);
        for (index, id) in ids.iter().enumerate() {
            let record = repo.find(tenant.id, *id).await.unwrap().unwrap();
            assert_eq!(record.rank, index as i32 + 1);
        }
    }

    #[tokio::test]
    async fn update_all_covers_every_active_tenant() {
        let db = setup_db().await;
        let first = insert_tenant(&db, "one.example").await;
        let second = insert_tenant(&db, "two.example").await;
        let listing = insert_listing(&db, "Shared", 300, None, None).await;
        record_for(&db, first.id, listing.id).await;
        record_for(&db, second.id, listing.id).await;

        let summary = updater(&db).update_all().await.unwrap();

        assert_eq!(summary.tenants, 2);
        assert_eq!(summary.records_ranked, 2);
        assert!(summary.failed_tenants.is_empty());
    }
}
