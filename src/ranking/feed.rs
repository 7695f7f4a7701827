//! # Listing feed
//!
//! Builds a tenant's ordered listing feed. Rank and featured flag are derived
//! from the current sort on every read rather than trusted from storage, so
//! the feed stays correct between ranking passes.

use std::cmp::Ordering;
use std::collections::HashMap;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::listing::Model as ListingModel;
use crate::ranking::scorer::is_featured_rank;
use crate::repositories::{ListingRepository, PerformanceRepository, TenantListingRepository};

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub listing: ListingModel,
    pub custom_order: i32,
    pub score: f64,
    pub rank: i32,
    pub is_featured: bool,
}

/// Sort by score descending, then custom order, then listing id, and number
/// the result from 1.
pub fn order_feed(mut entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.custom_order.cmp(&b.custom_order))
            .then(a.listing.id.cmp(&b.listing.id))
    });

    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index as i32 + 1;
        entry.is_featured = is_featured_rank(entry.rank);
    }
    entries
}

/// Live listings linked to a tenant, ordered for display.
///
/// Listings without a performance record yet score 0.
pub async fn tenant_feed(
    db: &DatabaseConnection,
    tenant_id: Uuid,
) -> Result<Vec<FeedEntry>, RepositoryError> {
    let links = TenantListingRepository::new(db)
        .list_active_for_tenant(tenant_id)
        .await?;
    let listing_ids: Vec<Uuid> = links.iter().map(|link| link.listing_id).collect();

    let mut listings: HashMap<Uuid, ListingModel> = ListingRepository::new(db)
        .find_by_ids(&listing_ids)
        .await?
        .into_iter()
        .filter(|listing| listing.is_live() && listing.is_visible_to(tenant_id))
        .map(|listing| (listing.id, listing))
        .collect();
    let scores: HashMap<Uuid, f64> = PerformanceRepository::new(db)
        .list_for_tenant(tenant_id)
        .await?
        .into_iter()
        .map(|record| (record.listing_id, record.score))
        .collect();

    let entries = links
        .into_iter()
        .filter_map(|link| {
            let listing = listings.remove(&link.listing_id)?;
            Some(FeedEntry {
                score: scores.get(&listing.id).copied().unwrap_or(0.0),
                listing,
                custom_order: link.custom_order,
                rank: 0,
                is_featured: false,
            })
        })
        .collect();

    Ok(order_feed(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::testing::{insert_listing, insert_tenant, setup_db};
    use chrono::Utc;

    #[tokio::test]
    async fn feed_orders_by_score_then_custom_order() {
        let db = setup_db().await;
        let tenant = insert_tenant(&db, "feed.example").await;
        let links = TenantListingRepository::new(&db);
        let perf = PerformanceRepository::new(&db);
        let now = Utc::now();

        let low = insert_listing(&db, "Low", 100, None, None).await;
        let high = insert_listing(&db, "High", 100, None, None).await;
        let tie_first = insert_listing(&db, "TieFirst", 100, None, None).await;
        let unscored = insert_listing(&db, "Unscored", 100, None, None).await;
        let hidden = insert_listing(&db, "Hidden", 100, None, None).await;

        links.upsert(tenant.id, low.id, 0, true).await.unwrap();
        links.upsert(tenant.id, high.id, 5, true).await.unwrap();
        links.upsert(tenant.id, tie_first.id, 1, true).await.unwrap();
        links.upsert(tenant.id, unscored.id, 0, true).await.unwrap();
        links.upsert(tenant.id, hidden.id, 0, false).await.unwrap();

        for (listing_id, score) in [(low.id, 10.0), (high.id, 50.0), (tie_first.id, 10.0)] {
            let record = perf.get_or_create(tenant.id, listing_id, now).await.unwrap();
            perf.set_score(record.id, score, now).await.unwrap();
        }
        // A stale stored rank must not leak into the feed.
        let stale = perf.find(tenant.id, low.id).await.unwrap().unwrap();
        perf.set_rank(stale.id, 1, true, now).await.unwrap();

        let feed = tenant_feed(&db, tenant.id).await.unwrap();
        let names: Vec<&str> = feed.iter().map(|e| e.listing.name.as_str()).collect();
        assert_eq!(names, ["High", "Low", "TieFirst", "Unscored"]);

        let ranks: Vec<(i32, bool)> = feed.iter().map(|e| (e.rank, e.is_featured)).collect();
        assert_eq!(ranks, [(1, true), (2, true), (3, false), (4, false)]);
    }
}
