//! # Performance Repository
//!
//! Storage for per-(tenant, listing) performance records: atomic counter
//! upserts, running-average writes, and the score/rank writes of a ranking pass.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::performance::{
    self, ActiveModel as PerformanceActiveModel, Entity as Performance, Model as PerformanceModel,
};

/// Monotonic counters on a performance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Impressions,
    CtaClicks,
    AffiliateClicks,
}

impl Counter {
    fn column(self) -> performance::Column {
        match self {
            Counter::Impressions => performance::Column::Impressions,
            Counter::CtaClicks => performance::Column::CtaClicks,
            Counter::AffiliateClicks => performance::Column::AffiliateClicks,
        }
    }
}

/// Running averages on a performance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    DwellSeconds,
    ScrollDepth,
}

/// Repository for performance record operations
pub struct PerformanceRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> PerformanceRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Add one to `counter`, creating the record if this is its first event.
    ///
    /// Runs as a single `INSERT .. ON CONFLICT DO UPDATE`, so concurrent
    /// increments are never lost.
    pub async fn increment(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
        counter: Counter,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut record = blank_record(tenant_id, listing_id, now);
        match counter {
            Counter::Impressions => record.impressions = Set(1),
            Counter::CtaClicks => record.cta_clicks = Set(1),
            Counter::AffiliateClicks => record.affiliate_clicks = Set(1),
        }

        let column = counter.column();
        Performance::insert(record)
            .on_conflict(
                OnConflict::columns([
                    performance::Column::TenantId,
                    performance::Column::ListingId,
                ])
                .value(column, Expr::col((Performance, column)).add(1))
                .value(performance::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    /// Fetch the record for a pair, creating an empty one if absent.
    pub async fn get_or_create(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PerformanceModel, RepositoryError> {
        if let Some(existing) = self.find(tenant_id, listing_id).await? {
            return Ok(existing);
        }

        ensure_record(self.db, tenant_id, listing_id, 0.0, now).await?;

        self.find(tenant_id, listing_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Performance record".to_string()))
    }

    pub async fn find(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
    ) -> Result<Option<PerformanceModel>, RepositoryError> {
        Performance::find()
            .filter(performance::Column::TenantId.eq(tenant_id))
            .filter(performance::Column::ListingId.eq(listing_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Overwrite one running average.
    pub async fn set_average(
        &self,
        record: PerformanceModel,
        average: Average,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<PerformanceModel, RepositoryError> {
        let mut active = record.into_active_model();
        match average {
            Average::DwellSeconds => active.avg_dwell_seconds = Set(value),
            Average::ScrollDepth => active.avg_scroll_depth = Set(value),
        }
        active.updated_at = Set(now.into());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Number of records, optionally restricted to one tenant.
    pub async fn count(&self, tenant_id: Option<Uuid>) -> Result<u64, RepositoryError> {
        let mut query = Performance::find();
        if let Some(tenant_id) = tenant_id {
            query = query.filter(performance::Column::TenantId.eq(tenant_id));
        }
        query
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// All records of a tenant, in no particular order.
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<PerformanceModel>, RepositoryError> {
        Performance::find()
            .filter(performance::Column::TenantId.eq(tenant_id))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Records of a tenant by score descending, ties by listing id ascending.
    pub async fn list_for_tenant_by_score(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<PerformanceModel>, RepositoryError> {
        Performance::find()
            .filter(performance::Column::TenantId.eq(tenant_id))
            .order_by_desc(performance::Column::Score)
            .order_by_asc(performance::Column::ListingId)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn set_score(
        &self,
        record_id: Uuid,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let update = PerformanceActiveModel {
            id: Set(record_id),
            score: Set(score),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        update
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(())
    }

    pub async fn set_rank(
        &self,
        record_id: Uuid,
        rank: i32,
        is_featured: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let update = PerformanceActiveModel {
            id: Set(record_id),
            rank: Set(rank),
            is_featured: Set(is_featured),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        update
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(())
    }
}

fn blank_record(tenant_id: Uuid, listing_id: Uuid, now: DateTime<Utc>) -> PerformanceActiveModel {
    PerformanceActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        listing_id: Set(listing_id),
        impressions: Set(0),
        cta_clicks: Set(0),
        affiliate_clicks: Set(0),
        avg_dwell_seconds: Set(0.0),
        avg_scroll_depth: Set(0.0),
        score: Set(0.0),
        rank: Set(0),
        is_featured: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
}

/// Insert an empty record with an initial score unless one already exists.
pub(crate) async fn ensure_record<C: ConnectionTrait>(
    db: &C,
    tenant_id: Uuid,
    listing_id: Uuid,
    initial_score: f64,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let mut record = blank_record(tenant_id, listing_id, now);
    record.score = Set(initial_score);

    Performance::insert(record)
        .on_conflict(
            OnConflict::columns([
                performance::Column::TenantId,
                performance::Column::ListingId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(RepositoryError::database_error)?;

    Ok(())
}
