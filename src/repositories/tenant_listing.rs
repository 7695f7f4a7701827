//! # Tenant Listing Repository
//!
//! Links between tenants and the listings shown on their domains.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::tenant_listing::{
    self, ActiveModel as LinkActiveModel, Entity as TenantListing, Model as LinkModel,
};
use crate::repositories::performance::ensure_record;

/// Repository for tenant-listing link operations
pub struct TenantListingRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TenantListingRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create or overwrite the link for `(tenant_id, listing_id)`.
    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
        custom_order: i32,
        is_active: bool,
    ) -> Result<LinkModel, RepositoryError> {
        upsert_link(self.db, tenant_id, listing_id, custom_order, is_active).await?;
        self.find_link(tenant_id, listing_id).await
    }

    /// Store the link and make sure the pair has a performance record
    /// seeded with `initial_score`, both in one transaction.
    pub async fn upsert_with_record(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
        custom_order: i32,
        is_active: bool,
        initial_score: f64,
        now: DateTime<Utc>,
    ) -> Result<LinkModel, RepositoryError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        upsert_link(&txn, tenant_id, listing_id, custom_order, is_active).await?;
        ensure_record(&txn, tenant_id, listing_id, initial_score, now).await?;

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)?;

        self.find_link(tenant_id, listing_id).await
    }

    async fn find_link(
        &self,
        tenant_id: Uuid,
        listing_id: Uuid,
    ) -> Result<LinkModel, RepositoryError> {
        TenantListing::find()
            .filter(tenant_listing::Column::TenantId.eq(tenant_id))
            .filter(tenant_listing::Column::ListingId.eq(listing_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| RepositoryError::NotFound("Tenant listing".to_string()))
    }

    /// Every link of a tenant, active or not, in display order.
    pub async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<LinkModel>, RepositoryError> {
        TenantListing::find()
            .filter(tenant_listing::Column::TenantId.eq(tenant_id))
            .order_by_asc(tenant_listing::Column::CustomOrder)
            .order_by_asc(tenant_listing::Column::ListingId)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Active links of a tenant, in display order.
    pub async fn list_active_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<LinkModel>, RepositoryError> {
        Ok(self
            .list_for_tenant(tenant_id)
            .await?
            .into_iter()
            .filter(|link| link.is_active)
            .collect())
    }
}

/// Link upsert usable inside a transaction.
pub(crate) async fn upsert_link<C: ConnectionTrait>(
    db: &C,
    tenant_id: Uuid,
    listing_id: Uuid,
    custom_order: i32,
    is_active: bool,
) -> Result<(), RepositoryError> {
    let link = LinkActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        listing_id: Set(listing_id),
        custom_order: Set(custom_order),
        is_active: Set(is_active),
        created_at: Set(Utc::now().into()),
    };

    TenantListing::insert(link)
        .on_conflict(
            OnConflict::columns([
                tenant_listing::Column::TenantId,
                tenant_listing::Column::ListingId,
            ])
            .update_columns([
                tenant_listing::Column::CustomOrder,
                tenant_listing::Column::IsActive,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(RepositoryError::database_error)?;

    Ok(())
}
