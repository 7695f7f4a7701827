//! # Tenant Repository
//!
//! Tenant (served domain) management. Creating a tenant provisions its
//! starting catalog: every live global listing is linked and given a
//! performance record seeded with its heuristic score, so a new domain has a
//! sensible order before any traffic arrives.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::performance::{self, Entity as Performance};
use crate::models::tenant::{
    self, ActiveModel as TenantActiveModel, Entity as Tenant, Model as TenantModel,
};
use crate::models::tenant_listing::{self, Entity as TenantListing};
use crate::ranking::scorer::{ListingAttributes, ScoringStrategy};
use crate::repositories::listing::ListingRepository;
use crate::repositories::performance::ensure_record;
use crate::repositories::tenant_listing::upsert_link;

/// Request data for creating a new tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    /// Served host name, e.g. `bonus.example.com`
    pub domain_name: String,
    pub display_name: Option<String>,
}

/// Repository for Tenant database operations
pub struct TenantRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TenantRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a tenant and provision its catalog from the live global listings.
    ///
    /// The tenant row, its links and the seeded performance records are written
    /// in one transaction. A duplicate domain name yields
    /// [`RepositoryError::Conflict`].
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
        scoring: &ScoringStrategy,
    ) -> Result<TenantModel, RepositoryError> {
        let domain_name = normalize_domain(&request.domain_name)?;
        let catalog = ListingRepository::new(self.db).list_live_global().await?;

        let now = Utc::now();
        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            domain_name: Set(domain_name),
            display_name: Set(request
                .display_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(RepositoryError::database_error)?;

        for (position, listing) in catalog.iter().enumerate() {
            upsert_link(&txn, tenant.id, listing.id, position as i32, true).await?;
            let seed = scoring.heuristic_score(&ListingAttributes::from(listing), now);
            ensure_record(&txn, tenant.id, listing.id, seed, now).await?;
        }

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)?;

        log::info!(
            "Provisioned tenant {} ({}) with {} listings",
            tenant.domain_name,
            tenant.id,
            catalog.len()
        );

        Ok(tenant)
    }

    /// Get tenant by ID
    pub async fn get_tenant_by_id(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(tenant_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Look a tenant up by host name, normalized the same way as on creation.
    pub async fn get_by_domain_name(
        &self,
        domain_name: &str,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        let domain_name = normalize_domain(domain_name)?;
        Tenant::find()
            .filter(tenant::Column::DomainName.eq(domain_name))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        Tenant::find()
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// List all tenants, oldest first
    pub async fn list_tenants(&self) -> Result<Vec<TenantModel>, RepositoryError> {
        Tenant::find()
            .order_by_asc(tenant::Column::CreatedAt)
            .order_by_asc(tenant::Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Ids of active tenants, used by the ranking scheduler.
    pub async fn list_active_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        Tenant::find()
            .select_only()
            .column(tenant::Column::Id)
            .filter(tenant::Column::IsActive.eq(true))
            .order_by_asc(tenant::Column::Id)
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Delete a tenant together with its links and performance records
    pub async fn delete_tenant(&self, tenant_id: Uuid) -> Result<(), RepositoryError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        Performance::delete_many()
            .filter(performance::Column::TenantId.eq(tenant_id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        TenantListing::delete_many()
            .filter(tenant_listing::Column::TenantId.eq(tenant_id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;
        let deleted = Tenant::delete_by_id(tenant_id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        if deleted.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(RepositoryError::database_error)?;
            return Err(RepositoryError::NotFound("Tenant".to_string()));
        }

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn tenant_exists(&self, tenant_id: Uuid) -> Result<bool, RepositoryError> {
        let count = Tenant::find_by_id(tenant_id)
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(count > 0)
    }
}

/// Lower-case and validate a host name.
fn normalize_domain(raw: &str) -> Result<String, RepositoryError> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();

    if domain.is_empty() {
        return Err(RepositoryError::validation_error(
            "Domain name cannot be empty",
        ));
    }
    if domain.len() > 253 {
        return Err(RepositoryError::validation_error(
            "Domain name cannot exceed 253 characters",
        ));
    }

    let labels_valid = domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    if !labels_valid {
        return Err(RepositoryError::validation_error(
            "Domain name can only contain letters, digits, hyphens and dots",
        ));
    }

    Ok(domain)
}
