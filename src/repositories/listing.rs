//! # Listing Repository
//!
//! CRUD for affiliate listings. Listings are soft-removed: `archive` clears
//! `is_active` and sets `is_archived`, the row itself is kept so historical
//! performance records can still point at it.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::listing::{
    self, ActiveModel as ListingActiveModel, Entity as Listing, Model as ListingModel,
    parse_bonus_value,
};

/// Input for creating a listing.
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    pub name: String,
    pub tenant_id: Option<Uuid>,
    pub bonus_type: String,
    pub bonus_amount: String,
    pub turnover_requirement: Option<f64>,
    pub rating: Option<f64>,
    pub affiliate_url: String,
    pub logo_url: Option<String>,
    pub campaign_start: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Partial update of a listing; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ListingChanges {
    pub name: Option<String>,
    pub bonus_type: Option<String>,
    pub bonus_amount: Option<String>,
    pub turnover_requirement: Option<f64>,
    pub rating: Option<f64>,
    pub affiliate_url: Option<String>,
    pub logo_url: Option<String>,
    pub campaign_start: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub is_archived: Option<bool>,
}

/// Repository for listing database operations
pub struct ListingRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ListingRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a listing, deriving `bonus_value` from `bonus_amount`.
    pub async fn create(&self, input: NewListing) -> Result<ListingModel, RepositoryError> {
        validate_name(&input.name)?;
        validate_url(&input.affiliate_url)?;
        validate_rating(input.rating)?;
        validate_turnover(input.turnover_requirement)?;

        let now = Utc::now();
        let listing = ListingActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            tenant_id: Set(input.tenant_id),
            bonus_value: Set(parse_bonus_value(&input.bonus_amount)),
            bonus_type: Set(input.bonus_type),
            bonus_amount: Set(input.bonus_amount),
            turnover_requirement: Set(input.turnover_requirement),
            rating: Set(input.rating),
            affiliate_url: Set(input.affiliate_url),
            logo_url: Set(input.logo_url),
            campaign_start: Set(input.campaign_start.map(Into::into)),
            is_active: Set(input.is_active),
            is_archived: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        listing
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get(&self, listing_id: Uuid) -> Result<Option<ListingModel>, RepositoryError> {
        Listing::find_by_id(listing_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Active, non-archived listings, best rated first.
    pub async fn list_live(&self, limit: u64) -> Result<Vec<ListingModel>, RepositoryError> {
        Listing::find()
            .filter(live_condition())
            .order_by_desc(listing::Column::Rating)
            .order_by_asc(listing::Column::Id)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Number of active, non-archived listings.
    pub async fn count_live(&self) -> Result<u64, RepositoryError> {
        Listing::find()
            .filter(live_condition())
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Live global listings, i.e. the catalog a new tenant starts with.
    pub async fn list_live_global(&self) -> Result<Vec<ListingModel>, RepositoryError> {
        Listing::find()
            .filter(live_condition())
            .filter(listing::Column::TenantId.is_null())
            .order_by_desc(listing::Column::Rating)
            .order_by_asc(listing::Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Listings with the given ids, regardless of state. Missing ids are simply absent.
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ListingModel>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Listing::find()
            .filter(listing::Column::Id.is_in(ids.iter().copied()))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Apply a partial update.
    pub async fn update(
        &self,
        listing_id: Uuid,
        changes: ListingChanges,
    ) -> Result<ListingModel, RepositoryError> {
        let existing = self
            .get(listing_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Listing".to_string()))?;

        let mut active = existing.into_active_model();
        if let Some(name) = changes.name {
            validate_name(&name)?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(bonus_type) = changes.bonus_type {
            active.bonus_type = Set(bonus_type);
        }
        if let Some(bonus_amount) = changes.bonus_amount {
            active.bonus_value = Set(parse_bonus_value(&bonus_amount));
            active.bonus_amount = Set(bonus_amount);
        }
        if changes.turnover_requirement.is_some() {
            validate_turnover(changes.turnover_requirement)?;
            active.turnover_requirement = Set(changes.turnover_requirement);
        }
        if changes.rating.is_some() {
            validate_rating(changes.rating)?;
            active.rating = Set(changes.rating);
        }
        if let Some(url) = changes.affiliate_url {
            validate_url(&url)?;
            active.affiliate_url = Set(url);
        }
        if let Some(logo_url) = changes.logo_url {
            active.logo_url = Set(Some(logo_url));
        }
        if let Some(campaign_start) = changes.campaign_start {
            active.campaign_start = Set(Some(campaign_start.into()));
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_archived) = changes.is_archived {
            active.is_archived = Set(is_archived);
        }
        active.updated_at = Set(Utc::now().into());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Soft-remove a listing.
    pub async fn archive(&self, listing_id: Uuid) -> Result<ListingModel, RepositoryError> {
        self.update(
            listing_id,
            ListingChanges {
                is_active: Some(false),
                is_archived: Some(true),
                ..ListingChanges::default()
            },
        )
        .await
    }
}

fn live_condition() -> Condition {
    Condition::all()
        .add(listing::Column::IsActive.eq(true))
        .add(listing::Column::IsArchived.eq(false))
}

fn validate_name(name: &str) -> Result<(), RepositoryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RepositoryError::validation_error("Listing name cannot be empty"));
    }
    if trimmed.chars().count() > 255 {
        return Err(RepositoryError::validation_error(
            "Listing name cannot exceed 255 characters",
        ));
    }
    Ok(())
}

fn validate_url(raw: &str) -> Result<(), RepositoryError> {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(RepositoryError::validation_error(
            "Affiliate URL must be an absolute http(s) URL",
        )),
    }
}

fn validate_rating(rating: Option<f64>) -> Result<(), RepositoryError> {
    match rating {
        Some(value) if !(0.0..=5.0).contains(&value) => Err(RepositoryError::validation_error(
            "Rating must be between 0 and 5",
        )),
        _ => Ok(()),
    }
}

fn validate_turnover(turnover: Option<f64>) -> Result<(), RepositoryError> {
    match turnover {
        Some(value) if !value.is_finite() || value < 0.0 => Err(
            RepositoryError::validation_error("Turnover requirement must be a non-negative number"),
        ),
        _ => Ok(()),
    }
}
