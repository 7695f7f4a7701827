//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for tenants,
//! listings, their links and performance records.

pub mod listing;
pub mod performance;
pub mod tenant;
pub mod tenant_listing;

pub use listing::ListingRepository;
pub use performance::PerformanceRepository;
pub use tenant::TenantRepository;
pub use tenant_listing::TenantListingRepository;

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for repository and service tests.

    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use uuid::Uuid;

    use super::listing::{ListingRepository, NewListing};
    use crate::models::{listing, tenant};

    /// Fresh in-memory SQLite database with all migrations applied.
    pub async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("connect to in-memory sqlite");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    pub fn sample_listing(name: &str, bonus_amount: &str) -> NewListing {
        NewListing {
            name: name.to_string(),
            tenant_id: None,
            bonus_type: "welcome".to_string(),
            bonus_amount: bonus_amount.to_string(),
            turnover_requirement: Some(10.0),
            rating: Some(4.5),
            affiliate_url: "https://partner.example/ref/123".to_string(),
            logo_url: None,
            campaign_start: None,
            is_active: true,
        }
    }

    /// Insert an active tenant without provisioning any listings.
    pub async fn insert_tenant(db: &DatabaseConnection, domain: &str) -> tenant::Model {
        let now = Utc::now();
        tenant::ActiveModel {
            id: Set(Uuid::new_v4()),
            domain_name: Set(domain.to_string()),
            display_name: Set(None),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(db)
        .await
        .expect("insert tenant")
    }

    /// Insert a live global listing with the given scoring attributes.
    pub async fn insert_listing(
        db: &DatabaseConnection,
        name: &str,
        bonus_value: i64,
        turnover: Option<f64>,
        rating: Option<f64>,
    ) -> listing::Model {
        let mut input = sample_listing(name, &format!("{bonus_value} TL"));
        input.turnover_requirement = turnover;
        input.rating = rating;
        ListingRepository::new(db)
            .create(input)
            .await
            .expect("insert listing")
    }
}
