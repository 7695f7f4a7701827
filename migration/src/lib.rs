//! Database migrations for the bonus ranking service.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_tenants;
mod m2025_06_01_000002_create_listings;
mod m2025_06_01_000003_create_tenant_listings;
mod m2025_06_01_000004_create_listing_performance;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_tenants::Migration),
            Box::new(m2025_06_01_000002_create_listings::Migration),
            Box::new(m2025_06_01_000003_create_tenant_listings::Migration),
            Box::new(m2025_06_01_000004_create_listing_performance::Migration),
        ]
    }
}
