//! Tenant entity model
//!
//! A tenant is one served domain of the platform. It owns its tenant-listing
//! links and one performance record per listing it has traffic for.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Served host name, unique across tenants (e.g. `bonus.example.com`)
    #[sea_orm(unique)]
    pub domain_name: String,

    pub display_name: Option<String>,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tenant_listing::Entity")]
    TenantListing,
    #[sea_orm(has_many = "super::performance::Entity")]
    Performance,
}

impl Related<super::tenant_listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TenantListing.def()
    }
}

impl Related<super::performance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Performance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
