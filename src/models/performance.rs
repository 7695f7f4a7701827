//! Performance record entity model
//!
//! Aggregated traffic metrics and the derived score, rank and featured flag for
//! one (tenant, listing) pair. `listing_id` is a weak reference: the listing may
//! no longer exist.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "listing_performance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub listing_id: Uuid,

    pub impressions: i64,

    /// On-site call-to-action clicks
    pub cta_clicks: i64,

    /// Outbound clicks to the affiliate URL
    pub affiliate_clicks: i64,

    #[sea_orm(column_type = "Double")]
    pub avg_dwell_seconds: f64,

    /// Average scroll depth percentage, 0-100
    #[sea_orm(column_type = "Double")]
    pub avg_scroll_depth: f64,

    #[sea_orm(column_type = "Double")]
    pub score: f64,

    /// Dense 1-based rank from the last ranking pass; 0 when unranked
    pub rank: i32,

    pub is_featured: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
