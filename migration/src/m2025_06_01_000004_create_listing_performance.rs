//! Migration to create the listing_performance table.
//!
//! One row per (tenant, listing) pair. `listing_id` is intentionally not a
//! foreign key: records outlive the listings they point at, and the ranking
//! pass skips dangling ids.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ListingPerformance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ListingPerformance::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ListingPerformance::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ListingPerformance::ListingId)
                            .uuid()
                            .not_null(),
                    )
                    .col(counter(ListingPerformance::Impressions))
                    .col(counter(ListingPerformance::CtaClicks))
                    .col(counter(ListingPerformance::AffiliateClicks))
                    .col(average(ListingPerformance::AvgDwellSeconds))
                    .col(average(ListingPerformance::AvgScrollDepth))
                    .col(average(ListingPerformance::Score))
                    .col(
                        ColumnDef::new(ListingPerformance::Rank)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ListingPerformance::IsFeatured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ListingPerformance::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ListingPerformance::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listing_performance_tenant_id")
                            .from(ListingPerformance::Table, ListingPerformance::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Upserts target this key.
        manager
            .create_index(
                Index::create()
                    .name("idx_listing_performance_tenant_listing")
                    .table(ListingPerformance::Table)
                    .col(ListingPerformance::TenantId)
                    .col(ListingPerformance::ListingId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listing_performance_tenant_score")
                    .table(ListingPerformance::Table)
                    .col(ListingPerformance::TenantId)
                    .col(ListingPerformance::Score)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_listing_performance_tenant_score")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_listing_performance_tenant_listing")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ListingPerformance::Table).to_owned())
            .await
    }
}

fn counter(column: ListingPerformance) -> ColumnDef {
    ColumnDef::new(column)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

fn average(column: ListingPerformance) -> ColumnDef {
    ColumnDef::new(column)
        .double()
        .not_null()
        .default(0.0)
        .to_owned()
}

#[derive(DeriveIden)]
enum ListingPerformance {
    Table,
    Id,
    TenantId,
    ListingId,
    Impressions,
    CtaClicks,
    AffiliateClicks,
    AvgDwellSeconds,
    AvgScrollDepth,
    Score,
    Rank,
    IsFeatured,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
