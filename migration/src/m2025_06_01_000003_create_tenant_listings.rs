//! Migration to create the tenant_listings join table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantListings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantListings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TenantListings::TenantId).uuid().not_null())
                    .col(ColumnDef::new(TenantListings::ListingId).uuid().not_null())
                    .col(
                        ColumnDef::new(TenantListings::CustomOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TenantListings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(TenantListings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_listings_tenant_id")
                            .from(TenantListings::Table, TenantListings::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_listings_listing_id")
                            .from(TenantListings::Table, TenantListings::ListingId)
                            .to(Listings::Table, Listings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenant_listings_tenant_listing")
                    .table(TenantListings::Table)
                    .col(TenantListings::TenantId)
                    .col(TenantListings::ListingId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_tenant_listings_tenant_listing")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(TenantListings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TenantListings {
    Table,
    Id,
    TenantId,
    ListingId,
    CustomOrder,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Listings {
    Table,
    Id,
}
