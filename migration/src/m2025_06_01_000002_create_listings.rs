//! Migration to create the listings table.
//!
//! Listings are the affiliate offers ("bonus sites"). A NULL `tenant_id` marks a
//! global listing. Rows are soft-removed via `is_active` / `is_archived`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Listings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Listings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Listings::Name).text().not_null())
                    .col(ColumnDef::new(Listings::TenantId).uuid().null())
                    .col(
                        ColumnDef::new(Listings::BonusType)
                            .text()
                            .not_null()
                            .default("deneme"),
                    )
                    .col(ColumnDef::new(Listings::BonusAmount).text().not_null())
                    .col(
                        ColumnDef::new(Listings::BonusValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Listings::TurnoverRequirement).double().null())
                    .col(ColumnDef::new(Listings::Rating).double().null())
                    .col(ColumnDef::new(Listings::AffiliateUrl).text().not_null())
                    .col(ColumnDef::new(Listings::LogoUrl).text().null())
                    .col(
                        ColumnDef::new(Listings::CampaignStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Listings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Listings::IsArchived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Listings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Listings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listings_active_archived")
                    .table(Listings::Table)
                    .col(Listings::IsActive)
                    .col(Listings::IsArchived)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_listings_active_archived").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Listings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Listings {
    Table,
    Id,
    Name,
    TenantId,
    BonusType,
    BonusAmount,
    BonusValue,
    TurnoverRequirement,
    Rating,
    AffiliateUrl,
    LogoUrl,
    CampaignStart,
    IsActive,
    IsArchived,
    CreatedAt,
    UpdatedAt,
}
